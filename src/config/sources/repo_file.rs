//! Repo config file source: <repo_root>/config.toml

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::{Path, PathBuf};

pub const REPO_CONFIG_FILE: &str = "config.toml";

pub fn repo_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(REPO_CONFIG_FILE)
}

/// Add the repo config file to builder if present.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    repo_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = repo_config_path(repo_root);
    if !path.exists() {
        return Ok(builder);
    }
    Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(false)))
}
