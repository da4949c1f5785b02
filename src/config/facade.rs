//! Config loading facade

use crate::config::merge::builder_with_defaults;
use crate::config::sources::{global_file, repo_file};
use crate::config::MfsConfig;
use crate::error::MfsError;
use config::{Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads `MfsConfig` from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a repo
    ///
    /// Precedence (highest wins): `MFS__SECTION__KEY` environment variables,
    /// `<repo_root>/config.toml`, the global config file, built-in defaults.
    pub fn load(repo_root: &Path) -> Result<MfsConfig, MfsError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = repo_file::add_to_builder(builder, repo_root)?;
        let builder = builder.add_source(
            Environment::with_prefix("MFS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: MfsConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(repo_root = %repo_root.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load a single TOML file over the defaults
    pub fn load_from_file(path: &Path) -> Result<MfsConfig, MfsError> {
        let config: MfsConfig = builder_with_defaults()?
            .add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the global config file, if a home or XDG config dir is known
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    /// Path of the repo config file under `repo_root`
    pub fn repo_config_path(repo_root: &Path) -> PathBuf {
        repo_file::repo_config_path(repo_root)
    }
}
