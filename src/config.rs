//! Configuration System
//!
//! Layered settings for opening a filesystem: which datastore to use, how files
//! are chunked and how logging is set up. Values come from defaults, a global
//! config file, a repo config file and `MFS__*` environment variables, in that
//! order of precedence (lowest first).

use crate::error::MfsError;
use crate::importer::{ImportOptions, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_LINKS};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MfsConfig {
    #[serde(default)]
    pub datastore: DatastoreConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backing engine for nodes and pins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatastoreKind {
    /// Process-local maps; nothing survives a restart
    Memory,
    #[default]
    Sled,
}

/// Datastore settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    #[serde(default)]
    pub kind: DatastoreKind,

    /// Database directory (sled only)
    #[serde(default = "default_datastore_path")]
    pub path: PathBuf,
}

pub(crate) fn default_datastore_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "mfs")
        .map(|dirs| dirs.data_dir().join("datastore"))
        .unwrap_or_else(|| PathBuf::from(".mfs/datastore"))
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            kind: DatastoreKind::default(),
            path: default_datastore_path(),
        }
    }
}

/// File chunking settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Leaf size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum children per file branch node
    #[serde(default = "default_max_links")]
    pub max_links: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_links() -> usize {
    DEFAULT_MAX_LINKS
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_links: default_max_links(),
        }
    }
}

impl ImportConfig {
    pub fn options(&self) -> ImportOptions {
        ImportOptions {
            chunk_size: self.chunk_size,
            max_links: self.max_links,
        }
    }
}

impl MfsConfig {
    /// A config using the in-memory datastore
    pub fn in_memory() -> Self {
        Self {
            datastore: DatastoreConfig {
                kind: DatastoreKind::Memory,
                ..DatastoreConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), MfsError> {
        if self.import.chunk_size == 0 {
            return Err(MfsError::ConfigError(
                "import.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.import.max_links < 2 {
            return Err(MfsError::ConfigError(format!(
                "import.max_links must be at least 2, got {}",
                self.import.max_links
            )));
        }
        if self.datastore.kind == DatastoreKind::Sled && self.datastore.path.as_os_str().is_empty()
        {
            return Err(MfsError::ConfigError(
                "datastore.path cannot be empty for a sled datastore".to_string(),
            ));
        }
        crate::logging::validate(&self.logging)
    }
}

/// Write `config` as TOML
///
/// The file is written to a sibling `.tmp` path and renamed into place, so a
/// reader never sees a partial file.
pub fn write_config_file(path: &Path, config: &MfsConfig) -> Result<(), MfsError> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| MfsError::ConfigError(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)?;
    debug!(path = %path.display(), "Wrote config file");
    Ok(())
}
