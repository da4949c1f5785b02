//! Merge rules: defaults, override order, conflict handling.

use crate::config::default_datastore_path;
use crate::importer::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_LINKS};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override these key by key, so a file that only sets
/// `datastore.path` keeps the default kind and chunking.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("datastore.kind", "sled")?
        .set_default(
            "datastore.path",
            default_datastore_path().to_string_lossy().into_owned(),
        )?
        .set_default("import.chunk_size", DEFAULT_CHUNK_SIZE as i64)?
        .set_default("import.max_links", DEFAULT_MAX_LINKS as i64)?
        .set_default("logging.level", "info")
}
