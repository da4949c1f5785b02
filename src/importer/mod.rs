//! Chunked file codec
//!
//! Turns byte streams into file DAGs (`layout`) and file DAGs back into byte
//! streams (`reader`). The mutable tree calls into this module to flush and read
//! files; it does not care how the bytes are split.

pub mod chunker;
pub mod layout;
pub mod reader;

pub use chunker::Chunker;
pub use layout::build_dag_from_reader;
pub use reader::{cat, DagReader};

use serde::{Deserialize, Serialize};

/// Default leaf size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Default maximum number of children per file branch node
pub const DEFAULT_MAX_LINKS: usize = 174;

/// Parameters for building file DAGs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub chunk_size: usize,
    pub max_links: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_links: DEFAULT_MAX_LINKS,
        }
    }
}
