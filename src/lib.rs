//! MFS: a mutable file tree over an immutable Merkle DAG
//!
//! Directories and files are edited in memory; flushing turns the changes into
//! new content-addressed DAG nodes, rewrites parent links up to a root and
//! hands the new root key to a publish callback.
//!
//! ```no_run
//! use mfs::{noop_publish, DagNode, Filesystem, MemoryNodeStore, MemoryPinner};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), mfs::MfsError> {
//! let fs = Filesystem::new(Arc::new(MemoryNodeStore::new()), Arc::new(MemoryPinner::new()));
//! let root = fs.new_root("home", DagNode::empty_directory(), noop_publish())?;
//! let docs = root.root_dir().mkdir("docs")?;
//! docs.create_file("readme")?.write(b"hello")?;
//! let key = root.flush()?;
//! println!("root is now {}", key);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dag;
pub mod error;
pub mod importer;
pub mod logging;
pub mod mfs;
pub mod pin;
pub mod store;
pub mod types;

pub use config::{ConfigLoader, MfsConfig};
pub use dag::{DagNode, Link, NodeData};
pub use error::{MfsError, StorageError};
pub use importer::ImportOptions;
pub use mfs::{
    noop_publish, ops, Directory, File, Filesystem, FsNode, NodeListing, PublishFn, Root,
    RootInfo,
};
pub use pin::{MemoryPinner, Pinner, SledPinner};
pub use store::{MemoryNodeStore, NodeStore, SledNodeStore};
pub use types::{Key, NodeType};
