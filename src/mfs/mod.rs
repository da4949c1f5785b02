//! Mutable file tree
//!
//! A `Directory`/`File` overlay on the immutable DAG. Mutations happen in
//! memory and mark the node and all of its ancestors dirty; a flush walks the
//! dirty path bottom-up, stores new DAG nodes and records their keys in the
//! parent link tables. A flush that reaches a `Root`'s directory pins the new
//! root key and publishes it.
//!
//! Parents own their materialized children through `Arc`; children only keep a
//! `Weak` back-reference used for dirty propagation.

pub mod dir;
pub mod file;
pub mod import;
pub mod ops;
pub mod root;
pub mod system;

pub use dir::Directory;
pub use file::File;
pub use import::{import_local_path, WalkerConfig};
pub use root::{noop_publish, PublishFn, Root, RootInfo};
pub use system::Filesystem;

use crate::dag::{DagNode, Link};
use crate::error::MfsError;
use crate::importer::ImportOptions;
use crate::store::NodeStore;
use crate::types::{Key, NodeType};
use parking_lot::ReentrantMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Handle to whatever is bound at a name
#[derive(Clone)]
pub enum FsNode {
    Directory(Arc<Directory>),
    File(Arc<File>),
}

impl FsNode {
    pub fn node_type(&self) -> NodeType {
        match self {
            FsNode::Directory(_) => NodeType::Directory,
            FsNode::File(_) => NodeType::File,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FsNode::Directory(dir) => dir.name(),
            FsNode::File(file) => file.name(),
        }
    }

    /// Key of the last flush, `None` while the node has unflushed changes
    pub fn key(&self) -> Option<Key> {
        match self {
            FsNode::Directory(dir) => dir.key(),
            FsNode::File(file) => file.key(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self {
            FsNode::Directory(dir) => dir.is_dirty(),
            FsNode::File(file) => file.is_dirty(),
        }
    }

    pub fn flush(&self) -> Result<Key, MfsError> {
        match self {
            FsNode::Directory(dir) => dir.flush(),
            FsNode::File(file) => file.flush(),
        }
    }

    /// Flush and return the backing DAG node
    pub fn get_node(&self) -> Result<DagNode, MfsError> {
        match self {
            FsNode::Directory(dir) => dir.get_node(),
            FsNode::File(file) => file.get_node(),
        }
    }

    pub fn as_directory(&self) -> Result<&Arc<Directory>, MfsError> {
        match self {
            FsNode::Directory(dir) => Ok(dir),
            FsNode::File(_) => Err(wrong_type(NodeType::Directory, NodeType::File)),
        }
    }

    pub fn into_directory(self) -> Result<Arc<Directory>, MfsError> {
        match self {
            FsNode::Directory(dir) => Ok(dir),
            FsNode::File(_) => Err(wrong_type(NodeType::Directory, NodeType::File)),
        }
    }

    pub fn as_file(&self) -> Result<&Arc<File>, MfsError> {
        match self {
            FsNode::File(file) => Ok(file),
            FsNode::Directory(_) => Err(wrong_type(NodeType::File, NodeType::Directory)),
        }
    }

    pub fn into_file(self) -> Result<Arc<File>, MfsError> {
        match self {
            FsNode::File(file) => Ok(file),
            FsNode::Directory(_) => Err(wrong_type(NodeType::File, NodeType::Directory)),
        }
    }

    /// Flush into a link without taking the tree flush lock or notifying the parent
    pub(crate) fn flush_locked(&self) -> Result<Link, MfsError> {
        match self {
            FsNode::Directory(dir) => dir.flush_locked(),
            FsNode::File(file) => file.flush_locked(),
        }
    }

    pub(crate) fn detach(&self) {
        match self {
            FsNode::Directory(dir) => dir.detach(),
            FsNode::File(file) => file.detach(),
        }
    }
}

impl std::fmt::Debug for FsNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsNode")
            .field("name", &self.name())
            .field("type", &self.node_type())
            .field("key", &self.key())
            .finish()
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeListing {
    pub name: String,
    pub node_type: NodeType,
    /// Logical byte size for files, 0 for directories
    pub size: u64,
    /// `None` while the child has unflushed changes
    pub key: Option<Key>,
}

/// State shared by every node of one tree
pub(crate) struct TreeContext {
    pub(crate) root_name: String,
    pub(crate) store: Arc<dyn NodeStore>,
    pub(crate) options: ImportOptions,
    /// Serializes flushes within the tree; re-entrant so publish callbacks may flush
    pub(crate) flush_lock: ReentrantMutex<()>,
    closed: AtomicBool,
}

impl TreeContext {
    pub(crate) fn new(root_name: String, store: Arc<dyn NodeStore>, options: ImportOptions) -> Self {
        Self {
            root_name,
            store,
            options,
            flush_lock: ReentrantMutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<(), MfsError> {
        if self.is_closed() {
            return Err(MfsError::Closed(format!("root {}", self.root_name)));
        }
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Non-owning reference from a node to whatever holds it
#[derive(Clone)]
pub(crate) enum ParentRef {
    /// Unlinked, or never attached
    Detached,
    Directory(Weak<Directory>),
    Root(Weak<Root>),
}

impl ParentRef {
    pub(crate) fn mark_dirty(&self) {
        if let ParentRef::Directory(parent) = self {
            if let Some(parent) = parent.upgrade() {
                parent.mark_dirty();
            }
        }
    }
}

pub(crate) fn wrong_type(expected: NodeType, found: NodeType) -> MfsError {
    MfsError::WrongType { expected, found }
}

/// Reject names that cannot be a single path component
pub(crate) fn validate_name(name: &str) -> Result<(), MfsError> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(MfsError::InvalidName(name.to_string()));
    }
    Ok(())
}
