//! Persistence layer for the Node Store

use crate::dag::{hasher, DagNode};
use crate::error::StorageError;
use crate::store::NodeStore;
use crate::types::Key;
use bincode;
use sled;
use std::path::Path;

const NODES_TREE: &str = "nodes";

/// Sled-based implementation of NodeStore
///
/// Nodes are stored as their bincode encoding keyed by the 32 byte Key. Reads
/// re-hash the stored bytes, so on-disk corruption surfaces as `HashMismatch`.
pub struct SledNodeStore {
    nodes: sled::Tree,
}

impl SledNodeStore {
    /// Create a new SledNodeStore at the given path
    ///
    /// The path is a directory; sled creates its database files there.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Self::from_db(&db)
    }

    /// Use the `nodes` tree of an already opened database
    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        let nodes = db.open_tree(NODES_TREE)?;
        Ok(Self { nodes })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.nodes.flush().map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to flush database: {}", e),
            ))
        })?;
        Ok(())
    }

    /// Number of stored nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeStore for SledNodeStore {
    fn get(&self, key: &Key) -> Result<DagNode, StorageError> {
        let value = self
            .nodes
            .get(key.as_slice())?
            .ok_or(StorageError::NodeNotFound(*key))?;

        let actual = hasher::compute_node_key(&value);
        if actual != *key {
            return Err(StorageError::HashMismatch {
                expected: *key,
                actual,
            });
        }

        let node: DagNode = bincode::deserialize(&value).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to deserialize node {}: {}", key, e),
            ))
        })?;
        Ok(node)
    }

    fn put(&self, node: &DagNode) -> Result<Key, StorageError> {
        let value = bincode::serialize(node).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to serialize node: {}", e),
            ))
        })?;
        let key = hasher::compute_node_key(&value);

        // Same key means same bytes; skip the rewrite
        if self.nodes.contains_key(key.as_slice())? {
            return Ok(key);
        }

        self.nodes.insert(key.as_slice(), value).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to put node {}: {}", key, e),
            ))
        })?;
        Ok(key)
    }

    fn has(&self, key: &Key) -> Result<bool, StorageError> {
        Ok(self.nodes.contains_key(key.as_slice())?)
    }

    fn sync(&self) -> Result<(), StorageError> {
        self.flush()
    }
}
