//! Node Store
//!
//! Content-addressed get/put of immutable DAG nodes. The mutable tree only talks
//! to the store through the `NodeStore` trait, so the backing engine can be an
//! in-memory map (tests, ephemeral roots) or a sled database.

pub mod persistence;

pub use persistence::SledNodeStore;

use crate::config::{DatastoreConfig, DatastoreKind};
use crate::dag::{hasher, DagNode};
use crate::error::StorageError;
use crate::pin::{MemoryPinner, Pinner, SledPinner};
use crate::types::Key;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Node Store interface
///
/// `put` is idempotent: storing identical content twice yields the same Key.
pub trait NodeStore: Send + Sync {
    fn get(&self, key: &Key) -> Result<DagNode, StorageError>;
    fn put(&self, node: &DagNode) -> Result<Key, StorageError>;
    fn has(&self, key: &Key) -> Result<bool, StorageError>;

    /// Make every stored node durable; a no-op for volatile stores
    fn sync(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// In-memory node store
#[derive(Default)]
pub struct MemoryNodeStore {
    nodes: RwLock<HashMap<Key, Vec<u8>>>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct nodes stored
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

impl NodeStore for MemoryNodeStore {
    fn get(&self, key: &Key) -> Result<DagNode, StorageError> {
        let nodes = self.nodes.read();
        let bytes = nodes.get(key).ok_or(StorageError::NodeNotFound(*key))?;
        DagNode::decode(bytes)
    }

    fn put(&self, node: &DagNode) -> Result<Key, StorageError> {
        let encoded = node.encode()?;
        let key = hasher::compute_node_key(&encoded);
        self.nodes.write().entry(key).or_insert(encoded);
        Ok(key)
    }

    fn has(&self, key: &Key) -> Result<bool, StorageError> {
        Ok(self.nodes.read().contains_key(key))
    }
}

/// Open the node store and pinner described by a datastore config
///
/// Both sled services share one database so a node and its pin live together.
pub fn open(
    config: &DatastoreConfig,
) -> Result<(Arc<dyn NodeStore>, Arc<dyn Pinner>), StorageError> {
    match config.kind {
        DatastoreKind::Memory => {
            info!("Opening in-memory datastore");
            Ok((
                Arc::new(MemoryNodeStore::new()),
                Arc::new(MemoryPinner::new()),
            ))
        }
        DatastoreKind::Sled => {
            info!(path = %config.path.display(), "Opening sled datastore");
            let db = sled::open(&config.path)?;
            let store = SledNodeStore::from_db(&db)?;
            let pinner = SledPinner::from_db(&db)?;
            Ok((Arc::new(store), Arc::new(pinner)))
        }
    }
}
