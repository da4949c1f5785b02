//! Registry of open roots sharing one node store and pinner

use crate::config::MfsConfig;
use crate::dag::DagNode;
use crate::error::MfsError;
use crate::importer::ImportOptions;
use crate::mfs::root::{PublishFn, Root};
use crate::pin::Pinner;
use crate::store::{self, NodeStore};
use crate::types::Key;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Filesystem: named roots over shared storage
///
/// The registry lock only guards the name map. Opening, flushing and publishing
/// run outside it, so a slow root never stalls lookups of the others.
pub struct Filesystem {
    roots: RwLock<HashMap<String, Arc<Root>>>,
    store: Arc<dyn NodeStore>,
    pinner: Arc<dyn Pinner>,
    options: ImportOptions,
}

impl Filesystem {
    pub fn new(store: Arc<dyn NodeStore>, pinner: Arc<dyn Pinner>) -> Self {
        Self::with_options(store, pinner, ImportOptions::default())
    }

    pub fn with_options(
        store: Arc<dyn NodeStore>,
        pinner: Arc<dyn Pinner>,
        options: ImportOptions,
    ) -> Self {
        Self {
            roots: RwLock::new(HashMap::new()),
            store,
            pinner,
            options,
        }
    }

    /// Open the configured datastore and build a filesystem over it
    pub fn from_config(config: &MfsConfig) -> Result<Self, MfsError> {
        config.validate()?;
        let (store, pinner) = store::open(&config.datastore)?;
        Ok(Self::with_options(store, pinner, config.import.options()))
    }

    pub fn store(&self) -> Arc<dyn NodeStore> {
        self.store.clone()
    }

    pub fn pinner(&self) -> Arc<dyn Pinner> {
        self.pinner.clone()
    }

    /// Register a new root over `node`
    pub fn new_root(
        &self,
        name: &str,
        node: DagNode,
        publish: PublishFn,
    ) -> Result<Arc<Root>, MfsError> {
        if self.roots.read().contains_key(name) {
            return Err(MfsError::AlreadyExists(format!("root {}", name)));
        }
        let root = Root::new(
            name,
            node,
            publish,
            self.store.clone(),
            self.pinner.clone(),
            self.options,
        )?;

        let mut roots = self.roots.write();
        if roots.contains_key(name) {
            drop(roots);
            // Lost a race for the name
            root.discard();
            return Err(MfsError::AlreadyExists(format!("root {}", name)));
        }
        roots.insert(name.to_string(), root.clone());
        info!(root = %name, total = roots.len(), "Registered root");
        Ok(root)
    }

    pub fn get_root(&self, name: &str) -> Result<Arc<Root>, MfsError> {
        self.roots
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| MfsError::NotFound(format!("root {}", name)))
    }

    /// Snapshot of the registered roots, sorted by name
    pub fn list_roots(&self) -> Vec<Arc<Root>> {
        let mut roots: Vec<Arc<Root>> = self.roots.read().values().cloned().collect();
        roots.sort_by(|a, b| a.name().cmp(b.name()));
        roots
    }

    /// Flush, close and unregister a root, returning its final key
    ///
    /// A store failure keeps the root registered and open. A publish failure
    /// still unregisters it; the error carries the final key.
    pub fn close_root(&self, name: &str) -> Result<Key, MfsError> {
        let root = self.get_root(name)?;
        let result = match root.close() {
            // Closed concurrently by another caller
            Err(MfsError::Closed(_)) if root.is_closed() => Ok(root.key()),
            other => other,
        };
        self.unregister_if_closed(&root);
        result
    }

    /// Close every root, best effort
    ///
    /// Roots that closed, including those whose final publish failed, are
    /// unregistered. Roots hit by a store failure stay registered and open.
    /// The first error is returned.
    pub fn close(&self) -> Result<(), MfsError> {
        let mut first_error = None;
        for root in self.list_roots() {
            if !root.is_closed() {
                if let Err(e) = root.close() {
                    warn!(root = %root.name(), error = %e, "Failed to close root");
                    first_error.get_or_insert(e);
                }
            }
            self.unregister_if_closed(&root);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn unregister_if_closed(&self, root: &Arc<Root>) {
        if !root.is_closed() {
            return;
        }
        let mut roots = self.roots.write();
        // The name may already belong to a newer root
        if roots
            .get(root.name())
            .is_some_and(|current| Arc::ptr_eq(current, root))
        {
            roots.remove(root.name());
            info!(root = %root.name(), total = roots.len(), "Unregistered root");
        }
    }
}
