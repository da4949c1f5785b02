//! Mutable directory

use crate::dag::{DagNode, Link};
use crate::error::MfsError;
use crate::mfs::file::File;
use crate::mfs::{validate_name, wrong_type, FsNode, NodeListing, ParentRef, TreeContext};
use crate::types::{Key, NodeType};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// A bound name: the link recorded at the last flush plus the in-memory node, once loaded
struct Entry {
    link: Link,
    child: Option<FsNode>,
}

struct DirState {
    entries: BTreeMap<String, Entry>,
    /// Node and key produced by the last flush (or the node this directory was loaded from)
    node: DagNode,
    key: Key,
    size: u64,
}

/// Directory in a mutable tree
///
/// Entries are loaded from the node store on first access. Mutations mark the
/// directory dirty; nothing reaches the store until a flush.
pub struct Directory {
    name: String,
    ctx: Arc<TreeContext>,
    parent: Mutex<ParentRef>,
    dirty: AtomicBool,
    state: RwLock<DirState>,
}

impl Directory {
    /// Wrap a stored directory node; the caller has checked the node type
    pub(crate) fn from_node(
        name: String,
        node: DagNode,
        key: Key,
        size: u64,
        parent: ParentRef,
        ctx: Arc<TreeContext>,
    ) -> Arc<Self> {
        let entries = node
            .links()
            .iter()
            .map(|link| {
                (
                    link.name.clone(),
                    Entry {
                        link: link.clone(),
                        child: None,
                    },
                )
            })
            .collect();
        Arc::new(Self {
            name,
            ctx,
            parent: Mutex::new(parent),
            dirty: AtomicBool::new(false),
            state: RwLock::new(DirState {
                entries,
                node,
                key,
                size,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Key of the last flush, `None` while dirty
    pub fn key(&self) -> Option<Key> {
        if self.is_dirty() {
            return None;
        }
        Some(self.state.read().key)
    }

    /// Create an empty subdirectory
    pub fn mkdir(self: &Arc<Self>, name: &str) -> Result<Arc<Directory>, MfsError> {
        self.ctx.ensure_open()?;
        validate_name(name)?;

        let node = DagNode::empty_directory();
        let key = node.key()?;
        let size = node.cumulative_size()?;

        let mut state = self.state.write();
        if state.entries.contains_key(name) {
            return Err(MfsError::AlreadyExists(name.to_string()));
        }
        let child = Directory::from_node(
            name.to_string(),
            node,
            key,
            size,
            ParentRef::Directory(Arc::downgrade(self)),
            self.ctx.clone(),
        );
        // Not stored yet; the next flush writes it
        child.dirty.store(true, Ordering::SeqCst);
        state.entries.insert(
            name.to_string(),
            Entry {
                link: Link {
                    name: name.to_string(),
                    key,
                    size,
                },
                child: Some(FsNode::Directory(child.clone())),
            },
        );
        drop(state);

        self.mark_dirty();
        debug!(dir = %self.name, name, "Created directory");
        Ok(child)
    }

    /// Create an empty file
    pub fn create_file(self: &Arc<Self>, name: &str) -> Result<Arc<File>, MfsError> {
        self.ctx.ensure_open()?;
        validate_name(name)?;

        let mut state = self.state.write();
        if state.entries.contains_key(name) {
            return Err(MfsError::AlreadyExists(name.to_string()));
        }
        let file = File::new_empty(
            name.to_string(),
            ParentRef::Directory(Arc::downgrade(self)),
            self.ctx.clone(),
        )?;
        let link = file.last_link()?;
        state.entries.insert(
            name.to_string(),
            Entry {
                link,
                child: Some(FsNode::File(file.clone())),
            },
        );
        drop(state);

        self.mark_dirty();
        debug!(dir = %self.name, name, "Created file");
        Ok(file)
    }

    /// Resolve a child, loading it from the store on first access
    pub fn child(self: &Arc<Self>, name: &str) -> Result<FsNode, MfsError> {
        self.ctx.ensure_open()?;

        {
            let state = self.state.read();
            match state.entries.get(name) {
                None => return Err(MfsError::NotFound(name.to_string())),
                Some(Entry {
                    child: Some(child), ..
                }) if !is_stale(child) => return Ok(child.clone()),
                Some(_) => {}
            }
        }

        // Load under the write lock so concurrent first accesses share one node
        let mut state = self.state.write();
        let entry = state
            .entries
            .get_mut(name)
            .ok_or_else(|| MfsError::NotFound(name.to_string()))?;

        let (node, key) = match &entry.child {
            Some(FsNode::File(file)) if file.is_closed() => file.stored()?,
            Some(child) => return Ok(child.clone()),
            None => (self.ctx.store.get(&entry.link.key)?, entry.link.key),
        };
        let child = self.wrap(name, node, key)?;
        entry.child = Some(child.clone());
        trace!(dir = %self.name, name, "Loaded child");
        Ok(child)
    }

    /// Bind an existing DAG node under `name`
    ///
    /// The node is written to the store so the binding survives a reload.
    pub fn add_child(&self, name: &str, node: DagNode) -> Result<(), MfsError> {
        self.ctx.ensure_open()?;
        validate_name(name)?;

        let mut state = self.state.write();
        if state.entries.contains_key(name) {
            return Err(MfsError::AlreadyExists(name.to_string()));
        }
        let key = self.ctx.store.put(&node)?;
        let size = node.cumulative_size()?;
        state.entries.insert(
            name.to_string(),
            Entry {
                link: Link {
                    name: name.to_string(),
                    key,
                    size,
                },
                child: None,
            },
        );
        drop(state);

        self.mark_dirty();
        debug!(dir = %self.name, name, key = %key, "Added child");
        Ok(())
    }

    /// Remove the binding for `name`
    pub fn unlink(&self, name: &str) -> Result<(), MfsError> {
        self.ctx.ensure_open()?;

        let removed = self.state.write().entries.remove(name);
        let entry = removed.ok_or_else(|| MfsError::NotFound(name.to_string()))?;
        if let Some(child) = entry.child {
            child.detach();
        }

        self.mark_dirty();
        debug!(dir = %self.name, name, "Unlinked child");
        Ok(())
    }

    /// Names of all children, without loading them
    pub fn names(&self) -> Result<Vec<String>, MfsError> {
        self.ctx.ensure_open()?;
        Ok(self.state.read().entries.keys().cloned().collect())
    }

    /// Describe every child
    ///
    /// Children are loaded so file sizes reflect unflushed writes. Callers that
    /// need a particular order should sort the result.
    pub fn list(self: &Arc<Self>) -> Result<Vec<NodeListing>, MfsError> {
        self.ctx.ensure_open()?;

        let names = self.names()?;
        let mut listing = Vec::with_capacity(names.len());
        for name in names {
            let child = match self.child(&name) {
                Ok(child) => child,
                // Unlinked concurrently
                Err(MfsError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            let size = match &child {
                FsNode::File(file) => file.size()?,
                FsNode::Directory(_) => 0,
            };
            listing.push(NodeListing {
                name,
                node_type: child.node_type(),
                size,
                key: child.key(),
            });
        }
        Ok(listing)
    }

    /// Write this directory and every dirty descendant to the store
    ///
    /// When this directory is a root's value, the new key is pinned and published.
    #[instrument(skip(self), fields(dir = %self.name))]
    pub fn flush(&self) -> Result<Key, MfsError> {
        self.ctx.ensure_open()?;
        let _guard = self.ctx.flush_lock.lock();

        let before = self.state.read().key;
        let link = self.flush_locked()?;

        let parent = self.parent.lock().clone();
        match parent {
            ParentRef::Root(root) => {
                if let Some(root) = root.upgrade() {
                    root.record_flush(link.key)?;
                }
            }
            other => {
                if link.key != before {
                    other.mark_dirty();
                }
            }
        }
        Ok(link.key)
    }

    /// Flush and return the resulting node
    pub fn get_node(&self) -> Result<DagNode, MfsError> {
        self.flush()?;
        Ok(self.state.read().node.clone())
    }

    pub(crate) fn flush_locked(&self) -> Result<Link, MfsError> {
        // A clean directory has no dirty descendants, so its last link is current
        if !self.dirty.swap(false, Ordering::SeqCst) {
            let state = self.state.read();
            return Ok(Link {
                name: self.name.clone(),
                key: state.key,
                size: state.size,
            });
        }

        let result = self.flush_entries();
        if result.is_err() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        result
    }

    fn flush_entries(&self) -> Result<Link, MfsError> {
        let mut state = self.state.write();
        for entry in state.entries.values_mut() {
            if let Some(child) = &entry.child {
                entry.link = child.flush_locked()?;
            }
        }

        let links = state.entries.values().map(|entry| entry.link.clone()).collect();
        let node = DagNode::directory(links);
        let key = self.ctx.store.put(&node)?;
        let size = node.cumulative_size()?;
        state.node = node;
        state.key = key;
        state.size = size;
        trace!(dir = %self.name, key = %key, "Flushed directory");

        Ok(Link {
            name: self.name.clone(),
            key,
            size,
        })
    }

    pub(crate) fn mark_dirty(&self) {
        if !self.dirty.swap(true, Ordering::SeqCst) {
            let parent = self.parent.lock().clone();
            parent.mark_dirty();
        }
    }

    pub(crate) fn context(&self) -> &Arc<TreeContext> {
        &self.ctx
    }

    pub(crate) fn detach(&self) {
        *self.parent.lock() = ParentRef::Detached;
    }

    fn wrap(self: &Arc<Self>, name: &str, node: DagNode, key: Key) -> Result<FsNode, MfsError> {
        let parent = ParentRef::Directory(Arc::downgrade(self));
        match node.node_type() {
            NodeType::Directory => {
                let size = node.cumulative_size()?;
                Ok(FsNode::Directory(Directory::from_node(
                    name.to_string(),
                    node,
                    key,
                    size,
                    parent,
                    self.ctx.clone(),
                )))
            }
            NodeType::File => Ok(FsNode::File(File::from_node(
                name.to_string(),
                node,
                key,
                parent,
                self.ctx.clone(),
            )?)),
        }
    }
}

/// Cached file handles that were closed are replaced on the next lookup
fn is_stale(child: &FsNode) -> bool {
    matches!(child, FsNode::File(file) if file.is_closed())
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("name", &self.name)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// Check a node is a directory before wrapping it as one
pub(crate) fn expect_directory(node: &DagNode) -> Result<(), MfsError> {
    match node.node_type() {
        NodeType::Directory => Ok(()),
        found => Err(wrong_type(NodeType::Directory, found)),
    }
}
