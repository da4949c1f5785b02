//! Named tree root
//!
//! A Root owns the top Directory of one tree. Every flush that reaches that
//! directory and changes its key pins the new key, unpins the previous one and
//! invokes the publish callback once.

use crate::dag::DagNode;
use crate::error::MfsError;
use crate::importer::ImportOptions;
use crate::mfs::dir::{expect_directory, Directory};
use crate::mfs::{FsNode, ParentRef, TreeContext};
use crate::pin::Pinner;
use crate::store::NodeStore;
use crate::types::Key;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Callback receiving each new root key
pub type PublishFn = Arc<dyn Fn(&Key) -> anyhow::Result<()> + Send + Sync>;

/// A publish callback that does nothing
pub fn noop_publish() -> PublishFn {
    Arc::new(|_key: &Key| -> anyhow::Result<()> { Ok(()) })
}

struct RootState {
    /// Last flushed and pinned key
    key: Key,
    published: Option<Key>,
    /// Set when `key` changed and has not been published since
    unpublished: bool,
    changed_at: Option<DateTime<Utc>>,
}

/// Snapshot of a root's bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootInfo {
    pub name: String,
    pub key: Key,
    pub last_published: Option<Key>,
    pub changed_at: Option<DateTime<Utc>>,
    pub closed: bool,
}

pub struct Root {
    name: String,
    dir: Arc<Directory>,
    ctx: Arc<TreeContext>,
    pinner: Arc<dyn Pinner>,
    publish: PublishFn,
    state: Mutex<RootState>,
}

impl Root {
    /// Open a root over `node`, which must be a directory
    ///
    /// The node is stored and pinned before the root is returned. Nothing is
    /// published until the tree changes.
    pub fn new(
        name: &str,
        node: DagNode,
        publish: PublishFn,
        store: Arc<dyn NodeStore>,
        pinner: Arc<dyn Pinner>,
        options: ImportOptions,
    ) -> Result<Arc<Self>, MfsError> {
        expect_directory(&node)?;
        let key = store.put(&node)?;
        let size = node.cumulative_size()?;
        pinner.pin(&key)?;

        let ctx = Arc::new(TreeContext::new(name.to_string(), store, options));
        let root = Arc::new_cyclic(|weak| Root {
            name: name.to_string(),
            dir: Directory::from_node(
                name.to_string(),
                node,
                key,
                size,
                ParentRef::Root(weak.clone()),
                ctx.clone(),
            ),
            ctx,
            pinner,
            publish,
            state: Mutex::new(RootState {
                key,
                published: None,
                unpublished: false,
                changed_at: None,
            }),
        });
        info!(root = %name, key = %key, "Opened root");
        Ok(root)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root directory as a generic node
    pub fn get_value(&self) -> FsNode {
        FsNode::Directory(self.dir.clone())
    }

    pub fn root_dir(&self) -> Arc<Directory> {
        self.dir.clone()
    }

    /// Last flushed and pinned key
    pub fn key(&self) -> Key {
        self.state.lock().key
    }

    pub fn last_published(&self) -> Option<Key> {
        self.state.lock().published
    }

    pub fn is_closed(&self) -> bool {
        self.ctx.is_closed()
    }

    pub fn info(&self) -> RootInfo {
        let state = self.state.lock();
        RootInfo {
            name: self.name.clone(),
            key: state.key,
            last_published: state.published,
            changed_at: state.changed_at,
            closed: self.ctx.is_closed(),
        }
    }

    /// Flush the whole tree, publishing if the root key changed
    pub fn flush(&self) -> Result<Key, MfsError> {
        self.dir.flush()
    }

    /// Publish the current key again, e.g. after `PublishFailed`
    pub fn republish(&self) -> Result<(), MfsError> {
        let _guard = self.ctx.flush_lock.lock();
        self.ctx.ensure_open()?;
        let key = self.key();
        self.publish_key(key)
    }

    /// Final flush; afterwards every operation on the tree fails with `Closed`
    ///
    /// The store is synced before the root is marked closed. If only publishing
    /// fails the root is still closed and the error carries the final key. A
    /// store failure leaves the root open so close can be retried; a retry also
    /// publishes a key whose earlier publish failed.
    #[instrument(skip(self), fields(root = %self.name))]
    pub fn close(&self) -> Result<Key, MfsError> {
        let _guard = self.ctx.flush_lock.lock();
        self.ctx.ensure_open()?;

        let flushed = self.dir.flush().and_then(|key| {
            let pending = self.state.lock().unpublished;
            if pending {
                self.publish_key(key)?;
            }
            Ok(key)
        });
        match flushed {
            Ok(key) => {
                self.ctx.store.sync()?;
                self.ctx.close();
                info!(root = %self.name, key = %key, "Closed root");
                Ok(key)
            }
            Err(e @ MfsError::PublishFailed { .. }) => {
                self.ctx.store.sync()?;
                self.ctx.close();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Release a root that was never handed out
    pub(crate) fn discard(&self) {
        let _guard = self.ctx.flush_lock.lock();
        let key = self.key();
        if let Err(e) = self.pinner.unpin(&key) {
            warn!(root = %self.name, key = %key, error = %e, "Failed to unpin discarded root");
        }
        self.ctx.close();
    }

    /// Record the key produced by a flush of the root directory
    ///
    /// Runs under the tree flush lock.
    pub(crate) fn record_flush(&self, key: Key) -> Result<(), MfsError> {
        let mut state = self.state.lock();
        if state.key == key {
            return Ok(());
        }

        // Nodes behind the key must be durable before it is pinned or announced.
        // On failure the key stays unrecorded, so the next flush retries.
        self.ctx.store.sync()?;

        // Pin the new key before releasing the old one so one is always protected
        self.pinner.pin(&key)?;
        if let Err(e) = self.pinner.unpin(&state.key) {
            warn!(root = %self.name, key = %state.key, error = %e, "Failed to unpin previous root");
        }
        state.key = key;
        state.unpublished = true;
        state.changed_at = Some(Utc::now());
        drop(state);

        self.publish_key(key)
    }

    fn publish_key(&self, key: Key) -> Result<(), MfsError> {
        match (self.publish)(&key) {
            Ok(()) => {
                let mut state = self.state.lock();
                state.published = Some(key);
                if state.key == key {
                    state.unpublished = false;
                }
                drop(state);
                info!(root = %self.name, key = %key, "Published root");
                Ok(())
            }
            Err(source) => {
                warn!(root = %self.name, key = %key, error = %source, "Publish failed");
                Err(MfsError::PublishFailed { key, source })
            }
        }
    }
}

impl std::fmt::Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Root")
            .field("name", &self.name)
            .field("key", &self.key())
            .field("closed", &self.is_closed())
            .finish()
    }
}
