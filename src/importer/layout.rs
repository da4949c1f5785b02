//! Balanced file layout
//!
//! Leaves hold up to `chunk_size` bytes. Leaves are grouped into branch nodes of
//! at most `max_links` children, level by level, until a single root remains.

use crate::dag::{DagNode, Link};
use crate::error::StorageError;
use crate::importer::{Chunker, ImportOptions};
use crate::store::NodeStore;
use crate::types::Key;
use std::io::Read;
use tracing::{debug, instrument};

/// A stored node together with the sizes its parent needs to link it
struct Built {
    key: Key,
    node: DagNode,
    cumulative: u64,
    file_size: u64,
}

impl Built {
    fn store(store: &dyn NodeStore, node: DagNode) -> Result<Self, StorageError> {
        let key = store.put(&node)?;
        let cumulative = node.cumulative_size()?;
        let file_size = node.file_size().unwrap_or(0);
        Ok(Self {
            key,
            node,
            cumulative,
            file_size,
        })
    }
}

/// Build a file DAG from a byte stream, storing every node
///
/// Returns the root's Key and node. Empty input produces a single empty leaf.
#[instrument(skip(store, reader))]
pub fn build_dag_from_reader<R: Read>(
    store: &dyn NodeStore,
    reader: R,
    options: &ImportOptions,
) -> Result<(Key, DagNode), StorageError> {
    let max_links = options.max_links.max(2);

    let mut level = Vec::new();
    for chunk in Chunker::new(reader, options.chunk_size) {
        level.push(Built::store(store, DagNode::file_leaf(chunk?))?);
    }
    if level.is_empty() {
        level.push(Built::store(store, DagNode::file_leaf(Vec::new()))?);
    }
    debug!(leaves = level.len(), "Chunked input");

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len() / max_links + 1);
        let mut children = level.into_iter().peekable();
        while children.peek().is_some() {
            let group: Vec<Built> = children.by_ref().take(max_links).collect();
            let block_sizes = group.iter().map(|b| b.file_size).collect();
            let links = group
                .into_iter()
                .map(|b| Link {
                    name: String::new(),
                    key: b.key,
                    size: b.cumulative,
                })
                .collect();
            next.push(Built::store(store, DagNode::file_branch(links, block_sizes)?)?);
        }
        level = next;
    }

    // level has exactly one element here
    let root = level.remove(0);
    Ok((root.key, root.node))
}
