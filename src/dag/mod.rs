//! Immutable Merkle DAG nodes
//!
//! A `DagNode` is the unit stored in the node store. Its Key is derived from its
//! bincode encoding, so any change produces a new node with a new Key. Directory
//! nodes carry a link table of `(name, key, size)` entries; file nodes carry either
//! inline bytes (leaves) or links to child chunks with their logical sizes (branches).

pub mod hasher;

use crate::error::StorageError;
use crate::types::{Key, NodeType};
use serde::{Deserialize, Serialize};

/// Named reference from one node to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub key: Key,
    /// Cumulative encoded size of the linked subtree
    pub size: u64,
}

/// Payload of a DAG node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeData {
    Directory,
    File {
        /// Inline bytes (leaves only)
        data: Vec<u8>,
        /// Logical size of the whole file subtree
        file_size: u64,
        /// Logical bytes under each link (branches only)
        block_sizes: Vec<u64>,
    },
}

/// Immutable DAG node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagNode {
    data: NodeData,
    links: Vec<Link>,
}

impl DagNode {
    /// An empty directory node
    pub fn empty_directory() -> Self {
        Self {
            data: NodeData::Directory,
            links: Vec::new(),
        }
    }

    /// A directory node with the given links
    ///
    /// Links are sorted by name so that equal directories always hash equally.
    pub fn directory(mut links: Vec<Link>) -> Self {
        links.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            data: NodeData::Directory,
            links,
        }
    }

    /// A file leaf holding bytes inline
    pub fn file_leaf(data: Vec<u8>) -> Self {
        let file_size = data.len() as u64;
        Self {
            data: NodeData::File {
                data,
                file_size,
                block_sizes: Vec::new(),
            },
            links: Vec::new(),
        }
    }

    /// A file branch over child chunks
    ///
    /// `block_sizes[i]` is the logical byte count reachable through `links[i]`.
    pub fn file_branch(links: Vec<Link>, block_sizes: Vec<u64>) -> Result<Self, StorageError> {
        if links.len() != block_sizes.len() {
            return Err(StorageError::Codec(format!(
                "File branch has {} links but {} block sizes",
                links.len(),
                block_sizes.len()
            )));
        }
        let file_size = block_sizes.iter().sum();
        Ok(Self {
            data: NodeData::File {
                data: Vec::new(),
                file_size,
                block_sizes,
            },
            links,
        })
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node_type(&self) -> NodeType {
        match self.data {
            NodeData::Directory => NodeType::Directory,
            NodeData::File { .. } => NodeType::File,
        }
    }

    /// Logical size of a file node, `None` for directories
    pub fn file_size(&self) -> Option<u64> {
        match &self.data {
            NodeData::File { file_size, .. } => Some(*file_size),
            NodeData::Directory => None,
        }
    }

    /// Find a link by name
    pub fn find_link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.name == name)
    }

    /// Serialize the node (bincode)
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a node (bincode)
    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Content-derived Key of this node
    pub fn key(&self) -> Result<Key, StorageError> {
        let encoded = self.encode()?;
        Ok(hasher::compute_node_key(&encoded))
    }

    /// Encoded size of this node plus the cumulative size of everything it links to
    pub fn cumulative_size(&self) -> Result<u64, StorageError> {
        let own = bincode::serialized_size(self)?;
        Ok(own + self.links.iter().map(|link| link.size).sum::<u64>())
    }
}
