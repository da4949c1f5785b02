//! Reading file DAGs back as bytes

use crate::dag::{DagNode, NodeData};
use crate::error::StorageError;
use crate::store::NodeStore;
use crate::types::NodeType;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// Read a whole file DAG into memory
pub fn cat(store: &dyn NodeStore, node: &DagNode) -> Result<Vec<u8>, StorageError> {
    let mut out = Vec::with_capacity(node.file_size().unwrap_or(0) as usize);
    append_file(store, node, &mut out)?;
    Ok(out)
}

fn append_file(
    store: &dyn NodeStore,
    node: &DagNode,
    out: &mut Vec<u8>,
) -> Result<(), StorageError> {
    match node.data() {
        NodeData::File { data, .. } => {
            out.extend_from_slice(data);
            for link in node.links() {
                let child = store.get(&link.key)?;
                append_file(store, &child, out)?;
            }
            Ok(())
        }
        NodeData::Directory => Err(StorageError::Codec(format!(
            "Expected a {} node, found a {}",
            NodeType::File,
            NodeType::Directory
        ))),
    }
}

/// Leaf bytes currently held by the reader
struct CachedLeaf {
    start: u64,
    data: Vec<u8>,
}

impl CachedLeaf {
    fn covers(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.start + self.data.len() as u64
    }
}

/// Seekable reader over a file DAG
///
/// Child nodes are fetched from the store only when the read position reaches
/// them; one leaf is cached at a time.
pub struct DagReader {
    store: Arc<dyn NodeStore>,
    root: DagNode,
    size: u64,
    offset: u64,
    leaf: Option<CachedLeaf>,
}

impl DagReader {
    pub fn new(store: Arc<dyn NodeStore>, root: DagNode) -> Result<Self, StorageError> {
        let size = root.file_size().ok_or_else(|| {
            StorageError::Codec(format!("Cannot read a {} node as a file", NodeType::Directory))
        })?;
        Ok(Self {
            store,
            root,
            size,
            offset: 0,
            leaf: None,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Descend from the root to the leaf containing `offset`
    fn load_leaf(&mut self, offset: u64) -> Result<(), StorageError> {
        let mut node = self.root.clone();
        let mut base = 0u64;
        loop {
            let (data, block_sizes) = match node.data() {
                NodeData::File {
                    data, block_sizes, ..
                } => (data, block_sizes),
                NodeData::Directory => {
                    return Err(StorageError::Codec(
                        "Directory node inside a file DAG".to_string(),
                    ))
                }
            };

            let inline = data.len() as u64;
            if node.links().is_empty() || offset < base + inline {
                self.leaf = Some(CachedLeaf {
                    start: base,
                    data: data.clone(),
                });
                return Ok(());
            }

            let mut child_start = base + inline;
            let mut next = None;
            for (link, block) in node.links().iter().zip(block_sizes) {
                if offset < child_start + block {
                    next = Some(link.key);
                    break;
                }
                child_start += block;
            }
            let key = next.ok_or_else(|| {
                StorageError::Codec(format!("Offset {} beyond end of file DAG", offset))
            })?;
            node = self.store.get(&key)?;
            base = child_start;
        }
    }
}

impl Read for DagReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() && self.offset < self.size {
            let cached = self
                .leaf
                .as_ref()
                .map_or(false, |leaf| leaf.covers(self.offset));
            if !cached {
                self.load_leaf(self.offset).map_err(|e| {
                    io::Error::new(io::ErrorKind::Other, format!("Failed to load chunk: {}", e))
                })?;
            }

            let leaf = match &self.leaf {
                Some(leaf) if leaf.covers(self.offset) => leaf,
                // Zero-length leaf in the middle of a file; nothing more to read here
                _ => break,
            };
            let within = (self.offset - leaf.start) as usize;
            let n = (leaf.data.len() - within).min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&leaf.data[within..within + n]);
            written += n;
            self.offset += n as u64;
        }
        Ok(written)
    }
}

impl Seek for DagReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.offset.checked_add_signed(delta),
        };
        match target {
            Some(offset) => {
                self.offset = offset;
                Ok(offset)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Seek to a negative or overflowing position",
            )),
        }
    }
}
