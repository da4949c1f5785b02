//! Core types for the mutable filesystem layer.

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash: Generic 256-bit hash value
pub type Hash = [u8; 32];

/// Key: content-derived identifier of an immutable DAG node
///
/// Two keys are equal iff their hash bytes are equal. Displayed as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(Hash);

impl Key {
    pub const fn from_bytes(hash: Hash) -> Self {
        Key(hash)
    }

    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a key from its 64 character hex form
    pub fn from_hex(s: &str) -> Result<Self, StorageError> {
        let bytes = hex::decode(s)
            .map_err(|e| StorageError::Codec(format!("Invalid key hex {:?}: {}", s, e)))?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, StorageError> {
        let hash: Hash = bytes.try_into().map_err(|_| {
            StorageError::Codec(format!("Invalid key length: {} (expected 32)", bytes.len()))
        })?;
        Ok(Key(hash))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", &self.to_hex()[..12])
    }
}

/// Kind of node found at a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Directory,
    File,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Directory => f.write_str("directory"),
            NodeType::File => f.write_str("file"),
        }
    }
}
