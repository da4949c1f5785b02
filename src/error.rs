//! Error types for the mutable filesystem layer.

use crate::types::{Key, NodeType};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Node not found: {0}")]
    NodeNotFound(Key),

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: Key, actual: Key },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Unavailable(format!("sled: {}", err))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Codec(err.to_string())
    }
}

/// Errors returned by Directory, File, Root and Filesystem operations
#[derive(Debug, Error)]
pub enum MfsError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Wrong node type: expected {expected}, found {found}")]
    WrongType { expected: NodeType, found: NodeType },

    #[error("Closed: {0}")]
    Closed(String),

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Node store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    /// The flush succeeded and produced `key`; only the notification failed.
    #[error("Publishing root {key} failed: {source}")]
    PublishFailed {
        key: Key,
        #[source]
        source: anyhow::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for MfsError {
    fn from(err: config::ConfigError) -> Self {
        MfsError::ConfigError(err.to_string())
    }
}

impl From<MfsError> for std::io::Error {
    fn from(err: MfsError) -> Self {
        let kind = match &err {
            MfsError::NotFound(_) => std::io::ErrorKind::NotFound,
            MfsError::AlreadyExists(_) => std::io::ErrorKind::AlreadyExists,
            MfsError::IoError(e) => e.kind(),
            MfsError::InvalidArgument(_) | MfsError::InvalidName(_) | MfsError::InvalidPath(_) => {
                std::io::ErrorKind::InvalidInput
            }
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}
