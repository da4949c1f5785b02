//! Sled-backed pinner

use crate::error::StorageError;
use crate::pin::Pinner;
use crate::types::Key;
use std::path::Path;

const PINS_TREE: &str = "pins";

/// Pin counts stored in the `pins` tree as big-endian u64 values
pub struct SledPinner {
    pins: sled::Tree,
}

impl SledPinner {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            pins: db.open_tree(PINS_TREE)?,
        })
    }

    fn decode_count(bytes: &[u8]) -> Result<u64, StorageError> {
        let raw: [u8; 8] = bytes.try_into().map_err(|_| {
            StorageError::Codec(format!("Invalid pin count length: {}", bytes.len()))
        })?;
        Ok(u64::from_be_bytes(raw))
    }

    /// Apply `delta` to the pin count of `key` atomically
    fn adjust(&self, key: &Key, delta: i64) -> Result<(), StorageError> {
        let mut bad_value = None;
        self.pins.update_and_fetch(key.as_slice(), |old| {
            let current = match old.map(Self::decode_count).transpose() {
                Ok(count) => count.unwrap_or(0),
                Err(e) => {
                    bad_value = Some(e);
                    return old.map(|bytes| bytes.to_vec());
                }
            };
            let next = if delta >= 0 {
                current.saturating_add(delta as u64)
            } else {
                current.saturating_sub(delta.unsigned_abs())
            };
            (next > 0).then(|| next.to_be_bytes().to_vec())
        })?;
        match bad_value {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Pinner for SledPinner {
    fn pin(&self, key: &Key) -> Result<(), StorageError> {
        self.adjust(key, 1)
    }

    fn unpin(&self, key: &Key) -> Result<(), StorageError> {
        self.adjust(key, -1)
    }

    fn is_pinned(&self, key: &Key) -> Result<bool, StorageError> {
        Ok(self.pins.contains_key(key.as_slice())?)
    }

    fn pinned(&self) -> Result<Vec<Key>, StorageError> {
        // sled iterates in key order, so the result is already sorted
        let mut keys = Vec::new();
        for item in self.pins.iter() {
            let (key, _) = item?;
            keys.push(Key::from_slice(&key)?);
        }
        Ok(keys)
    }
}
