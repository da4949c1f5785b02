//! Pinning
//!
//! Pins mark keys that a garbage collector must keep. Pins are reference
//! counted: several roots opened from the same node each hold their own pin,
//! and the key stays protected until every one of them is released.

pub mod persistence;

pub use persistence::SledPinner;

use crate::error::StorageError;
use crate::types::Key;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Pinner interface
pub trait Pinner: Send + Sync {
    fn pin(&self, key: &Key) -> Result<(), StorageError>;
    /// Release one pin on `key`; releasing an unpinned key is a no-op
    fn unpin(&self, key: &Key) -> Result<(), StorageError>;
    fn is_pinned(&self, key: &Key) -> Result<bool, StorageError>;
    /// All currently pinned keys, sorted
    fn pinned(&self) -> Result<Vec<Key>, StorageError>;
}

/// In-memory pinner
#[derive(Default)]
pub struct MemoryPinner {
    counts: Mutex<HashMap<Key, u64>>,
}

impl MemoryPinner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pinner for MemoryPinner {
    fn pin(&self, key: &Key) -> Result<(), StorageError> {
        *self.counts.lock().entry(*key).or_insert(0) += 1;
        Ok(())
    }

    fn unpin(&self, key: &Key) -> Result<(), StorageError> {
        let mut counts = self.counts.lock();
        if let Some(count) = counts.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                counts.remove(key);
            }
        }
        Ok(())
    }

    fn is_pinned(&self, key: &Key) -> Result<bool, StorageError> {
        Ok(self.counts.lock().contains_key(key))
    }

    fn pinned(&self) -> Result<Vec<Key>, StorageError> {
        let mut keys: Vec<Key> = self.counts.lock().keys().copied().collect();
        keys.sort();
        Ok(keys)
    }
}
