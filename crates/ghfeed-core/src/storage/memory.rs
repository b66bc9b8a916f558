//! In-memory implementation of KeyValueStore for testing

use parking_lot::RwLock;
use std::collections::HashMap;

use super::store::KeyValueStore;
use crate::error::StorageError;

/// In-memory key/value store
///
/// Usage is counted as the sum of key and value lengths in bytes, which is
/// how browsers account local storage. With a quota set, writes that would
/// exceed it fail the same way a full browser store does.
///
/// # Example
///
/// ```
/// use ghfeed_core::storage::{InMemoryStore, KeyValueStore};
///
/// let store = InMemoryStore::with_quota(16);
/// assert!(store.set_item("k", "small").is_ok());
/// assert!(store.set_item("k", "far too large for the quota").is_err());
/// ```
#[derive(Default)]
pub struct InMemoryStore {
    items: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
    /// Fail every write, regardless of size
    fail_writes: RwLock<bool>,
}

impl InMemoryStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store limited to `quota` bytes
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    /// Bytes currently used
    pub fn used_bytes(&self) -> usize {
        self.items
            .read()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    /// Make every subsequent write fail with a quota error
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write() = fail;
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        self.items.write().clear();
    }
}

impl KeyValueStore for InMemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let needed = key.len() + value.len();
        let mut items = self.items.write();

        if *self.fail_writes.read() {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                needed,
                available: 0,
            });
        }

        if let Some(quota) = self.quota {
            let used: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let available = quota.saturating_sub(used);
            if needed > available {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available,
                });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self.items.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
