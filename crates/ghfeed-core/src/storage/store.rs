//! KeyValueStore trait definition

use crate::error::StorageError;

/// Synchronous string key/value store with a finite quota.
///
/// Each call is atomic per key. Callers read, modify, and write a whole
/// value in one step; there is no cross-key transaction.
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// Fails with [`StorageError::QuotaExceeded`] when the store is full.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value; removing a missing key is not an error
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Whether a key is present
    fn contains_key(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get_item(key)?.is_some())
    }
}
