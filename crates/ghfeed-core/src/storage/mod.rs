//! Persistent key/value storage for cache blobs
//!
//! This module provides:
//! - [`KeyValueStore`] trait with local-storage semantics (synchronous, whole values per key)
//! - [`InMemoryStore`] for testing, with an optional quota
//! - [`FileStore`] keeping one file per key in a directory

mod file;
mod memory;
mod store;

pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::KeyValueStore;
