// Error types for the feed cache
//
// Cache-level failures (corrupt blobs, quota, version mismatch) never reach
// callers as errors; the manager reports them as outcome values instead.
// These types cover the seams that can fail: the key/value store and the
// upstream source.

use thiserror::Error;

/// Result type alias for feed operations
pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors from a key/value store
#[derive(Debug, Error)]
pub enum StorageError {
    /// The write would exceed the store's quota
    #[error("storage quota exceeded writing {key} ({needed} bytes, {available} available)")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    /// Underlying I/O failure
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid key
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// Errors from the upstream event source
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    /// Upstream rate limit hit
    #[error("rate limit exceeded")]
    RateLimited,

    /// Access denied for another reason
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Event or resource does not exist
    #[error("not found")]
    NotFound,

    /// Transport failure or unexpected status
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body did not match the expected shape
    #[error("decode error: {0}")]
    Decode(String),
}

/// Errors surfaced by explicit feed operations
#[derive(Debug, Error)]
pub enum FeedError {
    /// Upstream source error
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Store error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
