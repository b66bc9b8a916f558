// Cache configuration
//
// CacheConfig is plain data with defaults matching the browser deployment:
// 1000 index entries, 150 detail payloads, one-hour staleness windows.

use std::time::Duration;

/// Version stamped on every persisted blob; a mismatch clears the blob
pub const CACHE_VERSION: &str = "5.0";

pub const MAX_INDEX_ENTRIES: usize = 1000;
pub const MAX_DETAILS_ENTRIES: usize = 150;

pub const INDEX_KEY: &str = "github_events_index_v1";
pub const DETAILS_KEY: &str = "github_events_details_v1";
pub const FILTERS_KEY: &str = "github_filters";

/// Single-blob cache keys used before the index/detail split
pub const LEGACY_KEYS: [&str; 2] = ["github_events", "github_events_cache"];

/// Prefix shared by every key this cache has ever written
pub const KEY_PREFIX: &str = "github_events";

/// Configuration for the cache manager
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Expected blob version
    pub version: String,

    /// Maximum number of index entries kept (oldest dropped first)
    pub max_index_entries: usize,

    /// Maximum number of detail payloads kept (least recently used dropped first)
    pub max_details_entries: usize,

    /// Age after which the index triggers a background refresh
    pub index_staleness: Duration,

    /// Age after which filter metadata is fetched again
    pub filters_staleness: Duration,

    pub index_key: String,
    pub details_key: String,
    pub filters_key: String,

    /// Keys removed by migration and by quota recovery
    pub legacy_keys: Vec<String>,

    /// Keys with this prefix other than the current ones are treated as
    /// obsolete and removed under quota pressure
    pub key_prefix: String,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the blob version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the index capacity
    pub fn with_max_index_entries(mut self, max: usize) -> Self {
        self.max_index_entries = max;
        self
    }

    /// Set the details capacity
    pub fn with_max_details_entries(mut self, max: usize) -> Self {
        self.max_details_entries = max;
        self
    }

    /// Set the index staleness window
    pub fn with_index_staleness(mut self, staleness: Duration) -> Self {
        self.index_staleness = staleness;
        self
    }

    /// Set the filter metadata staleness window
    pub fn with_filters_staleness(mut self, staleness: Duration) -> Self {
        self.filters_staleness = staleness;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
            max_index_entries: MAX_INDEX_ENTRIES,
            max_details_entries: MAX_DETAILS_ENTRIES,
            index_staleness: Duration::from_secs(60 * 60),
            filters_staleness: Duration::from_secs(60 * 60),
            index_key: INDEX_KEY.to_string(),
            details_key: DETAILS_KEY.to_string(),
            filters_key: FILTERS_KEY.to_string(),
            legacy_keys: LEGACY_KEYS.iter().map(|k| k.to_string()).collect(),
            key_prefix: KEY_PREFIX.to_string(),
        }
    }
}
