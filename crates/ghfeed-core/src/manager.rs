// Cache manager
//
// Owns the index cache, the details cache and the filter metadata, and is
// the only writer of their blobs in the key/value store.
//
// Nothing here returns an error to the caller. Unreadable or stale blobs
// load as empty shells, failed writes leave the in-memory state in use, and
// each outcome is recorded (`load_report`, `last_save`) so callers and tests
// can see which path was taken.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::details::{EventDetailsBlob, EventDetailsCache};
use crate::event::{recency_order, EventDetails, RawEvent};
use crate::index::{EventIndexCache, IndexPage, PageQuery};
use crate::prune::{create_event_details, create_index_entry};
use crate::source::FilterMetadata;
use crate::storage::KeyValueStore;

/// How a blob was loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum LoadOutcome {
    /// Parsed and current
    Loaded,
    /// Nothing stored under the key
    Missing,
    /// Stored with another version; cleared
    VersionMismatch { found: Option<String> },
    /// Could not be parsed; cleared
    Corrupt,
    /// The store itself could not be read
    Unavailable,
}

/// How a blob write ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved,
    /// Succeeded on the single retry after removing obsolete keys
    SavedAfterCleanup,
    /// Abandoned; the in-memory copy stays authoritative for this session
    Dropped,
}

impl SaveOutcome {
    pub fn is_persisted(&self) -> bool {
        !matches!(self, SaveOutcome::Dropped)
    }
}

/// Result of converting pre-split single-blob caches
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum MigrationOutcome {
    NothingToMigrate,
    /// Legacy events converted into the two-tier shape
    Migrated { events: usize },
    /// Legacy keys removed without conversion
    Discarded { keys: usize },
}

/// Load outcome per blob, from the last `reload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub index: LoadOutcome,
    pub details: LoadOutcome,
    pub filters: LoadOutcome,
}

/// Persisted filter metadata blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCacheBlob {
    pub version: String,
    #[serde(flatten)]
    pub metadata: FilterMetadata,
    pub last_fetched: i64,
}

/// Snapshot of cache state for display
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub version: String,
    pub index_entries: usize,
    pub index_capacity: usize,
    pub total_count: u64,
    pub index_last_fetched: Option<DateTime<Utc>>,
    pub index_stale: bool,
    pub details_entries: usize,
    pub details_capacity: usize,
    pub filters_cached: bool,
    pub filters_stale: bool,
}

/// Pre-split cache layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyCache {
    Wrapped {
        events: Vec<RawEvent>,
        #[serde(default, rename = "lastFetched", alias = "timestamp")]
        last_fetched: Option<i64>,
        #[serde(default, rename = "totalCount", alias = "total")]
        total_count: Option<u64>,
    },
    Bare(Vec<RawEvent>),
}

/// Two-tier event cache backed by a key/value store
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    index: EventIndexCache,
    details: EventDetailsCache,
    filters: Option<FilterCacheBlob>,
    load_report: LoadReport,
    migration: MigrationOutcome,
    last_save: Option<SaveOutcome>,
    /// Legacy keys being migrated; quota cleanup leaves them alone
    migrating: Vec<String>,
}

impl CacheManager {
    /// Open the cache using the wall clock
    pub fn open(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Open the cache: migrate legacy blobs first, then load current ones
    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut manager = Self {
            index: EventIndexCache::empty(&config.version),
            details: EventDetailsCache::new(&config.version, config.max_details_entries),
            filters: None,
            load_report: LoadReport {
                index: LoadOutcome::Missing,
                details: LoadOutcome::Missing,
                filters: LoadOutcome::Missing,
            },
            migration: MigrationOutcome::NothingToMigrate,
            last_save: None,
            migrating: Vec::new(),
            store,
            clock,
            config,
        };
        manager.migration = manager.migrate_old_cache();
        // Migrated caches that could not be written stay in memory for this session
        let keep_migrated = matches!(manager.migration, MigrationOutcome::Migrated { .. });
        manager.reload_blobs(keep_migrated);
        manager
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current time from the manager's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Re-read all blobs from the store
    pub fn reload(&mut self) {
        self.reload_blobs(false);
    }

    /// With `keep_unpersisted`, an event blob missing from the store keeps
    /// the in-memory copy instead of resetting it
    fn reload_blobs(&mut self, keep_unpersisted: bool) {
        let (index, index_outcome) = self.load_blob::<EventIndexCache>(&self.config.index_key);
        let (details, details_outcome) =
            self.load_blob::<EventDetailsBlob>(&self.config.details_key);
        let (filters, filters_outcome) = self.load_blob::<FilterCacheBlob>(&self.config.filters_key);

        let keep = |o: &LoadOutcome| keep_unpersisted && *o == LoadOutcome::Missing;
        match index {
            Some(mut index) => {
                index.normalize();
                index.events.truncate(self.config.max_index_entries);
                self.index = index;
            }
            None if keep(&index_outcome) => {}
            None => self.index = EventIndexCache::empty(&self.config.version),
        }
        match details {
            Some(blob) => {
                self.details = EventDetailsCache::from_blob(blob, self.config.max_details_entries);
            }
            None if keep(&details_outcome) => {}
            None => {
                self.details =
                    EventDetailsCache::new(&self.config.version, self.config.max_details_entries);
            }
        }
        self.filters = filters;

        let mismatch = |o: &LoadOutcome| matches!(o, LoadOutcome::VersionMismatch { .. });
        if mismatch(&index_outcome) || mismatch(&details_outcome) {
            // Index and details are written together; one stale half invalidates both
            self.clear_all_caches();
        }

        self.load_report = LoadReport {
            index: index_outcome,
            details: details_outcome,
            filters: filters_outcome,
        };
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    pub fn migration(&self) -> &MigrationOutcome {
        &self.migration
    }

    pub fn last_save(&self) -> Option<SaveOutcome> {
        self.last_save
    }

    // ============================================
    // Index
    // ============================================

    pub fn index(&self) -> &EventIndexCache {
        &self.index
    }

    /// Filtered, ordered page from the index cache
    pub fn get_index_page(&self, query: &PageQuery) -> IndexPage {
        self.index.page(query, self.clock.now())
    }

    /// Prune and merge fetched events into the index, then persist it
    pub fn update_index_cache(&mut self, events: &[RawEvent], total_count: u64) -> SaveOutcome {
        let entries = events.iter().map(create_index_entry).collect();
        let stats = self.index.merge(
            entries,
            total_count,
            self.clock.now_millis(),
            self.config.max_index_entries,
        );
        tracing::debug!(
            added = stats.added,
            replaced = stats.replaced,
            dropped = stats.dropped,
            cached = self.index.events.len(),
            "Merged events into index cache"
        );
        self.save_index()
    }

    /// Whether the index is older than its staleness window
    pub fn is_index_stale(&self) -> bool {
        let window = self.config.index_staleness.as_millis() as i64;
        self.index.age_millis(self.clock.now_millis()) >= window
    }

    // ============================================
    // Details
    // ============================================

    pub fn details(&self) -> &EventDetailsCache {
        &self.details
    }

    /// Insert one event's pruned details and persist
    pub fn add_event_details(&mut self, event: &RawEvent) -> SaveOutcome {
        self.details.insert(create_event_details(event));
        self.details.set_last_fetched(self.clock.now_millis());
        self.save_details()
    }

    /// Insert many events' pruned details with a single write.
    ///
    /// Events are inserted oldest first so the newest end up most recently
    /// used and survive eviction.
    pub fn add_many_event_details(&mut self, events: &[RawEvent]) -> SaveOutcome {
        let mut ordered: Vec<&RawEvent> = events.iter().collect();
        ordered.sort_by(|a, b| {
            recency_order(&a.created_at, &a.id, &b.created_at, &b.id).reverse()
        });
        for event in ordered {
            self.details.insert(create_event_details(event));
        }
        self.details.set_last_fetched(self.clock.now_millis());
        self.save_details()
    }

    /// Cache lookup only; a hit counts as a use for LRU purposes.
    ///
    /// The details blob is rewritten only when the hit changes the recency
    /// order, so repeated views of the same event cost no writes.
    pub fn get_event_details(&mut self, id: &str) -> Option<EventDetails> {
        let already_recent = self.details.is_most_recent(id);
        let found = self.details.get(id).cloned();
        if found.is_some() && !already_recent {
            self.save_details();
        }
        found
    }

    // ============================================
    // Filter metadata
    // ============================================

    pub fn filter_metadata(&self) -> Option<FilterMetadata> {
        self.filters.as_ref().map(|f| f.metadata.clone())
    }

    /// Missing filter metadata counts as stale
    pub fn are_filters_stale(&self) -> bool {
        match &self.filters {
            Some(filters) => {
                self.clock.now_millis().saturating_sub(filters.last_fetched)
                    >= self.config.filters_staleness.as_millis() as i64
            }
            None => true,
        }
    }

    pub fn update_filter_metadata(&mut self, metadata: FilterMetadata) -> SaveOutcome {
        let blob = FilterCacheBlob {
            version: self.config.version.clone(),
            metadata,
            last_fetched: self.clock.now_millis(),
        };
        let key = self.config.filters_key.clone();
        let outcome = self.save_blob(&key, &blob);
        self.filters = Some(blob);
        outcome
    }

    // ============================================
    // Lifecycle
    // ============================================

    /// Remove both event blobs and reset the in-memory caches
    pub fn clear_all_caches(&mut self) {
        for key in [self.config.index_key.clone(), self.config.details_key.clone()] {
            self.discard(&key);
        }
        self.index = EventIndexCache::empty(&self.config.version);
        self.details = EventDetailsCache::new(&self.config.version, self.config.max_details_entries);
        tracing::info!("Cleared event caches");
    }

    /// Convert or discard single-blob caches written before the index/detail
    /// split. Legacy events are only converted when no current index exists;
    /// otherwise the current data wins and the legacy keys are dropped.
    ///
    /// Converted legacy blobs are deleted only once both new blobs have been
    /// written, so a full store keeps them for the next attempt.
    pub fn migrate_old_cache(&mut self) -> MigrationOutcome {
        let mut found = 0;
        let mut readable: Vec<String> = Vec::new();
        let mut events: Vec<RawEvent> = Vec::new();
        let mut last_fetched = 0;
        let mut total_count = 0;

        for key in self.config.legacy_keys.clone() {
            let raw = match self.store.get_item(&key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to read legacy cache");
                    continue;
                }
            };
            found += 1;

            match serde_json::from_str::<LegacyCache>(&raw) {
                Ok(LegacyCache::Wrapped {
                    events: legacy,
                    last_fetched: fetched,
                    total_count: total,
                }) => {
                    last_fetched = last_fetched.max(fetched.unwrap_or(0));
                    total_count = total_count.max(total.unwrap_or(0));
                    events.extend(legacy);
                    readable.push(key);
                }
                Ok(LegacyCache::Bare(legacy)) => {
                    events.extend(legacy);
                    readable.push(key);
                }
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Discarding unreadable legacy cache");
                    self.discard(&key);
                }
            }
        }

        if found == 0 {
            return MigrationOutcome::NothingToMigrate;
        }

        let current_exists = self
            .store
            .contains_key(&self.config.index_key)
            .unwrap_or(true);
        if events.is_empty() || current_exists {
            for key in &readable {
                self.discard(key);
            }
            tracing::info!(keys = found, "Discarded legacy event cache");
            return MigrationOutcome::Discarded { keys: found };
        }

        let count = events.len();
        let mut index = EventIndexCache::empty(&self.config.version);
        index.merge(
            events.iter().map(create_index_entry).collect(),
            total_count.max(count as u64),
            last_fetched,
            self.config.max_index_entries,
        );
        self.index = index;
        self.details = EventDetailsCache::new(&self.config.version, self.config.max_details_entries);

        self.migrating = readable.clone();
        let details_saved = self.add_many_event_details(&events).is_persisted();
        let index_saved = self.save_index().is_persisted();
        self.migrating.clear();

        if details_saved && index_saved {
            for key in &readable {
                self.discard(key);
            }
            tracing::info!(events = count, "Migrated legacy event cache");
        } else {
            tracing::warn!(
                events = count,
                "Migrated legacy event cache in memory only, keeping legacy blobs"
            );
        }
        MigrationOutcome::Migrated { events: count }
    }

    /// Snapshot for display
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            version: self.config.version.clone(),
            index_entries: self.index.events.len(),
            index_capacity: self.config.max_index_entries,
            total_count: self.index.total_count,
            index_last_fetched: (self.index.last_fetched > 0)
                .then(|| DateTime::<Utc>::from_timestamp_millis(self.index.last_fetched))
                .flatten(),
            index_stale: self.is_index_stale(),
            details_entries: self.details.len(),
            details_capacity: self.details.max_size(),
            filters_cached: self.filters.is_some(),
            filters_stale: self.are_filters_stale(),
        }
    }

    // ============================================
    // Store I/O
    // ============================================

    fn save_index(&mut self) -> SaveOutcome {
        let key = self.config.index_key.clone();
        let blob = self.index.clone();
        self.save_blob(&key, &blob)
    }

    fn save_details(&mut self) -> SaveOutcome {
        let key = self.config.details_key.clone();
        let blob = self.details.to_blob();
        self.save_blob(&key, &blob)
    }

    fn load_blob<T: DeserializeOwned>(&self, key: &str) -> (Option<T>, LoadOutcome) {
        let raw = match self.store.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return (None, LoadOutcome::Missing),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read cache, treating as empty");
                return (None, LoadOutcome::Unavailable);
            }
        };

        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Corrupt cache blob, clearing");
                self.discard(key);
                return (None, LoadOutcome::Corrupt);
            }
        };

        let found = value.get("version").and_then(Value::as_str);
        if found != Some(self.config.version.as_str()) {
            tracing::info!(
                key = %key,
                found = ?found,
                expected = %self.config.version,
                "Cache version mismatch, clearing"
            );
            let found = found.map(str::to_string);
            self.discard(key);
            return (None, LoadOutcome::VersionMismatch { found });
        }

        match serde_json::from_value(value) {
            Ok(blob) => (Some(blob), LoadOutcome::Loaded),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Unexpected cache shape, clearing");
                self.discard(key);
                (None, LoadOutcome::Corrupt)
            }
        }
    }

    /// Write a blob; on quota exhaustion free obsolete keys and retry once
    fn save_blob<T: Serialize>(&mut self, key: &str, blob: &T) -> SaveOutcome {
        let outcome = match serde_json::to_string(blob) {
            Ok(json) => self.write_with_retry(key, &json),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize cache blob");
                SaveOutcome::Dropped
            }
        };
        self.last_save = Some(outcome);
        outcome
    }

    fn write_with_retry(&self, key: &str, json: &str) -> SaveOutcome {
        match self.store.set_item(key, json) {
            Ok(()) => SaveOutcome::Saved,
            Err(e) if e.is_quota_exceeded() => {
                let freed = self.free_space();
                tracing::warn!(
                    key = %key,
                    freed_keys = freed,
                    "Storage quota exceeded, retrying once"
                );
                match self.store.set_item(key, json) {
                    Ok(()) => SaveOutcome::SavedAfterCleanup,
                    Err(e) => {
                        tracing::warn!(
                            key = %key,
                            error = %e,
                            "Cache write dropped, continuing with in-memory state"
                        );
                        SaveOutcome::Dropped
                    }
                }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache write failed");
                SaveOutcome::Dropped
            }
        }
    }

    /// Remove legacy keys and obsolete keys sharing our prefix
    fn free_space(&self) -> usize {
        let current = [
            self.config.index_key.as_str(),
            self.config.details_key.as_str(),
            self.config.filters_key.as_str(),
        ];
        let mut obsolete: Vec<String> = self.config.legacy_keys.clone();
        if let Ok(keys) = self.store.keys() {
            obsolete.extend(keys.into_iter().filter(|k| {
                k.starts_with(&self.config.key_prefix) && !current.contains(&k.as_str())
            }));
        }
        obsolete.retain(|k| !self.migrating.contains(k));
        obsolete.sort();
        obsolete.dedup();

        let mut freed = 0;
        for key in &obsolete {
            if !matches!(self.store.contains_key(key), Ok(true)) {
                continue;
            }
            if self.store.remove_item(key).is_ok() {
                freed += 1;
            }
        }
        freed
    }

    fn discard(&self, key: &str) {
        if let Err(e) = self.store.remove_item(key) {
            tracing::warn!(key = %key, error = %e, "Failed to remove cache blob");
        }
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("version", &self.config.version)
            .field("index_entries", &self.index.events.len())
            .field("details", &self.details)
            .field("load_report", &self.load_report)
            .finish()
    }
}
