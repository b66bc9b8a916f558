// Details cache: bounded LRU of pruned event payloads
//
// In memory the recency order lives in an `lru::LruCache` (O(1) touch and
// evict). The persisted blob flattens it to a map plus an id list ordered
// least-recently-used first.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::event::EventDetails;

/// Persisted details blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetailsBlob {
    pub version: String,
    pub events: BTreeMap<String, EventDetails>,
    /// Least recently used first
    pub lru: Vec<String>,
    pub max_size: usize,
    pub last_fetched: i64,
}

/// LRU cache of event details keyed by event id
pub struct EventDetailsCache {
    version: String,
    entries: LruCache<String, EventDetails>,
    max_size: usize,
    last_fetched: i64,
}

impl EventDetailsCache {
    /// Empty shell
    pub fn new(version: impl Into<String>, max_size: usize) -> Self {
        Self {
            version: version.into(),
            entries: LruCache::unbounded(),
            max_size,
            last_fetched: 0,
        }
    }

    /// Insert or replace an entry, marking it most recently used.
    ///
    /// Returns the id evicted to make room, if any.
    pub fn insert(&mut self, details: EventDetails) -> Option<String> {
        if self.entries.contains(&details.id) {
            self.entries.put(details.id.clone(), details);
            return None;
        }

        let evicted = if self.entries.len() >= self.max_size {
            self.entries.pop_lru().map(|(id, _)| id)
        } else {
            None
        };
        if let Some(id) = &evicted {
            tracing::debug!(evicted = %id, "Evicted least recently used event details");
        }

        if self.max_size > 0 {
            self.entries.put(details.id.clone(), details);
        }
        evicted
    }

    /// Look up an entry, marking it most recently used
    pub fn get(&mut self, id: &str) -> Option<&EventDetails> {
        self.entries.get(id)
    }

    /// Look up an entry without touching its recency
    pub fn peek(&self, id: &str) -> Option<&EventDetails> {
        self.entries.peek(id)
    }

    /// Whether `id` is the most recently used entry
    pub fn is_most_recent(&self, id: &str) -> bool {
        self.entries.iter().next().is_some_and(|(key, _)| key == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn last_fetched(&self) -> i64 {
        self.last_fetched
    }

    pub fn set_last_fetched(&mut self, millis: i64) {
        self.last_fetched = millis;
    }

    /// Ids from least to most recently used
    pub fn lru_order(&self) -> Vec<String> {
        self.entries.iter().rev().map(|(id, _)| id.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_fetched = 0;
    }

    /// Flatten into the persisted shape
    pub fn to_blob(&self) -> EventDetailsBlob {
        EventDetailsBlob {
            version: self.version.clone(),
            events: self
                .entries
                .iter()
                .map(|(id, details)| (id.clone(), details.clone()))
                .collect(),
            lru: self.lru_order(),
            max_size: self.max_size,
            last_fetched: self.last_fetched,
        }
    }

    /// Rebuild from a persisted blob.
    ///
    /// Ids in `lru` without an entry are skipped; entries missing from `lru`
    /// are treated as least recently used. The result is trimmed to
    /// `max_size`, which is the configured capacity rather than the stored one.
    pub fn from_blob(mut blob: EventDetailsBlob, max_size: usize) -> Self {
        let mut cache = Self::new(blob.version, max_size);
        cache.last_fetched = blob.last_fetched;

        let listed: std::collections::HashSet<&String> = blob.lru.iter().collect();
        let unlisted: Vec<String> = blob
            .events
            .keys()
            .filter(|id| !listed.contains(id))
            .cloned()
            .collect();

        for id in unlisted.iter().chain(blob.lru.iter()) {
            if let Some(details) = blob.events.remove(id) {
                cache.insert(details);
            }
        }
        cache
    }
}

impl std::fmt::Debug for EventDetailsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDetailsCache")
            .field("version", &self.version)
            .field("len", &self.entries.len())
            .field("max_size", &self.max_size)
            .field("last_fetched", &self.last_fetched)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PrunedPayload;
    use chrono::{TimeZone, Utc};

    fn details(id: &str) -> EventDetails {
        EventDetails {
            id: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            repo: "octo/repo".to_string(),
            event_type: "WatchEvent".to_string(),
            payload: PrunedPayload::Other(serde_json::json!({"action": "started"})),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = EventDetailsCache::new("5.0", 3);
        assert!(cache.insert(details("a")).is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().id, "a");
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = EventDetailsCache::new("5.0", 3);
        cache.insert(details("a"));
        cache.insert(details("b"));
        cache.insert(details("c"));

        // Touch "a" so "b" becomes the oldest
        cache.get("a");
        assert_eq!(cache.insert(details("d")), Some("b".to_string()));
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("b"));
        assert_eq!(cache.lru_order(), vec!["c", "a", "d"]);
    }

    #[test]
    fn test_is_most_recent() {
        let mut cache = EventDetailsCache::new("5.0", 3);
        assert!(!cache.is_most_recent("a"));
        cache.insert(details("a"));
        cache.insert(details("b"));
        assert!(cache.is_most_recent("b"));
        assert!(!cache.is_most_recent("a"));
        cache.get("a");
        assert!(cache.is_most_recent("a"));
    }

    #[test]
    fn test_peek_does_not_touch() {
        let mut cache = EventDetailsCache::new("5.0", 2);
        cache.insert(details("a"));
        cache.insert(details("b"));
        cache.peek("a");
        assert_eq!(cache.insert(details("c")), Some("a".to_string()));
    }

    #[test]
    fn test_replace_existing_does_not_evict() {
        let mut cache = EventDetailsCache::new("5.0", 2);
        cache.insert(details("a"));
        cache.insert(details("b"));
        assert!(cache.insert(details("a")).is_none());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lru_order(), vec!["b", "a"]);
    }

    #[test]
    fn test_blob_round_trip() {
        let mut cache = EventDetailsCache::new("5.0", 5);
        cache.insert(details("a"));
        cache.insert(details("b"));
        cache.insert(details("c"));
        cache.get("a");
        cache.set_last_fetched(1234);

        let blob = cache.to_blob();
        assert_eq!(blob.lru, vec!["b", "c", "a"]);

        let json = serde_json::to_string(&blob).unwrap();
        let parsed: EventDetailsBlob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, blob);

        let restored = EventDetailsCache::from_blob(parsed, 5);
        assert_eq!(restored.to_blob(), blob);
    }

    #[test]
    fn test_from_blob_repairs_inconsistent_lru() {
        let mut events = BTreeMap::new();
        for id in ["a", "b", "c"] {
            events.insert(id.to_string(), details(id));
        }
        let blob = EventDetailsBlob {
            version: "5.0".to_string(),
            events,
            lru: vec!["ghost".to_string(), "c".to_string(), "a".to_string()],
            max_size: 150,
            last_fetched: 0,
        };

        let cache = EventDetailsCache::from_blob(blob, 2);
        // "b" was unlisted, so it counted as oldest and was trimmed first
        assert_eq!(cache.lru_order(), vec!["c", "a"]);
        assert_eq!(cache.max_size(), 2);
    }

    #[test]
    fn test_blob_uses_camel_case_keys() {
        let cache = EventDetailsCache::new("5.0", 150);
        let json = serde_json::to_value(cache.to_blob()).unwrap();
        assert_eq!(json["maxSize"], 150);
        assert_eq!(json["lastFetched"], 0);
        assert!(json["lru"].as_array().unwrap().is_empty());
    }
}
