// Integration tests for the cache manager
//
// These tests drive CacheManager against an in-memory store with a manual
// clock, covering persistence, versioning, migration, quota recovery and
// the capacity invariants of both caches.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ghfeed_core::{
    event::RepoRef, CacheConfig, CacheManager, InMemoryStore, KeyValueStore, LoadOutcome,
    ManualClock, MigrationOutcome, PageQuery, RawEvent, SaveOutcome,
};
use serde_json::json;
use std::sync::Arc;

const INDEX_KEY: &str = "github_events_index_v1";
const DETAILS_KEY: &str = "github_events_details_v1";

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

fn push_event(id: u64, minutes_ago: i64, commits: usize) -> RawEvent {
    let commits: Vec<_> = (0..commits)
        .map(|i| json!({"sha": format!("{id}-{i}"), "message": "work", "author": {"name": "octo"}}))
        .collect();
    RawEvent {
        id: id.to_string(),
        event_type: "PushEvent".to_string(),
        repo: RepoRef {
            name: "octo/site".to_string(),
        },
        created_at: start() - Duration::minutes(minutes_ago),
        payload: json!({"ref": "refs/heads/main", "size": commits.len(), "commits": commits}),
    }
}

fn events(count: u64) -> Vec<RawEvent> {
    (1..=count).map(|i| push_event(i, i as i64, 1)).collect()
}

fn open(store: &Arc<InMemoryStore>, clock: &Arc<ManualClock>) -> CacheManager {
    CacheManager::with_clock(store.clone(), CacheConfig::default(), clock.clone())
}

fn setup() -> (Arc<InMemoryStore>, Arc<ManualClock>, CacheManager) {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let manager = open(&store, &clock);
    (store, clock, manager)
}

// =============================================================================
// Index cache
// =============================================================================

#[test]
fn test_three_push_events_page() {
    let (_store, _clock, mut manager) = setup();
    let batch = vec![push_event(1, 3, 2), push_event(2, 2, 2), push_event(3, 1, 2)];
    manager.update_index_cache(&batch, 3);

    let page = manager.get_index_page(&PageQuery::new(1, 20));
    assert_eq!(page.entries.len(), 3);
    assert_eq!(page.total_filtered, 3);
    for entry in &page.entries {
        assert_eq!(entry.filter_meta.summary, "Pushed 2 commits");
    }
    let ids: Vec<_> = page.entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["3", "2", "1"]);
}

#[test]
fn test_update_twice_is_idempotent() {
    let (_store, _clock, mut manager) = setup();
    let batch = events(25);
    manager.update_index_cache(&batch, 25);
    let first = manager.index().events.clone();

    manager.update_index_cache(&batch, 25);
    assert_eq!(manager.index().events, first);
}

#[test]
fn test_index_cap_keeps_most_recent() {
    let (_store, _clock, mut manager) = setup();

    // Two overlapping batches totalling more than the cap
    let older: Vec<_> = (1..=700).map(|i| push_event(i, 10_000 + i as i64, 1)).collect();
    let newer: Vec<_> = (701..=1400).map(|i| push_event(i, 1400 - i as i64, 1)).collect();
    manager.update_index_cache(&older, 700);
    manager.update_index_cache(&newer, 1400);

    let index = manager.index();
    assert_eq!(index.events.len(), 1000);
    assert_eq!(index.total_count, 1400);

    // All 700 newer ones plus the 300 most recent of the older batch
    let mut expected: Vec<RawEvent> = older.iter().chain(newer.iter()).cloned().collect();
    expected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let expected_ids: Vec<_> = expected.iter().take(1000).map(|e| e.id.clone()).collect();
    let actual_ids: Vec<_> = index.events.iter().map(|e| e.id.clone()).collect();
    assert_eq!(actual_ids, expected_ids);
}

#[test]
fn test_index_round_trip_through_store() {
    let (store, clock, mut manager) = setup();
    manager.update_index_cache(&events(5), 42);
    let saved = manager.index().clone();

    let reopened = open(&store, &clock);
    assert_eq!(reopened.load_report().index, LoadOutcome::Loaded);
    assert_eq!(reopened.index(), &saved);
    assert_eq!(reopened.index().total_count, 42);
    assert_eq!(reopened.index().last_fetched, start().timestamp_millis());
}

#[test]
fn test_staleness_window() {
    let (_store, clock, mut manager) = setup();
    // Never fetched
    assert!(manager.is_index_stale());

    manager.update_index_cache(&events(1), 1);
    assert!(!manager.is_index_stale());

    clock.advance(Duration::minutes(59));
    assert!(!manager.is_index_stale());
    clock.advance(Duration::minutes(1));
    assert!(manager.is_index_stale());
}

// =============================================================================
// Details cache
// =============================================================================

#[test]
fn test_details_lru_eviction_at_capacity() {
    let (_store, _clock, mut manager) = setup();
    for event in events(150) {
        manager.add_event_details(&event);
    }
    assert_eq!(manager.details().len(), 150);

    // "1" was inserted first and never touched
    manager.add_event_details(&push_event(151, 0, 1));
    assert_eq!(manager.details().len(), 150);
    assert!(!manager.details().contains("1"));
    assert!(manager.details().contains("2"));
    assert!(manager.details().contains("151"));
}

#[test]
fn test_get_protects_from_eviction() {
    let (_store, _clock, mut manager) = setup();
    for event in events(150) {
        manager.add_event_details(&event);
    }

    assert!(manager.get_event_details("1").is_some());
    manager.add_event_details(&push_event(151, 0, 1));

    assert!(manager.details().contains("1"));
    assert!(!manager.details().contains("2"));
}

#[test]
fn test_get_event_details_miss_is_none() {
    let (_store, _clock, mut manager) = setup();
    assert!(manager.get_event_details("404").is_none());
}

#[test]
fn test_repeat_view_of_recent_details_skips_write() {
    let (store, _clock, mut manager) = setup();
    manager.add_event_details(&push_event(1, 1, 1));
    manager.add_event_details(&push_event(2, 2, 1));
    assert_eq!(manager.last_save(), Some(SaveOutcome::Saved));
    store.set_fail_writes(true);

    // "2" is already most recently used: no write attempted
    assert!(manager.get_event_details("2").is_some());
    assert_eq!(manager.last_save(), Some(SaveOutcome::Saved));

    // "1" moves to the front, so the blob is rewritten
    assert!(manager.get_event_details("1").is_some());
    assert_eq!(manager.last_save(), Some(SaveOutcome::Dropped));
}

#[test]
fn test_bulk_details_keep_newest() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let config = CacheConfig::default().with_max_details_entries(3);
    let mut manager = CacheManager::with_clock(store, config, clock);

    manager.add_many_event_details(&events(5));
    let mut kept = manager.details().lru_order();
    kept.sort();
    // ids 1..3 are the most recent (fewest minutes ago)
    assert_eq!(kept, vec!["1", "2", "3"]);
}

#[test]
fn test_details_lru_persists_across_reopen() {
    let (store, clock, mut manager) = setup();
    manager.add_event_details(&push_event(1, 1, 1));
    manager.add_event_details(&push_event(2, 2, 1));
    manager.get_event_details("1");

    let reopened = open(&store, &clock);
    assert_eq!(reopened.load_report().details, LoadOutcome::Loaded);
    assert_eq!(reopened.details().lru_order(), vec!["2", "1"]);
    assert_eq!(reopened.details().to_blob(), manager.details().to_blob());
}

// =============================================================================
// Versioning and corruption
// =============================================================================

#[test]
fn test_version_mismatch_loads_empty_shell() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let stale = json!({
        "version": "4.0",
        "events": [{
            "id": "1",
            "created_at": "2024-06-15T11:00:00Z",
            "repo": "octo/site",
            "type": "PushEvent",
            "filter_meta": {"summary": "Pushed 1 commit"}
        }],
        "lastFetched": 1,
        "totalCount": 1
    });
    store.set_item(INDEX_KEY, &stale.to_string()).unwrap();

    let manager = open(&store, &clock);
    assert_eq!(
        manager.load_report().index,
        LoadOutcome::VersionMismatch {
            found: Some("4.0".to_string())
        }
    );
    assert_eq!(manager.index().version, "5.0");
    assert!(manager.index().events.is_empty());
    assert_eq!(store.get_item(INDEX_KEY).unwrap(), None);
}

#[test]
fn test_version_mismatch_clears_both_blobs() {
    let (store, clock, mut manager) = setup();
    manager.add_event_details(&push_event(1, 1, 1));
    assert!(store.get_item(DETAILS_KEY).unwrap().is_some());

    store
        .set_item(INDEX_KEY, r#"{"version":"4.0","events":[],"lastFetched":0,"totalCount":0}"#)
        .unwrap();

    let reopened = open(&store, &clock);
    assert!(reopened.details().is_empty());
    assert_eq!(store.get_item(DETAILS_KEY).unwrap(), None);
}

#[test]
fn test_corrupt_blob_treated_as_empty() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    store.set_item(INDEX_KEY, "{not json").unwrap();
    store
        .set_item(DETAILS_KEY, r#"{"version":"5.0","events":"wrong"}"#)
        .unwrap();

    let manager = open(&store, &clock);
    assert_eq!(manager.load_report().index, LoadOutcome::Corrupt);
    assert_eq!(manager.load_report().details, LoadOutcome::Corrupt);
    assert!(manager.index().events.is_empty());
    assert!(manager.details().is_empty());
}

#[test]
fn test_clear_all_caches() {
    let (store, _clock, mut manager) = setup();
    manager.update_index_cache(&events(3), 3);
    manager.add_event_details(&push_event(1, 1, 1));

    manager.clear_all_caches();
    assert!(manager.index().events.is_empty());
    assert!(manager.details().is_empty());
    assert_eq!(store.get_item(INDEX_KEY).unwrap(), None);
    assert_eq!(store.get_item(DETAILS_KEY).unwrap(), None);
}

// =============================================================================
// Migration
// =============================================================================

#[test]
fn test_migrates_wrapped_legacy_cache() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let legacy = json!({
        "events": events(4),
        "timestamp": 1_000,
        "totalCount": 90
    });
    store.set_item("github_events", &legacy.to_string()).unwrap();

    let manager = open(&store, &clock);
    assert_eq!(manager.migration(), &MigrationOutcome::Migrated { events: 4 });
    assert_eq!(manager.index().events.len(), 4);
    assert_eq!(manager.index().total_count, 90);
    assert_eq!(manager.index().last_fetched, 1_000);
    assert_eq!(manager.details().len(), 4);
    assert_eq!(store.get_item("github_events").unwrap(), None);
    assert_eq!(manager.load_report().index, LoadOutcome::Loaded);
}

#[test]
fn test_migrates_bare_legacy_array() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let legacy = serde_json::to_string(&events(2)).unwrap();
    store.set_item("github_events_cache", &legacy).unwrap();

    let manager = open(&store, &clock);
    assert_eq!(manager.migration(), &MigrationOutcome::Migrated { events: 2 });
    assert_eq!(manager.index().total_count, 2);
}

#[test]
fn test_legacy_discarded_when_current_exists() {
    let (store, clock, mut manager) = setup();
    manager.update_index_cache(&events(1), 1);
    store
        .set_item("github_events", &serde_json::to_string(&events(5)).unwrap())
        .unwrap();
    store.set_item("github_events_cache", "garbage").unwrap();

    let reopened = open(&store, &clock);
    assert_eq!(reopened.migration(), &MigrationOutcome::Discarded { keys: 2 });
    assert_eq!(reopened.index().events.len(), 1);
    assert_eq!(store.get_item("github_events").unwrap(), None);
    assert_eq!(store.get_item("github_events_cache").unwrap(), None);
}

#[test]
fn test_migration_survives_failed_writes() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let legacy = json!({"events": [push_event(1, 1, 2)], "totalCount": 1});
    store.set_item("github_events", &legacy.to_string()).unwrap();
    store.set_fail_writes(true);

    let manager = open(&store, &clock);
    assert_eq!(manager.migration(), &MigrationOutcome::Migrated { events: 1 });
    assert_eq!(manager.last_save(), Some(SaveOutcome::Dropped));

    // Served from memory for this session
    assert_eq!(manager.index().events.len(), 1);
    assert_eq!(manager.details().len(), 1);
    let page = manager.get_index_page(&PageQuery::new(1, 20));
    assert_eq!(page.entries[0].filter_meta.summary, "Pushed 2 commits");

    // Legacy blob kept so the next session can migrate again
    assert!(store.get_item("github_events").unwrap().is_some());
    assert_eq!(store.get_item(INDEX_KEY).unwrap(), None);

    store.set_fail_writes(false);
    let retried = open(&store, &clock);
    assert_eq!(retried.migration(), &MigrationOutcome::Migrated { events: 1 });
    assert_eq!(retried.load_report().index, LoadOutcome::Loaded);
    assert_eq!(retried.index().events.len(), 1);
    assert_eq!(store.get_item("github_events").unwrap(), None);
}

#[test]
fn test_no_legacy_nothing_to_migrate() {
    let (_store, _clock, manager) = setup();
    assert_eq!(manager.migration(), &MigrationOutcome::NothingToMigrate);
}

// =============================================================================
// Quota handling
// =============================================================================

#[test]
fn test_quota_retry_after_removing_obsolete_keys() {
    let store = Arc::new(InMemoryStore::with_quota(4_000));
    let clock = Arc::new(ManualClock::new(start()));
    let mut manager = open(&store, &clock);

    // Written after startup by something else, so migration did not see it
    store.set_item("github_events_index_v0", &"x".repeat(3_500)).unwrap();

    let outcome = manager.update_index_cache(&events(5), 5);
    assert_eq!(outcome, SaveOutcome::SavedAfterCleanup);
    assert_eq!(store.get_item("github_events_index_v0").unwrap(), None);
    assert!(store.get_item(INDEX_KEY).unwrap().is_some());
}

#[test]
fn test_quota_failure_keeps_memory_state() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let mut manager = open(&store, &clock);
    store.set_fail_writes(true);

    let outcome = manager.update_index_cache(&events(3), 3);
    assert_eq!(outcome, SaveOutcome::Dropped);
    assert_eq!(manager.last_save(), Some(SaveOutcome::Dropped));

    // Still served from memory
    let page = manager.get_index_page(&PageQuery::new(1, 10));
    assert_eq!(page.entries.len(), 3);
    assert_eq!(store.get_item(INDEX_KEY).unwrap(), None);
}

// =============================================================================
// Filter metadata
// =============================================================================

#[test]
fn test_filter_metadata_staleness() {
    let (store, clock, mut manager) = setup();
    assert!(manager.are_filters_stale());
    assert!(manager.filter_metadata().is_none());

    manager.update_filter_metadata(ghfeed_core::FilterMetadata {
        repositories: vec!["octo/site".to_string()],
        action_types: vec!["PushEvent".to_string()],
    });
    assert!(!manager.are_filters_stale());

    let stored: serde_json::Value =
        serde_json::from_str(&store.get_item("github_filters").unwrap().unwrap()).unwrap();
    assert_eq!(stored["actionTypes"][0], "PushEvent");
    assert_eq!(stored["lastFetched"], start().timestamp_millis());

    clock.advance(Duration::hours(1));
    assert!(manager.are_filters_stale());
    // Stale lists are still available as a fallback
    assert!(manager.filter_metadata().is_some());
}
