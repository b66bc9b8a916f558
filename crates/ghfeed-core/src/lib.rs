// GitHub activity feed cache
//
// A two-tier cache for a rate-limited event listing API, sized for a small
// persistent key/value store (browser-local-storage semantics).
//
// Key design decisions:
// - Raw events are never stored; the pruner keeps a ~200 byte index entry per
//   event and a reduced type-specific payload for the detail view
// - The index (up to 1000 entries) drives listing, filtering and paging
// - Details (up to 150) are an LRU keyed by event id, populated lazily
// - Every blob carries a version; a mismatch clears it instead of upgrading
// - Cache failures degrade to "empty" or "miss" and are reported as outcome
//   values, never as errors
// - Storage, clock and upstream API are traits so everything runs in memory
//   under test

pub mod clock;
pub mod config;
pub mod cursor;
pub mod details;
pub mod error;
pub mod event;
pub mod feed;
pub mod index;
pub mod manager;
pub mod memory;
pub mod prune;
pub mod source;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use cursor::{CursorMove, FeedCursor, Position};
pub use details::{EventDetailsBlob, EventDetailsCache};
pub use error::{FeedError, Result, SourceError, StorageError};
pub use event::{EventDetails, EventIndexEntry, EventKind, FilterMeta, PrunedPayload, RawEvent};
pub use feed::{DetailLookup, EventFeed, FeedNotice, FeedPage, FilterLookup, Origin, RefreshOutcome};
pub use index::{DateRange, EventFilter, EventIndexCache, IndexPage, PageQuery};
pub use manager::{CacheManager, CacheStats, LoadOutcome, LoadReport, MigrationOutcome, SaveOutcome};
pub use prune::{create_event_details, create_index_entry, prune_event_payload};
pub use source::{EventPageResponse, EventQuery, EventSource, FilterMetadata};
pub use storage::{FileStore, InMemoryStore, KeyValueStore};
