// In-memory event source for examples and testing
//
// MockEventSource serves a fixed event list the way the upstream API does
// (most recent first, paged, filtered by repo/type/search) and records how
// often each endpoint was called. It can be switched into a failing mode to
// exercise the degraded paths of the feed.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::SourceError;
use crate::event::{recency_order, RawEvent};
use crate::prune::create_index_entry;
use crate::source::{EventPageResponse, EventQuery, EventSource, FilterMetadata};

/// Scriptable in-memory EventSource
#[derive(Default)]
pub struct MockEventSource {
    events: RwLock<Vec<RawEvent>>,
    filters: RwLock<FilterMetadata>,
    failure: RwLock<Option<SourceError>>,
    list_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    filter_calls: AtomicUsize,
}

impl MockEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source serving `events`, with filter metadata derived from them
    pub fn with_events(events: Vec<RawEvent>) -> Self {
        let source = Self::new();
        source.set_events(events);
        source
    }

    /// Replace the served events and derived filter metadata
    pub fn set_events(&self, mut events: Vec<RawEvent>) {
        events.sort_by(|a, b| recency_order(&a.created_at, &a.id, &b.created_at, &b.id));

        let mut repositories: Vec<String> = events.iter().map(|e| e.repo.name.clone()).collect();
        repositories.sort();
        repositories.dedup();
        let mut action_types: Vec<String> = events.iter().map(|e| e.event_type.clone()).collect();
        action_types.sort();
        action_types.dedup();

        *self.filters.write() = FilterMetadata {
            repositories,
            action_types,
        };
        *self.events.write() = events;
    }

    /// Make every call fail with `error` (or succeed again with `None`)
    pub fn set_failure(&self, error: Option<SourceError>) {
        *self.failure.write() = error;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn filter_calls(&self) -> usize {
        self.filter_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), SourceError> {
        match self.failure.read().as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn list_events(&self, query: &EventQuery) -> Result<EventPageResponse, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let now = Utc::now();
        let matching: Vec<RawEvent> = self
            .events
            .read()
            .iter()
            .filter(|e| query.filter.matches(&create_index_entry(e), now))
            .cloned()
            .collect();

        let per_page = query.per_page.max(1) as usize;
        let start = (query.page.max(1) as usize - 1) * per_page;
        Ok(EventPageResponse {
            total: matching.len() as u64,
            events: matching.into_iter().skip(start).take(per_page).collect(),
        })
    }

    async fn event_detail(&self, id: &str) -> Result<RawEvent, SourceError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        self.events
            .read()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(SourceError::NotFound)
    }

    async fn filter_metadata(&self) -> Result<FilterMetadata, SourceError> {
        self.filter_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.filters.read().clone())
    }
}
