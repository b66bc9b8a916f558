// Upstream event source
//
// The feed talks to the upstream API only through this trait, so the cache
// logic can be exercised with `memory::MockEventSource`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::event::RawEvent;
use crate::index::{EventFilter, PageQuery};

/// Page request sent upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub page: u32,
    pub per_page: u32,
    pub filter: EventFilter,
}

impl EventQuery {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page,
            filter: EventFilter::default(),
        }
    }

    /// Query-string pairs for the filters that are set
    pub fn filter_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(repo) = &self.filter.repo {
            params.push(("repo", repo.clone()));
        }
        if let Some(event_type) = &self.filter.event_type {
            params.push(("type", event_type.clone()));
        }
        if let Some(search) = self.filter.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(("search", search.to_string()));
        }
        if let Some(range) = self.filter.date_range {
            params.push(("date", range.as_str().to_string()));
        }
        params
    }
}

impl From<&PageQuery> for EventQuery {
    fn from(query: &PageQuery) -> Self {
        Self {
            page: query.page.max(1),
            per_page: query.page_size.max(1),
            filter: query.filter.clone(),
        }
    }
}

/// One upstream page of raw events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPageResponse {
    pub events: Vec<RawEvent>,
    /// Total matching events on the server
    pub total: u64,
}

/// Distinct values for the filter controls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterMetadata {
    pub repositories: Vec<String>,
    pub action_types: Vec<String>,
}

/// Upstream API for events
#[async_trait]
pub trait EventSource: Send + Sync {
    /// List one page of events, most recent first
    async fn list_events(&self, query: &EventQuery) -> Result<EventPageResponse, SourceError>;

    /// Fetch a single full event
    async fn event_detail(&self, id: &str) -> Result<RawEvent, SourceError>;

    /// Fetch the distinct repositories and event types
    async fn filter_metadata(&self) -> Result<FilterMetadata, SourceError>;
}
