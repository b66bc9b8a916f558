// Event feed: cache-first reads with network fallback
//
// The manager sits behind a mutex that is only held for synchronous
// read-modify-write steps, never across an `.await`. Concurrent fetches
// (a background refresh racing a page request) both merge by id, so the
// later write wins without corrupting either cache.

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{FeedError, Result, SourceError};
use crate::event::{EventDetails, EventIndexEntry};
use crate::index::{IndexPage, PageQuery};
use crate::manager::CacheManager;
use crate::prune::{create_event_details, create_index_entry};
use crate::source::{EventQuery, EventSource, FilterMetadata};

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Cache,
    Network,
}

/// Non-fatal condition shown alongside results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum FeedNotice {
    RateLimited,
    NotFound,
    Unavailable(String),
}

impl From<&SourceError> for FeedNotice {
    fn from(error: &SourceError) -> Self {
        match error {
            SourceError::RateLimited => FeedNotice::RateLimited,
            SourceError::NotFound => FeedNotice::NotFound,
            other => FeedNotice::Unavailable(other.to_string()),
        }
    }
}

impl std::fmt::Display for FeedNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedNotice::RateLimited => {
                write!(f, "GitHub rate limit exceeded, showing cached data if available")
            }
            FeedNotice::NotFound => write!(f, "Event not found"),
            FeedNotice::Unavailable(reason) => {
                write!(f, "Could not load events ({reason}), showing cached data if available")
            }
        }
    }
}

/// A page of the feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPage {
    pub entries: Vec<EventIndexEntry>,
    pub total_filtered: u64,
    pub page: u32,
    pub page_size: u32,
    pub origin: Origin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<FeedNotice>,
}

impl FeedPage {
    fn from_cache(page: IndexPage, notice: Option<FeedNotice>) -> Self {
        Self {
            total_filtered: page.total_filtered as u64,
            entries: page.entries,
            page: page.page,
            page_size: page.page_size,
            origin: Origin::Cache,
            notice,
        }
    }
}

/// Result of a detail lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailLookup {
    pub details: Option<EventDetails>,
    pub origin: Origin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<FeedNotice>,
}

/// Result of a filter metadata lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterLookup {
    pub metadata: FilterMetadata,
    pub origin: Origin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<FeedNotice>,
}

/// Result of a background refresh check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RefreshOutcome {
    /// Index is within its staleness window
    Fresh,
    /// Most recent page fetched and merged
    Refreshed {
        fetched: usize,
        /// The displayed page should be re-rendered (only when on page 1)
        reload_current_page: bool,
    },
    /// Refresh failed; cached data stays in use
    Failed { notice: FeedNotice },
}

/// Cache-first event feed over an upstream source
pub struct EventFeed<S> {
    manager: Mutex<CacheManager>,
    source: S,
}

impl<S: EventSource> EventFeed<S> {
    pub fn new(manager: CacheManager, source: S) -> Self {
        Self {
            manager: Mutex::new(manager),
            source,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run a synchronous step against the cache manager
    pub fn with_manager<R>(&self, f: impl FnOnce(&mut CacheManager) -> R) -> R {
        f(&mut self.manager.lock())
    }

    /// Serve a page from the index cache when the slice is complete,
    /// otherwise fetch it and merge the result back into the caches.
    pub async fn page(&self, query: &PageQuery) -> FeedPage {
        let cached = self.manager.lock().get_index_page(query);
        if cached.is_satisfiable() {
            return FeedPage::from_cache(cached, None);
        }

        tracing::debug!(
            page = query.page,
            page_size = query.page_size,
            cached = cached.entries.len(),
            "Index cache miss, fetching page"
        );

        match self.source.list_events(&EventQuery::from(query)).await {
            Ok(response) => {
                let now = {
                    let mut manager = self.manager.lock();
                    // A filtered total says nothing about the overall count
                    let total = if query.filter.is_empty() {
                        response.total
                    } else {
                        manager.index().total_count
                    };
                    manager.update_index_cache(&response.events, total);
                    manager.add_many_event_details(&response.events);
                    manager.now()
                };

                // Upstream filtering may be looser than ours (e.g. case-sensitive search)
                let mut entries: Vec<EventIndexEntry> = response
                    .events
                    .iter()
                    .map(create_index_entry)
                    .filter(|entry| query.filter.matches(entry, now))
                    .collect();
                let hidden = response.events.len() - entries.len();
                if hidden > 0 {
                    tracing::debug!(hidden, "Dropped upstream rows outside the filter");
                }
                entries.sort_by(|a, b| a.recency_cmp(b));
                FeedPage {
                    entries,
                    total_filtered: response.total.saturating_sub(hidden as u64),
                    page: query.page.max(1),
                    page_size: query.page_size.max(1),
                    origin: Origin::Network,
                    notice: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, page = query.page, "Event fetch failed, serving cache");
                FeedPage::from_cache(cached, Some(FeedNotice::from(&e)))
            }
        }
    }

    /// Details for the detail pane: cache first, then a single-event fetch
    pub async fn details(&self, id: &str) -> DetailLookup {
        let cached = self.manager.lock().get_event_details(id);
        if let Some(details) = cached {
            return DetailLookup {
                details: Some(details),
                origin: Origin::Cache,
                notice: None,
            };
        }

        match self.source.event_detail(id).await {
            Ok(event) => {
                self.manager.lock().add_event_details(&event);
                DetailLookup {
                    details: Some(create_event_details(&event)),
                    origin: Origin::Network,
                    notice: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, event_id = %id, "Event detail fetch failed");
                DetailLookup {
                    details: None,
                    origin: Origin::Network,
                    notice: Some(FeedNotice::from(&e)),
                }
            }
        }
    }

    /// Refresh the most recent page if the index is past its staleness window
    pub async fn refresh_if_stale(&self, current_page: u32, page_size: u32) -> RefreshOutcome {
        if !self.manager.lock().is_index_stale() {
            return RefreshOutcome::Fresh;
        }
        match self.refresh(current_page, page_size).await {
            Ok(outcome) => outcome,
            Err(FeedError::Source(e)) => RefreshOutcome::Failed {
                notice: FeedNotice::from(&e),
            },
            Err(e) => RefreshOutcome::Failed {
                notice: FeedNotice::Unavailable(e.to_string()),
            },
        }
    }

    /// Fetch the most recent page unconditionally and merge it
    pub async fn refresh(&self, current_page: u32, page_size: u32) -> Result<RefreshOutcome> {
        let response = self
            .source
            .list_events(&EventQuery::new(1, page_size.max(1)))
            .await?;

        {
            let mut manager = self.manager.lock();
            manager.update_index_cache(&response.events, response.total);
            manager.add_many_event_details(&response.events);
        }

        tracing::info!(fetched = response.events.len(), "Refreshed event index");
        Ok(RefreshOutcome::Refreshed {
            fetched: response.events.len(),
            reload_current_page: current_page <= 1,
        })
    }

    /// Filter metadata with its own staleness window; stale or missing lists
    /// are fetched again, and kept as a fallback when that fails
    pub async fn filter_metadata(&self) -> FilterLookup {
        let (cached, stale) = {
            let manager = self.manager.lock();
            (manager.filter_metadata(), manager.are_filters_stale())
        };
        if let (Some(metadata), false) = (&cached, stale) {
            return FilterLookup {
                metadata: metadata.clone(),
                origin: Origin::Cache,
                notice: None,
            };
        }

        match self.source.filter_metadata().await {
            Ok(metadata) => {
                self.manager.lock().update_filter_metadata(metadata.clone());
                FilterLookup {
                    metadata,
                    origin: Origin::Network,
                    notice: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Filter metadata fetch failed");
                FilterLookup {
                    metadata: cached.unwrap_or_default(),
                    origin: Origin::Cache,
                    notice: Some(FeedNotice::from(&e)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_from_error() {
        assert_eq!(FeedNotice::from(&SourceError::RateLimited), FeedNotice::RateLimited);
        assert_eq!(FeedNotice::from(&SourceError::NotFound), FeedNotice::NotFound);
        assert_eq!(
            FeedNotice::from(&SourceError::Http("timeout".to_string())),
            FeedNotice::Unavailable("HTTP error: timeout".to_string())
        );
    }

    #[test]
    fn test_rate_limit_message() {
        assert_eq!(
            FeedNotice::RateLimited.to_string(),
            "GitHub rate limit exceeded, showing cached data if available"
        );
    }
}
