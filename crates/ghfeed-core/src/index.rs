// Index cache: ordered lightweight entries, filtering and paging
//
// Invariants kept by `merge`:
// - ids are unique
// - entries are ordered most-recent-first (see `recency_order`)
// - at most `max_entries` are kept; the oldest are dropped first

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::event::EventIndexEntry;

/// Persisted index blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIndexCache {
    pub version: String,
    pub events: Vec<EventIndexEntry>,
    /// Epoch milliseconds of the last merge; 0 when never fetched
    pub last_fetched: i64,
    /// Total reported by the server, may exceed `events.len()`
    pub total_count: u64,
}

/// Counts reported by a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub replaced: usize,
    pub dropped: usize,
}

impl EventIndexCache {
    /// Empty shell for the given version
    pub fn empty(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            events: Vec::new(),
            last_fetched: 0,
            total_count: 0,
        }
    }

    /// Merge new entries by id, keep ordering, and truncate to `max_entries`.
    ///
    /// An entry whose id is already cached replaces the old one; a later
    /// entry in the same batch wins over an earlier one.
    pub fn merge(
        &mut self,
        entries: Vec<EventIndexEntry>,
        total_count: u64,
        now_millis: i64,
        max_entries: usize,
    ) -> MergeStats {
        let mut stats = MergeStats::default();
        let mut positions: HashMap<String, usize> = self
            .events
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();

        for entry in entries {
            match positions.get(&entry.id) {
                Some(&i) => {
                    self.events[i] = entry;
                    stats.replaced += 1;
                }
                None => {
                    positions.insert(entry.id.clone(), self.events.len());
                    self.events.push(entry);
                    stats.added += 1;
                }
            }
        }

        self.normalize();
        if self.events.len() > max_entries {
            stats.dropped = self.events.len() - max_entries;
            self.events.truncate(max_entries);
        }

        self.last_fetched = now_millis;
        self.total_count = total_count;
        stats
    }

    /// Restore ordering and id uniqueness (first occurrence in order wins)
    pub fn normalize(&mut self) {
        self.events.sort_by(|a, b| a.recency_cmp(b));
        let mut seen = std::collections::HashSet::new();
        self.events.retain(|e| seen.insert(e.id.clone()));
    }

    /// Filter, order, and slice one page
    pub fn page(&self, query: &PageQuery, now: DateTime<Utc>) -> IndexPage {
        let mut filtered: Vec<&EventIndexEntry> = self
            .events
            .iter()
            .filter(|e| query.filter.matches(e, now))
            .collect();
        filtered.sort_by(|a, b| a.recency_cmp(b));

        let page = query.page.max(1);
        let page_size = query.page_size.max(1);
        let start = (page as usize - 1).saturating_mul(page_size as usize);
        let entries = filtered
            .iter()
            .skip(start)
            .take(page_size as usize)
            .map(|e| (*e).clone())
            .collect();

        IndexPage {
            entries,
            total_filtered: filtered.len(),
            page,
            page_size,
        }
    }

    /// Age in milliseconds at `now_millis`
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.last_fetched)
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Named date cutoff used by the feed filters (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    /// Since 00:00 today
    Today,
    /// Since 00:00 yesterday
    Yesterday,
    /// Last 7 days
    Week,
    /// Last 30 days
    Month,
}

impl DateRange {
    /// Earliest `created_at` that passes the filter
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);
        match self {
            DateRange::Today => midnight,
            DateRange::Yesterday => midnight - Duration::days(1),
            DateRange::Week => now - Duration::days(7),
            DateRange::Month => now - Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DateRange::Today => "today",
            DateRange::Yesterday => "yesterday",
            DateRange::Week => "week",
            DateRange::Month => "month",
        }
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "today" => Ok(DateRange::Today),
            "yesterday" => Ok(DateRange::Yesterday),
            "week" => Ok(DateRange::Week),
            "month" => Ok(DateRange::Month),
            other => Err(format!("unknown date range: {other}")),
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters applied before paging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Exact repository name (`owner/name`)
    pub repo: Option<String>,
    /// Exact event type (`PushEvent`)
    pub event_type: Option<String>,
    /// Case-insensitive substring of the summary
    pub search: Option<String>,
    pub date_range: Option<DateRange>,
}

impl EventFilter {
    pub fn is_empty(&self) -> bool {
        self.repo.is_none()
            && self.event_type.is_none()
            && self.search.as_deref().map_or(true, str::is_empty)
            && self.date_range.is_none()
    }

    pub fn matches(&self, entry: &EventIndexEntry, now: DateTime<Utc>) -> bool {
        if let Some(repo) = &self.repo {
            if &entry.repo != repo {
                return false;
            }
        }
        if let Some(event_type) = &self.event_type {
            if &entry.event_type != event_type {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            if !entry.filter_meta.summary.to_lowercase().contains(&needle) {
                return false;
            }
        }
        if let Some(range) = self.date_range {
            if entry.created_at < range.cutoff(now) {
                return false;
            }
        }
        true
    }
}

/// A page request (pages are 1-based)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub page_size: u32,
    pub filter: EventFilter,
}

impl PageQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            filter: EventFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// One page of filtered index entries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexPage {
    pub entries: Vec<EventIndexEntry>,
    pub total_filtered: usize,
    pub page: u32,
    pub page_size: u32,
}

impl IndexPage {
    /// Number of pages in the filtered set
    pub fn page_count(&self) -> usize {
        self.total_filtered.div_ceil(self.page_size.max(1) as usize)
    }

    pub fn is_last_page(&self) -> bool {
        self.page as usize >= self.page_count()
    }

    /// Whether this slice can be served without a network fetch: a full
    /// page, or a non-empty last page of the filtered set.
    pub fn is_satisfiable(&self) -> bool {
        self.entries.len() == self.page_size as usize
            || (!self.entries.is_empty() && self.is_last_page())
    }
}
