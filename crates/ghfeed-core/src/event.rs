// Event data model
//
// RawEvent is what the upstream API returns. It is never persisted as-is:
// the pruner turns it into an EventIndexEntry (list rendering, filtering)
// and an EventDetails (detail pane) carrying a type-specific PrunedPayload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

// ============================================================================
// Upstream shape
// ============================================================================

/// Repository reference as returned by the events API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoRef {
    pub name: String,
}

/// A single event as returned by the upstream events API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub repo: RepoRef,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
}

/// Event types with a dedicated pruning rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Push,
    PullRequest,
    Issues,
    IssueComment,
    Create,
    Delete,
    Other,
}

impl EventKind {
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "PushEvent" => Self::Push,
            "PullRequestEvent" => Self::PullRequest,
            "IssuesEvent" => Self::Issues,
            "IssueCommentEvent" => Self::IssueComment,
            "CreateEvent" => Self::Create,
            "DeleteEvent" => Self::Delete,
            _ => Self::Other,
        }
    }
}

// ============================================================================
// Index entries
// ============================================================================

/// Display and filter metadata derived from the payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterMeta {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_count: Option<u64>,
}

/// Lightweight per-event record used for listing and filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventIndexEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// `owner/name`
    pub repo: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub filter_meta: FilterMeta,
}

/// Most-recent-first ordering shared by the index and the feed.
///
/// Equal timestamps fall back to the id, descending. Ids are compared
/// numerically when both are decimal integers (GitHub event ids grow
/// monotonically), lexically otherwise.
pub fn recency_order(
    a_created: &DateTime<Utc>,
    a_id: &str,
    b_created: &DateTime<Utc>,
    b_id: &str,
) -> Ordering {
    b_created.cmp(a_created).then_with(|| {
        match (a_id.parse::<u128>(), b_id.parse::<u128>()) {
            (Ok(a), Ok(b)) => b.cmp(&a),
            _ => b_id.cmp(a_id),
        }
    })
}

impl EventIndexEntry {
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        recency_order(&self.created_at, &self.id, &other.created_at, &other.id)
    }
}

// ============================================================================
// Pruned payloads
// ============================================================================
//
// Each struct lists exactly the fields kept for its event type. Deserializing
// a raw payload into one of them drops everything else.

/// Treat an explicit `null` like a missing field (GitHub sends `"user": null`
/// for deleted accounts)
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitAuthor {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitSummary {
    pub message: Option<String>,
    pub sha: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub head: Option<String>,
    pub before: Option<String>,
    /// Number of commits in the push
    pub size: Option<u64>,
    #[serde(deserialize_with = "null_as_default")]
    pub commits: Vec<CommitSummary>,
}

impl PushPayload {
    /// Commit count, falling back to the retained commit list
    pub fn commit_count(&self) -> u64 {
        self.size.unwrap_or(self.commits.len() as u64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSummary {
    pub login: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestSummary {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub state: Option<String>,
    pub html_url: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub user: UserSummary,
    #[serde(deserialize_with = "null_as_default")]
    pub base: BranchRef,
    #[serde(deserialize_with = "null_as_default")]
    pub head: BranchRef,
    /// Extra data attached by the upstream API (review counts, diff stats)
    #[serde(rename = "_enriched")]
    pub enriched: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestPayload {
    pub action: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub pull_request: PullRequestSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueSummary {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub state: Option<String>,
    pub html_url: Option<String>,
    pub comments: Option<u64>,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuesPayload {
    pub action: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub issue: IssueSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentedIssue {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub state: Option<String>,
    pub html_url: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub user: UserSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentSummary {
    pub body: Option<String>,
    pub html_url: Option<String>,
    pub created_at: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub user: UserSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueCommentPayload {
    pub action: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub issue: CommentedIssue,
    #[serde(deserialize_with = "null_as_default")]
    pub comment: CommentSummary,
}

/// Shared shape of CreateEvent and DeleteEvent payloads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefPayload {
    pub ref_type: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub description: Option<String>,
}

/// Type-specific reduced payload kept in the details cache
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PrunedPayload {
    Push(PushPayload),
    PullRequest(PullRequestPayload),
    Issues(IssuesPayload),
    IssueComment(IssueCommentPayload),
    Create(RefPayload),
    Delete(RefPayload),
    /// Unknown event types keep the raw payload unchanged
    Other(Value),
}

impl PrunedPayload {
    /// Decode a stored payload, using the event type to pick the shape
    pub fn from_stored(event_type: &str, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match EventKind::parse(event_type) {
            EventKind::Push => Self::Push(serde_json::from_value(value)?),
            EventKind::PullRequest => Self::PullRequest(serde_json::from_value(value)?),
            EventKind::Issues => Self::Issues(serde_json::from_value(value)?),
            EventKind::IssueComment => Self::IssueComment(serde_json::from_value(value)?),
            EventKind::Create => Self::Create(serde_json::from_value(value)?),
            EventKind::Delete => Self::Delete(serde_json::from_value(value)?),
            EventKind::Other => Self::Other(value),
        })
    }
}

// ============================================================================
// Details
// ============================================================================

/// Full (pruned) event used to render the detail view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredDetails")]
pub struct EventDetails {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub repo: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: PrunedPayload,
}

/// Wire form of EventDetails; the payload shape depends on `type`
#[derive(Deserialize)]
struct StoredDetails {
    id: String,
    created_at: DateTime<Utc>,
    repo: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<StoredDetails> for EventDetails {
    type Error = serde_json::Error;

    fn try_from(stored: StoredDetails) -> Result<Self, Self::Error> {
        let payload = PrunedPayload::from_stored(&stored.event_type, stored.payload)?;
        Ok(Self {
            id: stored.id,
            created_at: stored.created_at,
            repo: stored.repo,
            event_type: stored.event_type,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_kind_parse() {
        assert_eq!(EventKind::parse("PushEvent"), EventKind::Push);
        assert_eq!(EventKind::parse("DeleteEvent"), EventKind::Delete);
        assert_eq!(EventKind::parse("WatchEvent"), EventKind::Other);
        assert_eq!(EventKind::parse(""), EventKind::Other);
    }

    #[test]
    fn test_recency_order_newest_first() {
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(recency_order(&newer, "1", &older, "2"), Ordering::Less);
        assert_eq!(recency_order(&older, "1", &newer, "2"), Ordering::Greater);
    }

    #[test]
    fn test_recency_order_ties_use_numeric_id() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        // "10" > "9" numerically even though it sorts lower lexically
        assert_eq!(recency_order(&ts, "10", &ts, "9"), Ordering::Less);
        assert_eq!(recency_order(&ts, "abc", &ts, "abd"), Ordering::Greater);
    }

    #[test]
    fn test_details_deserialize_uses_type() {
        let json = serde_json::json!({
            "id": "1",
            "created_at": "2024-03-01T10:00:00Z",
            "repo": "octo/repo",
            "type": "CreateEvent",
            "payload": {"ref_type": "branch", "ref": "main", "description": null}
        });
        let details: EventDetails = serde_json::from_value(json).unwrap();
        match details.payload {
            PrunedPayload::Create(p) => {
                assert_eq!(p.ref_type.as_deref(), Some("branch"));
                assert_eq!(p.git_ref.as_deref(), Some("main"));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_raw_event_accepts_missing_payload() {
        let json = serde_json::json!({
            "id": "7",
            "type": "WatchEvent",
            "repo": {"name": "octo/repo", "url": "ignored"},
            "created_at": "2024-03-01T10:00:00Z"
        });
        let event: RawEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.payload, Value::Null);
        assert_eq!(event.repo.name, "octo/repo");
    }
}
