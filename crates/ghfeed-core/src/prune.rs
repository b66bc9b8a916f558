// Payload pruner
//
// Reduces raw upstream events to storage-safe shapes. Both entry points are
// pure and total: an unexpected payload shape for a known type degrades to
// an empty payload of that type instead of failing.
//
// Fields not kept here are gone for good; a detail view that needs them has
// to fetch the event again.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::event::{
    EventDetails, EventIndexEntry, EventKind, FilterMeta, PrunedPayload, PushPayload, RawEvent,
    RefPayload,
};

/// Reduce a raw event payload to its type-specific pruned shape
pub fn prune_event_payload(event: &RawEvent) -> PrunedPayload {
    match EventKind::parse(&event.event_type) {
        EventKind::Push => {
            let mut push: PushPayload = reduce(event);
            // Normalize so the stored payload always carries the count
            push.size = Some(push.commit_count());
            PrunedPayload::Push(push)
        }
        EventKind::PullRequest => PrunedPayload::PullRequest(reduce(event)),
        EventKind::Issues => PrunedPayload::Issues(reduce(event)),
        EventKind::IssueComment => PrunedPayload::IssueComment(reduce(event)),
        EventKind::Create => PrunedPayload::Create(reduce(event)),
        EventKind::Delete => PrunedPayload::Delete(reduce(event)),
        EventKind::Other => PrunedPayload::Other(event.payload.clone()),
    }
}

/// Build the lightweight index entry for an event
pub fn create_index_entry(event: &RawEvent) -> EventIndexEntry {
    let payload = prune_event_payload(event);
    EventIndexEntry {
        id: event.id.clone(),
        created_at: event.created_at,
        repo: event.repo.name.clone(),
        event_type: event.event_type.clone(),
        filter_meta: filter_meta(&event.event_type, &payload),
    }
}

/// Build the details record for an event
pub fn create_event_details(event: &RawEvent) -> EventDetails {
    EventDetails {
        id: event.id.clone(),
        created_at: event.created_at,
        repo: event.repo.name.clone(),
        event_type: event.event_type.clone(),
        payload: prune_event_payload(event),
    }
}

/// Derive display/filter metadata from an already pruned payload
pub fn filter_meta(event_type: &str, payload: &PrunedPayload) -> FilterMeta {
    match payload {
        PrunedPayload::Push(push) => {
            let count = push.commit_count();
            FilterMeta {
                summary: format!("Pushed {} {}", count, plural(count, "commit")),
                title: None,
                commit_count: Some(count),
            }
        }
        PrunedPayload::PullRequest(pr) => {
            titled(pr.pull_request.title.clone(), event_type, |title| title)
        }
        PrunedPayload::Issues(issues) => titled(issues.issue.title.clone(), event_type, |title| title),
        PrunedPayload::IssueComment(comment) => {
            titled(comment.issue.title.clone(), event_type, |title| {
                format!("Commented on issue: {title}")
            })
        }
        PrunedPayload::Create(r) => ref_summary("Created", r),
        PrunedPayload::Delete(r) => ref_summary("Deleted", r),
        PrunedPayload::Other(_) => FilterMeta {
            summary: short_type_name(event_type).to_string(),
            title: None,
            commit_count: None,
        },
    }
}

/// `WatchEvent` -> `Watch`
pub fn short_type_name(event_type: &str) -> &str {
    event_type.strip_suffix("Event").unwrap_or(event_type)
}

fn reduce<T: DeserializeOwned + Default>(event: &RawEvent) -> T {
    if event.payload.is_null() {
        return T::default();
    }
    match serde_json::from_value(event.payload.clone()) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %e,
                "Unexpected payload shape, keeping empty payload"
            );
            T::default()
        }
    }
}

fn titled(
    title: Option<String>,
    event_type: &str,
    summarize: impl FnOnce(String) -> String,
) -> FilterMeta {
    match title {
        Some(title) => FilterMeta {
            summary: summarize(title.clone()),
            title: Some(title),
            commit_count: None,
        },
        None => FilterMeta {
            summary: short_type_name(event_type).to_string(),
            title: None,
            commit_count: None,
        },
    }
}

fn ref_summary(verb: &str, payload: &RefPayload) -> FilterMeta {
    let parts: Vec<&str> = [payload.ref_type.as_deref(), payload.git_ref.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    let summary = if parts.is_empty() {
        verb.to_string()
    } else {
        format!("{} {}", verb, parts.join(" "))
    };
    FilterMeta {
        summary,
        title: None,
        commit_count: None,
    }
}

fn plural(count: u64, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}
