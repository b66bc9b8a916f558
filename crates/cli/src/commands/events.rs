// Event listing and detail commands

use crate::commands::Feed;
use crate::output::{
    format_time, print_field, print_notice, print_table_header, print_table_row, OutputFormat,
};
use anyhow::Result;
use clap::Subcommand;
use ghfeed_core::{
    DateRange, EventDetails, EventFilter, FeedPage, Origin, PageQuery, PrunedPayload,
    RefreshOutcome,
};

#[derive(Subcommand)]
pub enum EventsCommand {
    /// List a page of events, most recent first
    List {
        /// Page number (1-based)
        #[arg(long, short, default_value = "1")]
        page: u32,

        /// Events per page
        #[arg(long, default_value = "20")]
        per_page: u32,

        /// Only events in this repository (owner/name)
        #[arg(long, short)]
        repo: Option<String>,

        /// Only events of this type (e.g. PushEvent)
        #[arg(long = "type", short = 't')]
        event_type: Option<String>,

        /// Case-insensitive text to find in the summary
        #[arg(long, short)]
        search: Option<String>,

        /// Only events from this period
        #[arg(long, value_parser = ["today", "yesterday", "week", "month"])]
        date: Option<String>,
    },

    /// Show one event's details
    Show {
        /// Event ID
        event_id: String,
    },
}

pub async fn run(command: EventsCommand, feed: &Feed, output: OutputFormat, quiet: bool) -> Result<()> {
    match command {
        EventsCommand::List {
            page,
            per_page,
            repo,
            event_type,
            search,
            date,
        } => {
            let date_range = date
                .map(|d| d.parse::<DateRange>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            let filter = EventFilter {
                repo,
                event_type,
                search,
                date_range,
            };
            let query = PageQuery::new(page.max(1), per_page.max(1)).with_filter(filter);
            list(feed, output, quiet, &query).await
        }
        EventsCommand::Show { event_id } => show(feed, output, quiet, &event_id).await,
    }
}

async fn list(feed: &Feed, output: OutputFormat, quiet: bool, query: &PageQuery) -> Result<()> {
    let mut page = feed.page(query).await;

    // Background refresh of the most recent page once the index is stale
    match feed.refresh_if_stale(query.page, query.page_size).await {
        RefreshOutcome::Refreshed {
            reload_current_page: true,
            ..
        } => page = feed.page(query).await,
        RefreshOutcome::Failed { notice } if page.notice.is_none() => page.notice = Some(notice),
        _ => {}
    }

    if let Some(notice) = &page.notice {
        if !quiet {
            print_notice(notice);
        }
    }

    if !output.is_text() {
        return output.print_value(&page);
    }

    if page.entries.is_empty() {
        println!("No events found");
        return Ok(());
    }

    print_table_header(&[
        ("ID", 12),
        ("CREATED", 16),
        ("TYPE", 18),
        ("REPO", 24),
        ("SUMMARY", 50),
    ]);
    for entry in &page.entries {
        print_table_row(&[
            (&entry.id, 12),
            (&format_time(&entry.created_at), 16),
            (&entry.event_type, 18),
            (&entry.repo, 24),
            (&entry.filter_meta.summary, 50),
        ]);
    }

    if !quiet {
        println!();
        println!("{}", page_footer(&page));
    }
    Ok(())
}

fn page_footer(page: &FeedPage) -> String {
    let size = page.page_size.max(1) as u64;
    let pages = page.total_filtered.div_ceil(size).max(1);
    let origin = match page.origin {
        Origin::Cache => "cache",
        Origin::Network => "network",
    };
    format!(
        "Page {} of {} ({} events, from {})",
        page.page, pages, page.total_filtered, origin
    )
}

async fn show(feed: &Feed, output: OutputFormat, quiet: bool, event_id: &str) -> Result<()> {
    let lookup = feed.details(event_id).await;

    let Some(details) = &lookup.details else {
        match &lookup.notice {
            Some(notice) => anyhow::bail!("Event not found: {event_id} ({notice})"),
            None => anyhow::bail!("Event not found: {event_id}"),
        }
    };

    if !output.is_text() {
        return output.print_value(&lookup);
    }

    print_field("ID", &details.id);
    print_field("Type", &details.event_type);
    print_field("Repository", &details.repo);
    print_field("Created", &details.created_at.to_rfc3339());
    for (label, value) in detail_fields(details) {
        print_field(label, &value);
    }
    if let PrunedPayload::Push(push) = &details.payload {
        if !push.commits.is_empty() {
            println!();
            for commit in &push.commits {
                let sha = commit.sha.as_deref().unwrap_or("");
                let message = commit.message.as_deref().unwrap_or("");
                let first_line = message.lines().next().unwrap_or("");
                println!("  {:.7}  {}", sha, first_line);
            }
        }
    }

    if !quiet && lookup.origin == Origin::Cache {
        println!();
        println!("(from cache)");
    }
    Ok(())
}

/// Labelled fields for the type-specific part of an event
fn detail_fields(details: &EventDetails) -> Vec<(&'static str, String)> {
    let mut fields = Vec::new();
    let mut push = |label: &'static str, value: Option<String>| {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            fields.push((label, value));
        }
    };

    match &details.payload {
        PrunedPayload::Push(payload) => {
            push("Ref", payload.git_ref.clone());
            push("Commits", Some(payload.commit_count().to_string()));
            push("Head", payload.head.clone());
        }
        PrunedPayload::PullRequest(payload) => {
            let pr = &payload.pull_request;
            push("Action", payload.action.clone());
            push("Number", pr.number.map(|n| format!("#{n}")));
            push("Title", pr.title.clone());
            push("State", pr.state.clone());
            push("Author", pr.user.login.clone());
            if let (Some(head), Some(base)) = (&pr.head.git_ref, &pr.base.git_ref) {
                push("Branches", Some(format!("{head} -> {base}")));
            }
            push("URL", pr.html_url.clone());
        }
        PrunedPayload::Issues(payload) => {
            let issue = &payload.issue;
            push("Action", payload.action.clone());
            push("Number", issue.number.map(|n| format!("#{n}")));
            push("Title", issue.title.clone());
            push("State", issue.state.clone());
            push("Comments", issue.comments.map(|n| n.to_string()));
            let labels: Vec<&str> = issue.labels.iter().filter_map(|l| l.name.as_deref()).collect();
            push("Labels", Some(labels.join(", ")));
            push("URL", issue.html_url.clone());
        }
        PrunedPayload::IssueComment(payload) => {
            push("Issue", payload.issue.number.map(|n| format!("#{n}")));
            push("Title", payload.issue.title.clone());
            push("Commenter", payload.comment.user.login.clone());
            push("Comment", payload.comment.body.clone());
            push("URL", payload.comment.html_url.clone());
        }
        PrunedPayload::Create(payload) | PrunedPayload::Delete(payload) => {
            push("Ref type", payload.ref_type.clone());
            push("Ref", payload.git_ref.clone());
            push("Description", payload.description.clone());
        }
        PrunedPayload::Other(value) => {
            push("Payload", serde_json::to_string(value).ok());
        }
    }
    fields
}
