// Cache management commands

use crate::commands::Feed;
use crate::output::{print_field, print_notice, OutputFormat};
use anyhow::Result;
use clap::Subcommand;
use ghfeed_core::RefreshOutcome;

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Fetch the most recent events if the index is stale
    Refresh {
        /// Refresh even when the index is fresh
        #[arg(long)]
        force: bool,

        /// Number of events to fetch
        #[arg(long, default_value = "20")]
        page_size: u32,
    },

    /// Remove cached events and details
    Clear,

    /// Show cache statistics
    Stats,
}

pub async fn run(command: CacheCommand, feed: &Feed, output: OutputFormat, quiet: bool) -> Result<()> {
    match command {
        CacheCommand::Refresh { force, page_size } => {
            refresh(feed, output, quiet, force, page_size).await
        }
        CacheCommand::Clear => clear(feed, output, quiet),
        CacheCommand::Stats => stats(feed, output),
    }
}

async fn refresh(
    feed: &Feed,
    output: OutputFormat,
    quiet: bool,
    force: bool,
    page_size: u32,
) -> Result<()> {
    let outcome = if force {
        feed.refresh(1, page_size).await?
    } else {
        feed.refresh_if_stale(1, page_size).await
    };

    if !output.is_text() {
        return output.print_value(&outcome);
    }

    match &outcome {
        RefreshOutcome::Fresh => {
            if !quiet {
                println!("Cache is fresh, nothing to do (use --force to refresh anyway)");
            }
        }
        RefreshOutcome::Refreshed { fetched, .. } => {
            if !quiet {
                println!("Refreshed: fetched {fetched} events");
            }
        }
        RefreshOutcome::Failed { notice } => print_notice(notice),
    }
    Ok(())
}

fn clear(feed: &Feed, output: OutputFormat, quiet: bool) -> Result<()> {
    feed.with_manager(|manager| manager.clear_all_caches());

    if output.is_text() {
        if !quiet {
            println!("Cleared event cache");
        }
        Ok(())
    } else {
        output.print_value(&serde_json::json!({ "status": "cleared" }))
    }
}

fn stats(feed: &Feed, output: OutputFormat) -> Result<()> {
    let (stats, report) = feed.with_manager(|manager| (manager.stats(), manager.load_report().clone()));

    if !output.is_text() {
        return output.print_value(&serde_json::json!({ "stats": stats, "load": report }));
    }

    let last_fetched = stats
        .index_last_fetched
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());

    print_field("Version", &stats.version);
    print_field(
        "Index",
        &format!("{}/{} entries", stats.index_entries, stats.index_capacity),
    );
    print_field("Total events", &stats.total_count.to_string());
    print_field("Last fetched", &last_fetched);
    print_field("Index stale", &stats.index_stale.to_string());
    print_field(
        "Details",
        &format!("{}/{} entries", stats.details_entries, stats.details_capacity),
    );
    print_field(
        "Filters",
        match (stats.filters_cached, stats.filters_stale) {
            (false, _) => "not cached",
            (true, true) => "cached (stale)",
            (true, false) => "cached",
        },
    );
    Ok(())
}
