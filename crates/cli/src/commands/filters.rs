// Filter metadata command

use crate::commands::Feed;
use crate::output::{print_notice, OutputFormat};
use anyhow::Result;

pub async fn run(feed: &Feed, output: OutputFormat, quiet: bool) -> Result<()> {
    let lookup = feed.filter_metadata().await;
    if let Some(notice) = &lookup.notice {
        if !quiet {
            print_notice(notice);
        }
    }

    if !output.is_text() {
        return output.print_value(&lookup);
    }

    let metadata = &lookup.metadata;
    if metadata.repositories.is_empty() && metadata.action_types.is_empty() {
        println!("No filter metadata available");
        return Ok(());
    }

    println!("Repositories:");
    for repo in &metadata.repositories {
        println!("  {repo}");
    }
    println!();
    println!("Event types:");
    for event_type in &metadata.action_types {
        println!("  {event_type}");
    }

    Ok(())
}
