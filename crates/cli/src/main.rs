// ghfeed CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Persist the cache as one JSON file per key under --cache-dir,
// so repeated invocations behave like page loads against a warm local cache.

mod commands;
mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ghfeed_client::{ClientConfig, GithubEventsClient, DEFAULT_API_URL};
use ghfeed_core::{CacheConfig, CacheManager, EventFeed, FileStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ghfeed")]
#[command(about = "ghfeed - Browse a GitHub activity feed through a local two-tier cache")]
#[command(version)]
pub struct Cli {
    /// Upstream API base URL
    #[arg(long, env = "GHFEED_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Bearer token for the upstream API
    #[arg(long, env = "GHFEED_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "GHFEED_TIMEOUT_SECS", default_value = "30")]
    pub timeout: u64,

    /// Directory holding the persisted cache
    #[arg(long, env = "GHFEED_CACHE_DIR", default_value = ".ghfeed-cache")]
    pub cache_dir: PathBuf,

    /// Byte quota for the cache directory
    #[arg(long, env = "GHFEED_CACHE_QUOTA")]
    pub cache_quota: Option<usize>,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List and inspect events
    Events {
        #[command(subcommand)]
        command: commands::events::EventsCommand,
    },

    /// Show the repositories and event types available for filtering
    Filters,

    /// Manage the local cache
    Cache {
        #[command(subcommand)]
        command: commands::cache::CacheCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before parsing so it can supply GHFEED_* defaults
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "ghfeed=warn" } else { "ghfeed=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = ?path, "Loaded .env");
    }

    let feed = build_feed(&cli)?;
    let output_format = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Events { command } => {
            commands::events::run(command, &feed, output_format, cli.quiet).await
        }
        Commands::Filters => commands::filters::run(&feed, output_format, cli.quiet).await,
        Commands::Cache { command } => {
            commands::cache::run(command, &feed, output_format, cli.quiet).await
        }
    }
}

fn build_feed(cli: &Cli) -> anyhow::Result<commands::Feed> {
    let mut store = FileStore::open(&cli.cache_dir)
        .with_context(|| format!("Failed to open cache directory: {}", cli.cache_dir.display()))?;
    if let Some(quota) = cli.cache_quota {
        store = store.with_quota(quota);
    }

    let manager = CacheManager::open(Arc::new(store), CacheConfig::default());
    tracing::debug!(
        cache_dir = %cli.cache_dir.display(),
        load_report = ?manager.load_report(),
        migration = ?manager.migration(),
        "Cache opened"
    );

    let mut config = ClientConfig::new(&cli.api_url).with_timeout(Duration::from_secs(cli.timeout));
    if let Some(token) = &cli.token {
        config = config.with_token(token);
    }
    let client = GithubEventsClient::new(config).context("Failed to create API client")?;

    Ok(EventFeed::new(manager, client))
}
