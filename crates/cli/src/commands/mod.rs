// CLI subcommands

pub mod cache;
pub mod events;
pub mod filters;

use ghfeed_client::GithubEventsClient;
use ghfeed_core::EventFeed;

/// The feed every command runs against
pub type Feed = EventFeed<GithubEventsClient>;
