// HTTP client for the GitHub activity feed API
//
// Implements `ghfeed_core::EventSource` over reqwest so an `EventFeed` can
// sit in front of the real upstream.

pub mod client;
pub mod config;

pub use client::{ClientError, GithubEventsClient};
pub use config::{ClientConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
