// Client configuration
//
// Loaded from environment variables, with builders for tests and the CLI.

use std::env;
use std::time::Duration;

/// Default upstream API base URL
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api/github";

/// Default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the upstream API client
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL; endpoints are appended as path segments
    pub base_url: String,

    /// Optional bearer token
    pub token: Option<String>,

    pub user_agent: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            user_agent: format!("ghfeed/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `GHFEED_API_URL`: upstream base URL (default: http://localhost:3000/api/github)
    /// - `GHFEED_TOKEN`: bearer token sent with every request
    /// - `GHFEED_TIMEOUT_SECS`: request timeout in seconds (default: 30)
    pub fn from_env() -> Self {
        let base_url = env::var("GHFEED_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let token = env::var("GHFEED_TOKEN").ok().filter(|t| !t.is_empty());
        let timeout_secs = env::var("GHFEED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            token,
            timeout: Duration::from_secs(timeout_secs),
            ..Self::new(base_url)
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

// Keep the token out of logs
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert!(config.token.is_none());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("ghfeed/"));
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::new("https://example.com/api")
            .with_token("secret")
            .with_user_agent("test-agent")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.base_url, "https://example.com/api");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ClientConfig::default().with_token("secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }
}
