// HTTP client wrapper for the GitHub activity feed API
//
// Endpoints (relative to the configured base URL):
//   GET events?page=&per_page=[&repo=&type=&search=&date=] -> { events, total }
//   GET events/{id}                                         -> RawEvent
//   GET filters                                             -> { repositories, actionTypes }

use async_trait::async_trait;
use ghfeed_core::{EventPageResponse, EventQuery, EventSource, FilterMetadata, RawEvent, SourceError};
use reqwest::{header, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::ClientConfig;

/// Header GitHub uses to report the remaining request budget
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Errors building a client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// `EventSource` backed by the upstream HTTP API
#[derive(Debug, Clone)]
pub struct GithubEventsClient {
    base_url: Url,
    token: Option<String>,
    http: reqwest::Client,
}

impl GithubEventsClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ClientError::InvalidUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: config.base_url,
                reason: "URL cannot have path segments".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url,
            token: config.token,
            http,
        })
    }

    /// Create a client from `GHFEED_*` environment variables
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let mut request = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            tracing::debug!(url = %url, error = %e, "Request failed");
            SourceError::Http(e.to_string())
        })?;

        tracing::debug!(url = %url, status = %response.status(), "Upstream response");
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, SourceError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }

        if status == StatusCode::FORBIDDEN {
            // GitHub signals an exhausted budget with a 403 and a zero remaining count
            let exhausted = response
                .headers()
                .get(RATE_LIMIT_REMAINING)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.trim() == "0");
            if exhausted {
                return Err(SourceError::RateLimited);
            }
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Forbidden(message));
        }

        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Http(format!("{}: {}", status.as_u16(), message)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl EventSource for GithubEventsClient {
    async fn list_events(&self, query: &EventQuery) -> Result<EventPageResponse, SourceError> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("per_page", query.per_page.to_string()),
        ];
        params.extend(query.filter_params());
        self.get(self.endpoint(&["events"]), &params).await
    }

    async fn event_detail(&self, id: &str) -> Result<RawEvent, SourceError> {
        self.get(self.endpoint(&["events", id]), &[]).await
    }

    async fn filter_metadata(&self) -> Result<FilterMetadata, SourceError> {
        self.get(self.endpoint(&["filters"]), &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> GithubEventsClient {
        GithubEventsClient::new(ClientConfig::new(base)).unwrap()
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let c = client("https://example.com/api/github");
        assert_eq!(
            c.endpoint(&["events"]).as_str(),
            "https://example.com/api/github/events"
        );
        assert_eq!(
            c.endpoint(&["events", "42"]).as_str(),
            "https://example.com/api/github/events/42"
        );
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let c = client("https://example.com/api/");
        assert_eq!(c.endpoint(&["filters"]).as_str(), "https://example.com/api/filters");
    }

    #[test]
    fn test_endpoint_escapes_id() {
        let c = client("https://example.com");
        assert_eq!(
            c.endpoint(&["events", "a/b"]).as_str(),
            "https://example.com/events/a%2Fb"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = GithubEventsClient::new(ClientConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { .. }));

        let err = GithubEventsClient::new(ClientConfig::new("mailto:someone@example.com")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { .. }));
    }
}
