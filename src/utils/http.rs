//! HTTP client utilities.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;

/// Shared HTTP client with sensible defaults and an optional request rate limit.
///
/// Cloning is cheap; clones share the connection pool and the limiter.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::from_config(&HttpConfig::default())
    }

    /// Create a client from the `[http]` configuration section
    pub fn from_config(config: &HttpConfig) -> Result<Self, SourceError> {
        let user_agent = config.user_agent.clone().unwrap_or_else(|| {
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
        });

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        let limiter = rate_limiter(config.requests_per_second);

        Ok(Self { client, limiter })
    }

    /// Start a GET request once the rate limiter allows it
    pub async fn get(&self, url: &str) -> RequestBuilder {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        self.client.get(url)
    }

    /// Send a prepared request and return the body of a successful response
    pub async fn fetch_text(&self, request: RequestBuilder) -> Result<String, SourceError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let url = response.url().to_string();
            return Err(status_error(status, &url));
        }
        Ok(response.text().await?)
    }

    /// Send a prepared request and decode a successful JSON response
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, SourceError> {
        let body = self.fetch_text(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn rate_limiter(requests_per_second: f32) -> Option<Arc<DefaultDirectRateLimiter>> {
    if !(requests_per_second.is_finite() && requests_per_second > 0.0) {
        return None;
    }
    let period = Duration::try_from_secs_f32(1.0 / requests_per_second).ok()?;
    Quota::with_period(period).map(|quota| Arc::new(RateLimiter::direct(quota)))
}

/// Map a non-success status to the matching source error
pub fn status_error(status: StatusCode, url: &str) -> SourceError {
    match status {
        StatusCode::NOT_FOUND => SourceError::NotFound(url.to_string()),
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimit,
        s if s.is_server_error() => {
            SourceError::Network(format!("server returned {} for {}", s, url))
        }
        s => SourceError::Api(format!("status {} for {}", s, url)),
    }
}
