//! HTTP client wrapper with rate limiting

use crate::error::{Error, Result};
use crate::types::ClientOptions;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter for a specific registry
pub type RegistryRateLimiter = Arc<
    RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
>;

/// Outcome of a GET that distinguishes "not found" from failure
pub enum Fetched<T> {
    Found(T),
    NotFound,
}

/// HTTP client wrapper for registry requests with rate limiting
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    rate_limiter: Option<RegistryRateLimiter>,
    registry: &'static str,
}

impl HttpClient {
    /// Create a client for one registry.
    pub fn new(registry: &'static str, options: &ClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;

        let rate_limiter = options
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Ok(Self {
            client,
            rate_limiter,
            registry,
        })
    }

    /// Wait for rate limiter if enabled
    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }

    fn map_transport(&self, name: &str, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                registry: self.registry.to_string(),
                name: name.to_string(),
            }
        } else {
            Error::network(self.registry, err.to_string())
        }
    }

    /// Make a GET request and deserialize the JSON response.
    ///
    /// `name` is the package being queried, used in error reports.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &url::Url,
        name: &str,
    ) -> Result<Fetched<T>> {
        self.wait_for_rate_limit().await;
        tracing::debug!(registry = self.registry, %url, "registry request");

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.map_transport(name, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Fetched::NotFound);
        }

        // Handle rate limiting (HTTP 429)
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimitExceeded(url.to_string()));
        }

        if !status.is_success() {
            return Err(Error::network(
                self.registry,
                format!("HTTP request failed with status {}: {}", status, url),
            ));
        }

        let body = response
            .json()
            .await
            .map_err(|e| self.map_transport(name, e))?;
        Ok(Fetched::Found(body))
    }
}
