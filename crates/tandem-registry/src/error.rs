//! Error types for tandem-registry

use thiserror::Error;

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Registry query failure
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure (DNS, connection reset, 5xx, malformed body)
    #[error("network error querying {registry}: {message}")]
    Network { registry: String, message: String },

    /// The query did not complete within the configured timeout
    #[error("timed out querying {registry} for '{name}'")]
    Timeout { registry: String, name: String },

    /// Rate limit exceeded (HTTP 429)
    #[error("rate limit exceeded for URL: {0}")]
    RateLimitExceeded(String),

    /// Package not found in registry
    #[error("package '{name}' not found in {registry} registry")]
    UnknownPackage { name: String, registry: String },

    /// Invalid package name format
    #[error("invalid package name: {0}")]
    InvalidPackageName(String),

    /// Invalid URL format
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Base URL cannot take path segments (e.g. `mailto:`)
    #[error("URL cannot be used as a registry base: {0}")]
    InvalidBaseUrl(String),

    /// HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl Error {
    /// Whether retrying the same query later may succeed.
    ///
    /// Network failures, timeouts, and rate limiting are transient; an unknown
    /// package or a malformed name is terminal for that dependency.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network { .. } | Error::Timeout { .. } | Error::RateLimitExceeded(_)
        )
    }

    pub(crate) fn network(registry: &str, message: impl Into<String>) -> Self {
        Self::Network {
            registry: registry.to_string(),
            message: message.into(),
        }
    }
}
