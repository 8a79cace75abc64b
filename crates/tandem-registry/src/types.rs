//! Core domain types for registry queries

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registry a package is published to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistryKind {
    /// npm registry
    Npm,
    /// crates.io registry
    CratesIo,
}

impl RegistryKind {
    /// Get the registry name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Npm => "npm",
            RegistryKind::CratesIo => "crates.io",
        }
    }
}

impl std::fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP client options shared by the registry clients
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Maximum requests per second; `None` disables client-side limiting
    pub requests_per_second: Option<u32>,
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent sent with every request (crates.io rejects requests without one)
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            requests_per_second: Some(10),
            timeout: Duration::from_secs(30),
            user_agent: format!("tandem/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
