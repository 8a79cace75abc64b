//! In-memory registry for offline runs and tests.

use crate::error::{Error, Result};
use crate::types::RegistryKind;
use crate::Registry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Failure a [`MemoryRegistry`] can be told to produce for a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFailure {
    /// Behave like an unreachable registry
    Network,
    /// Behave like a query that timed out
    Timeout,
}

/// Registry backed by a fixed version table.
///
/// Names without an entry are reported as unknown packages. Clones share
/// the query log.
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    kind: RegistryKind,
    packages: HashMap<String, Vec<String>>,
    failures: HashMap<String, SimulatedFailure>,
    delays: HashMap<String, Duration>,
    queried: Arc<Mutex<Vec<String>>>,
}

impl MemoryRegistry {
    /// Empty registry of the given kind
    pub fn new(kind: RegistryKind) -> Self {
        Self {
            kind,
            packages: HashMap::new(),
            failures: HashMap::new(),
            delays: HashMap::new(),
            queried: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Names queried so far, in order
    pub fn queried(&self) -> Vec<String> {
        self.queried
            .lock()
            .map(|queried| queried.clone())
            .unwrap_or_default()
    }

    /// Publish `versions` for `name`.
    pub fn with_package<I, S>(mut self, name: impl Into<String>, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages
            .insert(name.into(), versions.into_iter().map(Into::into).collect());
        self
    }

    /// Make every query for `name` fail.
    pub fn with_failure(mut self, name: impl Into<String>, failure: SimulatedFailure) -> Self {
        self.failures.insert(name.into(), failure);
        self
    }

    /// Delay every query for `name`, for exercising caller-side timeouts.
    pub fn with_delay(mut self, name: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(name.into(), delay);
        self
    }
}

#[async_trait::async_trait]
impl Registry for MemoryRegistry {
    fn kind(&self) -> RegistryKind {
        self.kind
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        if let Ok(mut queried) = self.queried.lock() {
            queried.push(name.to_string());
        }
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }

        match self.failures.get(name) {
            Some(SimulatedFailure::Network) => {
                return Err(Error::network(self.kind.as_str(), "connection refused"))
            }
            Some(SimulatedFailure::Timeout) => {
                return Err(Error::Timeout {
                    registry: self.kind.to_string(),
                    name: name.to_string(),
                })
            }
            None => {}
        }

        self.packages
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownPackage {
                name: name.to_string(),
                registry: self.kind.to_string(),
            })
    }
}
