//! Version Resolver: published versions, latest, and highest-satisfying

use crate::version::{ParsedRange, ParsedVersion};
use crate::{Ecosystem, Error, RegistryError, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tandem_registry::Registry;
use tokio_util::sync::CancellationToken;

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Per-query timeout
    pub timeout: Duration,
    /// Maximum registry queries in flight
    pub concurrency: usize,
    /// Consider prereleases when picking "latest"
    pub include_prerelease: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            concurrency: 8,
            include_prerelease: false,
        }
    }
}

/// Published versions of one dependency
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Dependency name
    pub name: String,
    /// Highest version by precedence. Stable releases win over prereleases
    /// unless prereleases are included or nothing stable was published.
    pub latest: ParsedVersion,
    /// Every parseable published version, ascending
    pub versions: Vec<ParsedVersion>,
}

impl Resolution {
    fn from_versions(
        name: &str,
        mut versions: Vec<ParsedVersion>,
        include_prerelease: bool,
    ) -> Option<Self> {
        versions.sort();
        versions.dedup();

        let stable = versions.iter().rev().find(|v| !v.is_prerelease());
        let latest = match stable {
            Some(stable) if !include_prerelease => stable.clone(),
            _ => versions.last()?.clone(),
        };

        Some(Self {
            name: name.to_string(),
            latest,
            versions,
        })
    }

    /// Highest published version satisfying `range`, if any
    pub fn highest_satisfying(&self, range: &ParsedRange) -> Option<&ParsedVersion> {
        self.versions.iter().rev().find(|v| range.satisfies(v))
    }
}

/// Queries a [`Registry`] with a timeout per query
pub struct VersionResolver {
    registry: Arc<dyn Registry>,
    ecosystem: Ecosystem,
    options: ResolverOptions,
}

impl VersionResolver {
    /// Create a resolver for one ecosystem
    pub fn new(registry: Arc<dyn Registry>, ecosystem: Ecosystem, options: ResolverOptions) -> Self {
        Self {
            registry,
            ecosystem,
            options,
        }
    }

    async fn list_versions(&self, name: &str) -> std::result::Result<Vec<String>, RegistryError> {
        tracing::debug!(name, registry = %self.registry.kind(), "querying registry");
        match tokio::time::timeout(self.options.timeout, self.registry.list_versions(name)).await {
            Ok(result) => result,
            Err(_) => Err(RegistryError::Timeout {
                registry: self.registry.kind().to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Fetch and order every published version of `name`.
    ///
    /// Version strings the ecosystem cannot parse are ignored.
    ///
    /// # Errors
    ///
    /// `RegistryError::UnknownPackage` if nothing usable is published;
    /// network failures and timeouts as reported by the registry.
    pub async fn resolve(&self, name: &str) -> std::result::Result<Resolution, RegistryError> {
        let raw = self.list_versions(name).await?;
        let versions: Vec<ParsedVersion> = raw
            .iter()
            .filter_map(|v| ParsedVersion::parse(v, self.ecosystem).ok())
            .collect();

        Resolution::from_versions(name, versions, self.options.include_prerelease).ok_or_else(
            || RegistryError::UnknownPackage {
                name: name.to_string(),
                registry: self.registry.kind().to_string(),
            },
        )
    }

    /// Highest published version of `name`
    pub async fn resolve_latest(&self, name: &str) -> Result<ParsedVersion> {
        Ok(self.resolve(name).await?.latest)
    }

    /// Highest published version of `name` satisfying `range`.
    ///
    /// `Ok(None)` when nothing published satisfies it.
    pub async fn highest_satisfying(
        &self,
        name: &str,
        range: &ParsedRange,
    ) -> Result<Option<ParsedVersion>> {
        let resolution = self.resolve(name).await?;
        Ok(resolution.highest_satisfying(range).cloned())
    }

    /// Resolve many names concurrently.
    ///
    /// Results come back in input order. A failure for one name does not stop
    /// the others.
    ///
    /// # Errors
    ///
    /// `Error::Cancelled` if `cancel` fires before every name is resolved.
    pub async fn resolve_many(
        &self,
        names: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, std::result::Result<Resolution, RegistryError>)>> {
        let mut results: Vec<(usize, std::result::Result<Resolution, RegistryError>)> =
            stream::iter(names.iter().enumerate())
                .map(|(i, name)| async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => None,
                        result = self.resolve(name) => Some((i, result)),
                    }
                })
                .buffer_unordered(self.options.concurrency.max(1))
                .filter_map(|item| async move { item })
                .collect()
                .await;

        if cancel.is_cancelled() {
            tracing::info!("resolution cancelled");
            return Err(Error::Cancelled);
        }

        results.sort_by_key(|(i, _)| *i);
        Ok(results
            .into_iter()
            .map(|(i, result)| (names[i].clone(), result))
            .collect())
    }
}
