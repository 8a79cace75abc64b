//! npm registry client

use crate::client::{Fetched, HttpClient};
use crate::error::{Error, Result};
use crate::types::{ClientOptions, RegistryKind};
use crate::Registry;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Packument subset: only the published version keys are needed.
#[derive(Debug, Deserialize)]
struct NpmPackument {
    #[serde(default)]
    versions: BTreeMap<String, IgnoredAny>,
}

/// Version listings from an npm-compatible registry.
#[derive(Debug, Clone)]
pub struct NpmRegistry {
    client: HttpClient,
    base_url: Url,
}

impl NpmRegistry {
    /// Client for the public npm registry.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        Self::with_base_url(NPM_REGISTRY_URL, options)
    }

    /// Client for a mirror or private registry.
    pub fn with_base_url(base_url: &str, options: &ClientOptions) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(RegistryKind::Npm.as_str(), options)?,
            base_url: Url::parse(base_url)?,
        })
    }

    /// Packument URL; scoped names become a single `@scope%2Fname` segment.
    pub(crate) fn packument_url(&self, name: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Registry for NpmRegistry {
    fn kind(&self) -> RegistryKind {
        RegistryKind::Npm
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        if name.is_empty() {
            return Err(Error::InvalidPackageName(
                "Package name cannot be empty".to_string(),
            ));
        }

        let url = self.packument_url(name)?;
        match self.client.get_json::<NpmPackument>(&url, name).await? {
            Fetched::Found(packument) => Ok(packument.versions.into_keys().collect()),
            Fetched::NotFound => Err(Error::UnknownPackage {
                name: name.to_string(),
                registry: RegistryKind::Npm.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packument_url_encodes_scope() {
        let registry = NpmRegistry::new(&ClientOptions::default()).unwrap();
        assert_eq!(
            registry.packument_url("@types/node").unwrap().as_str(),
            "https://registry.npmjs.org/@types%2Fnode"
        );
        assert_eq!(
            registry.packument_url("react").unwrap().as_str(),
            "https://registry.npmjs.org/react"
        );
    }

    #[test]
    fn test_packument_url_respects_base_path() {
        let registry = NpmRegistry::with_base_url(
            "https://npm.example.com/api/npm/",
            &ClientOptions::default(),
        )
        .unwrap();
        assert_eq!(
            registry.packument_url("lodash").unwrap().as_str(),
            "https://npm.example.com/api/npm/lodash"
        );
    }

    #[test]
    fn test_packument_versions_deserialize() {
        let packument: NpmPackument = serde_json::from_str(
            r#"{"name":"x","versions":{"1.0.0":{"dist":{}},"1.1.0-beta.1":{}}}"#,
        )
        .unwrap();
        let versions: Vec<String> = packument.versions.into_keys().collect();
        assert_eq!(versions, vec!["1.0.0", "1.1.0-beta.1"]);
    }

    #[tokio::test]
    async fn test_invalid_package_name() {
        let registry = NpmRegistry::new(&ClientOptions::default()).unwrap();
        let result = registry.list_versions("").await;
        assert!(matches!(result, Err(Error::InvalidPackageName(_))));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_list_versions_scoped() {
        let registry = NpmRegistry::new(&ClientOptions::default()).unwrap();
        let versions = registry.list_versions("@types/node").await.unwrap();
        assert!(!versions.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_unknown_package() {
        let registry = NpmRegistry::new(&ClientOptions::default()).unwrap();
        let result = registry
            .list_versions("this-package-definitely-does-not-exist-12345")
            .await;
        assert!(matches!(result, Err(Error::UnknownPackage { .. })));
    }
}
