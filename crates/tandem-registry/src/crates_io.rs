//! crates.io registry client

use crate::client::{Fetched, HttpClient};
use crate::error::{Error, Result};
use crate::types::{ClientOptions, RegistryKind};
use crate::Registry;
use serde::Deserialize;
use url::Url;

const CRATES_IO_API_URL: &str = "https://crates.io/api/v1";

/// crates.io API response structure
#[derive(Debug, Deserialize)]
struct CrateResponse {
    versions: Vec<CrateVersion>,
}

#[derive(Debug, Deserialize)]
struct CrateVersion {
    num: String,
    #[serde(default)]
    yanked: bool,
}

/// Version listings from the crates.io API. Yanked releases are excluded.
#[derive(Debug, Clone)]
pub struct CratesIoRegistry {
    client: HttpClient,
    base_url: Url,
}

impl CratesIoRegistry {
    /// Client for crates.io.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        Self::with_base_url(CRATES_IO_API_URL, options)
    }

    /// Client for an API-compatible mirror.
    pub fn with_base_url(base_url: &str, options: &ClientOptions) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(RegistryKind::CratesIo.as_str(), options)?,
            base_url: Url::parse(base_url)?,
        })
    }

    pub(crate) fn crate_url(&self, name: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["crates", name]);
        Ok(url)
    }
}

fn published_versions(response: CrateResponse) -> Vec<String> {
    response
        .versions
        .into_iter()
        .filter(|v| !v.yanked)
        .map(|v| v.num)
        .collect()
}

#[async_trait::async_trait]
impl Registry for CratesIoRegistry {
    fn kind(&self) -> RegistryKind {
        RegistryKind::CratesIo
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        if name.is_empty() {
            return Err(Error::InvalidPackageName(
                "Crate name cannot be empty".to_string(),
            ));
        }

        let url = self.crate_url(name)?;
        match self.client.get_json::<CrateResponse>(&url, name).await? {
            Fetched::Found(response) => Ok(published_versions(response)),
            Fetched::NotFound => Err(Error::UnknownPackage {
                name: name.to_string(),
                registry: RegistryKind::CratesIo.to_string(),
            }),
        }
    }
}
