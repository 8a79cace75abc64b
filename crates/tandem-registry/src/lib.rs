//! Published-version listings for npm and crates.io.
//!
//! The engine only needs one capability from a registry: the set of versions
//! published for a package name. [`Registry`] is that capability;
//! [`NpmRegistry`] and [`CratesIoRegistry`] implement it over HTTP with
//! client-side rate limiting, and [`MemoryRegistry`] serves a fixed table.
//!
//! # Example
//!
//! ```no_run
//! use tandem_registry::{ClientOptions, NpmRegistry, Registry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let npm = NpmRegistry::new(&ClientOptions::default())?;
//!     let versions = npm.list_versions("react").await?;
//!     println!("react has {} published versions", versions.len());
//!     Ok(())
//! }
//! ```

mod client;
mod crates_io;
mod error;
mod memory;
mod names;
mod npm;
mod types;

pub use crates_io::CratesIoRegistry;
pub use error::{Error, Result};
pub use memory::{MemoryRegistry, SimulatedFailure};
pub use names::{validate_crate_name, validate_npm_name, validate_package_name};
pub use npm::NpmRegistry;
pub use types::{ClientOptions, RegistryKind};

use std::sync::Arc;

/// Source of published versions for one registry.
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Which registry this is.
    fn kind(&self) -> RegistryKind;

    /// All published version strings for `name`, in no particular order.
    ///
    /// # Errors
    ///
    /// `Error::UnknownPackage` when the registry has no such package;
    /// `Error::Network`/`Error::Timeout` when the registry could not be reached.
    async fn list_versions(&self, name: &str) -> Result<Vec<String>>;
}

/// HTTP registry client for `kind`, optionally pointed at a mirror.
pub fn http_registry(
    kind: RegistryKind,
    base_url: Option<&str>,
    options: &ClientOptions,
) -> Result<Arc<dyn Registry>> {
    let registry: Arc<dyn Registry> = match (kind, base_url) {
        (RegistryKind::Npm, Some(url)) => Arc::new(NpmRegistry::with_base_url(url, options)?),
        (RegistryKind::Npm, None) => Arc::new(NpmRegistry::new(options)?),
        (RegistryKind::CratesIo, Some(url)) => {
            Arc::new(CratesIoRegistry::with_base_url(url, options)?)
        }
        (RegistryKind::CratesIo, None) => Arc::new(CratesIoRegistry::new(options)?),
    };
    Ok(registry)
}
