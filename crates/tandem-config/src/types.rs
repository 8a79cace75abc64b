use serde::{Deserialize, Serialize};
use std::time::Duration;
use tandem_engine::{EngineOptions, RangePrefix, ScanOptions};
use tandem_registry::{ClientOptions, RegistryKind};

/// Main configuration structure for tandem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TandemConfig {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: String,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,

    /// Registry endpoints
    #[serde(default)]
    pub registries: RegistrySettings,
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            settings: GlobalSettings::default(),
            registries: RegistrySettings::default(),
        }
    }
}

impl TandemConfig {
    /// HTTP options for the registry clients
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            requests_per_second: match self.settings.requests_per_second {
                0 => None,
                n => Some(n),
            },
            timeout: Duration::from_secs(self.settings.request_timeout_secs),
            ..ClientOptions::default()
        }
    }

    /// Engine options with `workspace` merged over the global settings.
    ///
    /// Ignore patterns accumulate: built-in defaults, then
    /// `extra_ignore_patterns`, then the workspace's `ignore` list.
    pub fn engine_options(&self, workspace: &WorkspaceConfig) -> EngineOptions {
        let settings = &self.settings;
        let mut scan = ScanOptions::default()
            .with_extra_ignores(settings.extra_ignore_patterns.iter().cloned())
            .with_extra_ignores(workspace.ignore.iter().cloned());
        scan.discovery.respect_gitignore = settings.respect_gitignore;

        let mut options = EngineOptions {
            scan,
            default_range_prefix: settings.default_range_prefix,
            pinned_override: workspace.pinned_override.iter().cloned().collect(),
            ..EngineOptions::default()
        };
        options.resolver.timeout = Duration::from_secs(settings.request_timeout_secs);
        options.resolver.concurrency = settings.max_concurrent_requests.max(1);
        options.resolver.include_prerelease = settings.include_prerelease;
        options
    }
}

/// Global settings for tandem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalSettings {
    /// Registry requests per second; 0 disables client-side limiting
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Max registry queries in flight
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Consider prereleases when picking the latest version
    #[serde(default)]
    pub include_prerelease: bool,

    /// Skip paths matched by `.gitignore`
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,

    /// Glob patterns skipped on top of the built-in ignores
    #[serde(default)]
    pub extra_ignore_patterns: Vec<String>,

    /// Operator for newly written ranges
    #[serde(default)]
    pub default_range_prefix: RangePrefix,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent(),
            include_prerelease: false,
            respect_gitignore: default_true(),
            extra_ignore_patterns: Vec::new(),
            default_range_prefix: RangePrefix::Caret,
        }
    }
}

/// Registry base URLs; unset means the public registry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistrySettings {
    /// npm registry mirror
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<String>,

    /// crates.io mirror
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crates_io: Option<String>,
}

impl RegistrySettings {
    /// Configured base URL for `kind`
    pub fn base_url(&self, kind: RegistryKind) -> Option<&str> {
        match kind {
            RegistryKind::Npm => self.npm.as_deref(),
            RegistryKind::CratesIo => self.crates_io.as_deref(),
        }
    }
}

/// Per-workspace overrides read from `tandem.toml` at the workspace root
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceConfig {
    /// Extra glob patterns to skip while scanning this workspace
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Dependencies whose exact pins may always be rewritten
    #[serde(default)]
    pub pinned_override: Vec<String>,
}

/// File name of the per-workspace config
pub const WORKSPACE_CONFIG_FILE: &str = "tandem.toml";

fn default_version() -> String {
    "1.0".to_string()
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    8
}

fn default_true() -> bool {
    true
}
