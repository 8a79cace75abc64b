use crate::security::{
    set_config_permissions, validate_ignore_pattern, validate_pinned_name, SecurityError,
};
use crate::types::{TandemConfig, WorkspaceConfig, WORKSPACE_CONFIG_FILE};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tandem_engine::RangePrefix;
use tandem_fs::{FileSystem, NativeFileSystem};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during config management
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid config file {path}: {source}")]
    TomlDe {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Security error: {0}")]
    Security(#[from] SecurityError),

    #[error("Config file already exists at {0}")]
    ConfigExists(PathBuf),

    #[error("Unknown config key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Keys accepted by [`ConfigManager::get`] and [`ConfigManager::set`]
pub const CONFIG_KEYS: &[&str] = &[
    "settings.requests_per_second",
    "settings.request_timeout_secs",
    "settings.max_concurrent_requests",
    "settings.include_prerelease",
    "settings.respect_gitignore",
    "settings.extra_ignore_patterns",
    "settings.default_range_prefix",
    "registries.npm",
    "registries.crates_io",
];

/// Manager for the global tandem configuration
///
/// Manages the configuration stored in ~/.tandem/config.toml. A missing file
/// is not an error: the manager starts from defaults and only writes the file
/// on [`save`](Self::save).
pub struct ConfigManager<F: FileSystem = NativeFileSystem> {
    fs: Arc<F>,
    config_path: PathBuf,
    config: TandemConfig,
    exists: bool,
}

impl ConfigManager {
    /// Get the default config path (~/.tandem/config.toml)
    #[cfg(feature = "native-fs")]
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".tandem").join("config.toml"))
    }

    /// Load config from default location
    #[cfg(feature = "native-fs")]
    pub async fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path).await
    }

    /// Load config from a specific path
    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let fs = Arc::new(NativeFileSystem::new(existing_ancestor(path))?);
        Self::load_with_filesystem(fs, path).await
    }

    /// Write a default config file at the default location
    #[cfg(feature = "native-fs")]
    pub async fn init() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;
        Self::init_at(&config_path).await
    }

    /// Write a default config file at `path`, refusing to overwrite one
    pub async fn init_at(path: &Path) -> Result<Self, ConfigError> {
        let manager = Self::load_from(path).await?;
        if manager.exists {
            return Err(ConfigError::ConfigExists(path.to_path_buf()));
        }
        manager.save().await?;
        Ok(Self {
            exists: true,
            ..manager
        })
    }
}

impl<F: FileSystem> ConfigManager<F> {
    /// Load config with a custom FileSystem
    pub async fn load_with_filesystem(fs: Arc<F>, path: &Path) -> Result<Self, ConfigError> {
        if !fs.exists(path).await? {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self {
                fs,
                config_path: path.to_path_buf(),
                config: TandemConfig::default(),
                exists: false,
            });
        }

        let contents = fs.read_to_string(path).await?;
        let config: TandemConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::TomlDe {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "loaded config");

        Ok(Self {
            fs,
            config_path: path.to_path_buf(),
            config,
            exists: true,
        })
    }

    /// Save config to disk atomically
    ///
    /// Writes a sibling temp file, restricts its permissions, then renames it
    /// over the config file. Permissions are set through `std::fs`, so `F`
    /// must be backed by the local disk.
    pub async fn save(&self) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(&self.config)?;

        if let Some(parent) = self.config_path.parent() {
            self.fs.create_dir_all(parent).await?;
        }

        let temp_path = self.config_path.with_extension("toml.tmp");
        self.fs.write(&temp_path, &toml_str).await?;
        set_config_permissions(&temp_path)?;
        self.fs.rename(&temp_path, &self.config_path).await?;

        debug!(path = %self.config_path.display(), "saved config");
        Ok(())
    }

    /// Path this manager reads and writes
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Whether the config file existed when loaded
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Get reference to config
    pub fn config(&self) -> &TandemConfig {
        &self.config
    }

    /// Get mutable reference to config (caller must call save())
    pub fn config_mut(&mut self) -> &mut TandemConfig {
        &mut self.config
    }

    /// Current value of `key` as displayed by `tandem config get`
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        let settings = &self.config.settings;
        let registries = &self.config.registries;
        let value = match key {
            "settings.requests_per_second" => settings.requests_per_second.to_string(),
            "settings.request_timeout_secs" => settings.request_timeout_secs.to_string(),
            "settings.max_concurrent_requests" => settings.max_concurrent_requests.to_string(),
            "settings.include_prerelease" => settings.include_prerelease.to_string(),
            "settings.respect_gitignore" => settings.respect_gitignore.to_string(),
            "settings.extra_ignore_patterns" => settings.extra_ignore_patterns.join(","),
            "settings.default_range_prefix" => match settings.default_range_prefix {
                RangePrefix::Caret => "caret",
                RangePrefix::Tilde => "tilde",
                RangePrefix::Exact => "exact",
            }
            .to_string(),
            "registries.npm" => registries.npm.clone().unwrap_or_default(),
            "registries.crates_io" => registries.crates_io.clone().unwrap_or_default(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        Ok(value)
    }

    /// Set `key` from its string form (caller must call save()).
    ///
    /// Lists are comma-separated; an empty registry URL restores the public
    /// registry.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        };
        let settings = &mut self.config.settings;
        let registries = &mut self.config.registries;

        match key {
            "settings.requests_per_second" => {
                settings.requests_per_second = value
                    .parse::<u32>()
                    .map_err(|e| invalid(format!("{e}")))?;
            }
            "settings.request_timeout_secs" => {
                let secs: u64 = value.parse().map_err(|e| invalid(format!("{e}")))?;
                if secs == 0 {
                    return Err(invalid("timeout must be at least one second".into()));
                }
                settings.request_timeout_secs = secs;
            }
            "settings.max_concurrent_requests" => {
                let n: usize = value.parse().map_err(|e| invalid(format!("{e}")))?;
                if n == 0 {
                    return Err(invalid("at least one request must be allowed".into()));
                }
                settings.max_concurrent_requests = n;
            }
            "settings.include_prerelease" => {
                settings.include_prerelease = value
                    .parse::<bool>()
                    .map_err(|e| invalid(format!("{e}")))?;
            }
            "settings.respect_gitignore" => {
                settings.respect_gitignore = value
                    .parse::<bool>()
                    .map_err(|e| invalid(format!("{e}")))?;
            }
            "settings.extra_ignore_patterns" => {
                let patterns = split_list(value);
                for pattern in &patterns {
                    validate_ignore_pattern(pattern)?;
                }
                settings.extra_ignore_patterns = patterns;
            }
            "settings.default_range_prefix" => {
                settings.default_range_prefix = value
                    .parse()
                    .map_err(|e: tandem_engine::Error| invalid(e.to_string()))?;
            }
            "registries.npm" | "registries.crates_io" => {
                let url = registry_url(value).map_err(invalid)?;
                if key == "registries.npm" {
                    registries.npm = url;
                } else {
                    registries.crates_io = url;
                }
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

/// Load `tandem.toml` from the workspace root; a missing file means defaults.
pub async fn load_workspace_config<F: FileSystem>(
    fs: &F,
    root: &Path,
) -> Result<WorkspaceConfig, ConfigError> {
    let path = root.join(WORKSPACE_CONFIG_FILE);
    if !fs.exists(&path).await? {
        return Ok(WorkspaceConfig::default());
    }

    let contents = fs.read_to_string(&path).await?;
    let config: WorkspaceConfig =
        toml::from_str(&contents).map_err(|source| ConfigError::TomlDe {
            path: path.clone(),
            source,
        })?;

    for pattern in &config.ignore {
        validate_ignore_pattern(pattern)?;
    }
    for name in &config.pinned_override {
        validate_pinned_name(name)?;
    }

    debug!(
        path = %path.display(),
        ignore = config.ignore.len(),
        pinned_override = config.pinned_override.len(),
        "loaded workspace config"
    );
    Ok(config)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn registry_url(value: &str) -> Result<Option<String>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.split_once("://") {
        Some(("http" | "https", rest)) if !rest.is_empty() => {
            Ok(Some(value.trim_end_matches('/').to_string()))
        }
        _ => Err("expected an http(s) URL".to_string()),
    }
}

/// Closest directory at or above `path`'s parent that exists
fn existing_ancestor(path: &Path) -> PathBuf {
    path.parent()
        .into_iter()
        .flat_map(Path::ancestors)
        .find(|dir| !dir.as_os_str().is_empty() && dir.is_dir())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
