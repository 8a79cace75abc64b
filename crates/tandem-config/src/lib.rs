//! Configuration for tandem.
//!
//! Two layers: the global `~/.tandem/config.toml` managed by
//! [`ConfigManager`], and an optional `tandem.toml` at a workspace root whose
//! `ignore` and `pinned_override` lists are merged over the global settings by
//! [`TandemConfig::engine_options`]. Missing files mean defaults.

pub mod manager;
pub mod security;
pub mod types;

pub use manager::{load_workspace_config, ConfigError, ConfigManager, CONFIG_KEYS};
pub use security::{
    validate_ignore_pattern, validate_pinned_name, validate_workspace_root, SecurityError,
};
pub use types::{
    GlobalSettings, RegistrySettings, TandemConfig, WorkspaceConfig, WORKSPACE_CONFIG_FILE,
};
