use super::context::load_config;
use crate::GlobalArgs;
use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use tandem_config::{
    load_workspace_config, validate_workspace_root, ConfigManager, CONFIG_KEYS,
    WORKSPACE_CONFIG_FILE,
};
use tandem_fs::NativeFileSystem;
use tokio::runtime::Runtime;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a default config file to ~/.tandem/config.toml
    Init,

    /// Show config file path
    Path,

    /// Show every setting
    Show,

    /// Print one setting
    Get {
        /// Setting key, e.g. settings.default_range_prefix
        key: String,
    },

    /// Change one setting
    Set {
        /// Setting key, e.g. settings.default_range_prefix
        key: String,
        /// New value; lists are comma-separated
        value: String,
    },

    /// Validate the config file and the workspace's tandem.toml
    Validate,
}

pub fn handle_config_command(cmd: ConfigCommand, global: &GlobalArgs) -> Result<()> {
    let runtime = Runtime::new().context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        match cmd {
            ConfigCommand::Init => init_config(global).await,
            ConfigCommand::Path => show_config_path(global),
            ConfigCommand::Show => show_config(global).await,
            ConfigCommand::Get { key } => {
                let manager = load_config(global.config.as_deref()).await?;
                println!("{}", manager.get(&key)?);
                Ok(())
            }
            ConfigCommand::Set { key, value } => set_value(global, &key, &value).await,
            ConfigCommand::Validate => validate_config(global).await,
        }
    })
}

fn config_path(global: &GlobalArgs) -> Result<PathBuf> {
    match &global.config {
        Some(path) => Ok(path.clone()),
        None => Ok(ConfigManager::config_path()?),
    }
}

async fn init_config(global: &GlobalArgs) -> Result<()> {
    let path = config_path(global)?;
    let manager = ConfigManager::init_at(&path)
        .await
        .with_context(|| format!("Failed to initialize config at {}", path.display()))?;
    println!("{} Initialized config at: {}", "✓".green(), manager.path().display());
    Ok(())
}

fn show_config_path(global: &GlobalArgs) -> Result<()> {
    println!("{}", config_path(global)?.display());
    Ok(())
}

async fn show_config(global: &GlobalArgs) -> Result<()> {
    let manager = load_config(global.config.as_deref()).await?;
    if !manager.exists() {
        println!("{}", "# no config file; showing defaults".dimmed());
    }
    for key in CONFIG_KEYS {
        println!("{} = {}", key, manager.get(key)?);
    }
    Ok(())
}

async fn set_value(global: &GlobalArgs, key: &str, value: &str) -> Result<()> {
    let mut manager = load_config(global.config.as_deref()).await?;
    manager.set(key, value)?;
    manager
        .save()
        .await
        .with_context(|| format!("Failed to save {}", manager.path().display()))?;
    println!("{} {} = {}", "✓".green(), key, manager.get(key)?);
    Ok(())
}

async fn validate_config(global: &GlobalArgs) -> Result<()> {
    let manager = load_config(global.config.as_deref()).await?;
    let config = manager.config();
    let source = if manager.exists() {
        manager.path().display().to_string()
    } else {
        "defaults (no config file)".to_string()
    };
    println!("{} Config is valid: {}", "✓".green(), source);
    println!("  Version: {}", config.version);

    let root = match &global.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to get current working directory")?,
    };
    let root = validate_workspace_root(&root)?;
    let fs = NativeFileSystem::new(&root)?;
    let workspace = load_workspace_config(&fs, &root)
        .await
        .with_context(|| format!("Invalid {}", root.join(WORKSPACE_CONFIG_FILE).display()))?;
    println!(
        "{} {}: {} ignore pattern(s), {} pinned override(s)",
        "✓".green(),
        WORKSPACE_CONFIG_FILE,
        workspace.ignore.len(),
        workspace.pinned_override.len()
    );
    Ok(())
}
