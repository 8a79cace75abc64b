use crate::formatters;
use crate::prompt::PromptFailure;
use crate::GlobalArgs;
use anyhow::{Context as _, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tandem_config::{load_workspace_config, validate_workspace_root, ConfigManager};
use tandem_engine::{Error, Report, Session, UpgradeEngine, UpgradePlan};
use tandem_fs::NativeFileSystem;
use tandem_registry::{http_registry, RegistryKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Everything a workspace command needs: the engine wired from config, the
/// resolved root and a cancellation token tied to Ctrl-C.
pub struct Context {
    pub global: GlobalArgs,
    pub root: PathBuf,
    pub cwd: PathBuf,
    pub engine: UpgradeEngine<NativeFileSystem>,
    pub cancel: CancellationToken,
}

impl Context {
    pub async fn new(global: GlobalArgs) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let cwd = cwd.canonicalize().unwrap_or(cwd);
        let requested = global.root.clone().unwrap_or_else(|| cwd.clone());
        let root = validate_workspace_root(&requested).map_err(|e| Error::Scan {
            path: requested.clone(),
            reason: e.to_string(),
        })?;

        let manager = load_config(global.config.as_deref()).await?;
        let config = manager.config();

        let fs = Arc::new(NativeFileSystem::new(&root)?);
        let workspace_config = load_workspace_config(fs.as_ref(), &root)
            .await
            .context("Failed to load tandem.toml")?;

        let mut options = config.engine_options(&workspace_config);
        options.ecosystem = global.ecosystem.map(Into::into);

        let client = config.client_options();
        let mut engine = UpgradeEngine::new(fs, options);
        for kind in [RegistryKind::Npm, RegistryKind::CratesIo] {
            let registry = http_registry(kind, config.registries.base_url(kind), &client)
                .with_context(|| format!("Failed to create the {kind} client"))?;
            engine = engine.with_registry(registry);
        }

        debug!(root = %root.display(), "workspace command context ready");
        Ok(Self {
            global,
            root,
            cwd,
            engine,
            cancel: cancel_on_ctrl_c(),
        })
    }

    pub async fn open(&self) -> Result<Session> {
        self.engine
            .open(&self.root)
            .await
            .with_context(|| format!("Failed to open workspace at {}", self.root.display()))
    }

    /// Manifest to target when none is named: the one closest to the
    /// current directory, if that directory is inside the workspace
    pub fn default_target(&self) -> Option<String> {
        self.cwd
            .starts_with(&self.root)
            .then(|| self.cwd.display().to_string())
    }

    /// Apply `plan`, print the report and turn the outcome into the result
    /// that decides the exit code.
    ///
    /// A manifest that failed to parse still fails the run after the rest of
    /// the workspace was handled; a partial apply takes precedence over it.
    pub async fn finish(&self, session: &Session, plan: &UpgradePlan) -> Result<()> {
        let dry_run = self.global.dry_run;
        let outcome = self.engine.apply(session, plan, &self.cancel, dry_run).await;

        let mut report = Report::from_plan(session, plan, dry_run);
        report.record(&outcome);

        let stdout = io::stdout();
        let mut out = stdout.lock();
        formatters::for_output(self.global.json).format(&report, &mut out)?;
        out.flush()?;

        outcome?;
        match session.workspace().warnings() {
            [] => Ok(()),
            [first, rest @ ..] => {
                warn!(skipped = rest.len() + 1, "workspace has manifests that failed to parse");
                Err(Error::Parse {
                    path: first.path.clone(),
                    message: first.message.clone(),
                }
                .into())
            }
        }
    }
}

/// Turn a dismissed or broken prompt into an error
pub fn check_prompt(failure: Option<PromptFailure>) -> Result<()> {
    match failure {
        None => Ok(()),
        Some(PromptFailure::Dismissed) => Err(Error::Cancelled.into()),
        Some(PromptFailure::Terminal(err)) => {
            Err(anyhow::Error::new(err).context("Interactive prompt failed"))
        }
    }
}

pub async fn load_config(path: Option<&Path>) -> Result<ConfigManager> {
    let manager = match path {
        Some(path) => ConfigManager::load_from(path).await,
        None => ConfigManager::load().await,
    };
    manager.context("Failed to load tandem config")
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; stopping before any manifest is written");
            token.cancel();
        }
    });
    cancel
}
