use super::context::{check_prompt, Context};
use crate::prompt::TerminalSelector;
use anyhow::{bail, Result};
use clap::Args;
use tandem_engine::{Approval, PackageSpec, PlanOptions, SelectAll, Selector, UpgradeRequest};
use tracing::info;

#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// Dependencies to upgrade, optionally with a version (`react@^18`)
    #[arg(value_name = "PACKAGES", conflicts_with = "all")]
    pub packages: Vec<String>,

    /// Upgrade every registry dependency of the workspace
    #[arg(long)]
    pub all: bool,

    /// Choose dependencies and confirm pins or major bumps interactively
    #[arg(short, long)]
    pub interactive: bool,

    /// Rewrite exact pins: all of them, or only `--override-pinned=a,b`
    #[arg(
        long,
        value_name = "NAMES",
        num_args = 0..=1,
        require_equals = true
    )]
    pub override_pinned: Option<Vec<String>>,

    /// Allow crossing a major version: everywhere, or only `--allow-major=a,b`
    #[arg(
        long,
        value_name = "NAMES",
        num_args = 0..=1,
        require_equals = true
    )]
    pub allow_major: Option<Vec<String>>,
}

impl UpgradeArgs {
    pub fn request(&self) -> Result<UpgradeRequest> {
        if !self.all && self.packages.is_empty() {
            bail!("Name at least one dependency to upgrade, or pass --all");
        }
        let targets = self
            .packages
            .iter()
            .map(|p| p.parse::<PackageSpec>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(UpgradeRequest {
            targets,
            all: self.all,
        })
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            override_pinned: approval(self.override_pinned.as_deref()),
            allow_major: approval(self.allow_major.as_deref()),
        }
    }
}

/// A bare flag approves everything; a list approves those dependencies
fn approval(flag: Option<&[String]>) -> Approval {
    match flag {
        None => Approval::None,
        Some([]) => Approval::All,
        Some(values) => Approval::dependencies(
            values
                .iter()
                .flat_map(|v| v.split(','))
                .map(str::trim)
                .filter(|name| !name.is_empty()),
        ),
    }
}

pub async fn upgrade(ctx: &Context, args: UpgradeArgs) -> Result<()> {
    let request = args.request()?;
    let session = ctx.open().await?;
    let candidates = ctx
        .engine
        .prepare_upgrade(&session, &request, &ctx.cancel)
        .await?;

    let selection = if args.interactive {
        let mut selector = TerminalSelector::new(&session);
        let selection = selector.select(&candidates, &candidates.advisories);
        check_prompt(selector.take_failure())?;
        selection
    } else {
        SelectAll.select(&candidates, &candidates.advisories)
    };
    info!(selected = selection.dependencies.len(), "selection made");

    let plan = ctx
        .engine
        .plan_upgrade(&session, &candidates, &selection, &args.plan_options());
    ctx.finish(&session, &plan).await
}
