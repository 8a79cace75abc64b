use super::context::{check_prompt, Context};
use crate::prompt::TerminalSelector;
use crate::FieldArg;
use anyhow::Result;
use clap::Args;
use std::io::IsTerminal;
use tandem_engine::{AddRequest, DependencyField, PackageSpec, SelectAll};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Dependencies to add, optionally with a version (`zod@^3.22`)
    #[arg(value_name = "PACKAGES", required = true)]
    pub packages: Vec<String>,

    /// Manifest to add to: a path, a directory or a package name
    /// (defaults to the manifest closest to the current directory)
    #[arg(long, value_name = "TARGET")]
    pub to: Option<String>,

    /// Add as a dev dependency
    #[arg(short = 'D', long, conflicts_with = "field")]
    pub dev: bool,

    /// Dependency field to add to
    #[arg(long, value_enum)]
    pub field: Option<FieldArg>,

    /// Never prompt; use the preselected range
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl AddArgs {
    pub fn field(&self) -> DependencyField {
        if self.dev {
            DependencyField::Dev
        } else {
            self.field.map(Into::into).unwrap_or(DependencyField::Runtime)
        }
    }

    fn request(&self, default_target: Option<String>) -> Result<AddRequest> {
        let packages = self
            .packages
            .iter()
            .map(|p| p.parse::<PackageSpec>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AddRequest {
            target: self.to.clone().or(default_target),
            packages,
            field: self.field(),
        })
    }
}

pub async fn add(ctx: &Context, args: AddArgs) -> Result<()> {
    let request = args.request(ctx.default_target())?;
    let session = ctx.open().await?;

    let interactive = !args.yes && !ctx.global.json && std::io::stdin().is_terminal();
    let plan = if interactive {
        let mut selector = TerminalSelector::new(&session);
        let plan = ctx
            .engine
            .plan_add(&session, &request, &mut selector, &ctx.cancel)
            .await?;
        check_prompt(selector.take_failure())?;
        plan
    } else {
        ctx.engine
            .plan_add(&session, &request, &mut SelectAll, &ctx.cancel)
            .await?
    };

    ctx.finish(&session, &plan).await
}
