use super::context::Context;
use anyhow::Result;
use clap::Args;
use tandem_engine::RemoveRequest;

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Dependencies to remove
    #[arg(value_name = "PACKAGES", required = true)]
    pub packages: Vec<String>,

    /// Manifest to remove from: a path, a directory or a package name
    /// (defaults to the manifest closest to the current directory)
    #[arg(long, value_name = "TARGET", conflicts_with = "everywhere")]
    pub from: Option<String>,

    /// Remove from every manifest of the workspace
    #[arg(long)]
    pub everywhere: bool,
}

impl RemoveArgs {
    fn request(&self, default_target: Option<String>) -> RemoveRequest {
        RemoveRequest {
            target: if self.everywhere {
                None
            } else {
                self.from.clone().or(default_target)
            },
            everywhere: self.everywhere,
            names: self.packages.clone(),
        }
    }
}

pub async fn remove(ctx: &Context, args: RemoveArgs) -> Result<()> {
    let request = args.request(ctx.default_target());
    let session = ctx.open().await?;
    let plan = ctx.engine.plan_remove(&session, &request)?;
    ctx.finish(&session, &plan).await
}
