//! tandem CLI - keep a workspace's dependencies in tandem.

mod commands;
mod exit;
mod formatters;
mod logging;
mod prompt;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tandem_engine::{DependencyField, Ecosystem};

#[derive(Parser, Debug)]
#[command(name = "tandem", version)]
#[command(about = "Workspace-aware dependency upgrades for npm and Cargo monorepos", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Ecosystem to operate on (detected from the root when omitted)
    #[arg(long, global = true, value_enum)]
    pub ecosystem: Option<EcosystemArg>,

    /// Show what would change without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file path (defaults to ~/.tandem/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upgrade dependencies across every manifest of the workspace
    Upgrade(commands::UpgradeArgs),

    /// Add dependencies to one manifest
    Add(commands::AddArgs),

    /// Remove dependencies from one manifest or from all of them
    #[command(alias = "rm")]
    Remove(commands::RemoveArgs),

    /// Manage tandem configuration
    Config {
        #[command(subcommand)]
        command: commands::ConfigCommand,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EcosystemArg {
    #[value(alias = "js", alias = "npm")]
    Javascript,
    #[value(alias = "cargo")]
    Rust,
}

impl From<EcosystemArg> for Ecosystem {
    fn from(arg: EcosystemArg) -> Self {
        match arg {
            EcosystemArg::Javascript => Ecosystem::JavaScript,
            EcosystemArg::Rust => Ecosystem::Rust,
        }
    }
}

/// Dependency field selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FieldArg {
    #[value(alias = "prod")]
    Runtime,
    Dev,
    Peer,
    Optional,
    Build,
}

impl From<FieldArg> for DependencyField {
    fn from(arg: FieldArg) -> Self {
        match arg {
            FieldArg::Runtime => DependencyField::Runtime,
            FieldArg::Dev => DependencyField::Dev,
            FieldArg::Peer => DependencyField::Peer,
            FieldArg::Optional => DependencyField::Optional,
            FieldArg::Build => DependencyField::Build,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.global.verbose);

    let global = cli.global;
    let result = match cli.command {
        Command::Config { command } => commands::handle_config_command(command, &global),
        Command::Upgrade(args) => run_workspace_command(WorkspaceCommand::Upgrade(args), global),
        Command::Add(args) => run_workspace_command(WorkspaceCommand::Add(args), global),
        Command::Remove(args) => run_workspace_command(WorkspaceCommand::Remove(args), global),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::from(exit::code_for(&err))
        }
    }
}

/// Commands that operate on a workspace
enum WorkspaceCommand {
    Upgrade(commands::UpgradeArgs),
    Add(commands::AddArgs),
    Remove(commands::RemoveArgs),
}

fn run_workspace_command(command: WorkspaceCommand, global: GlobalArgs) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let ctx = commands::Context::new(global).await?;
        match command {
            WorkspaceCommand::Upgrade(args) => commands::upgrade(&ctx, args).await,
            WorkspaceCommand::Add(args) => commands::add(&ctx, args).await,
            WorkspaceCommand::Remove(args) => commands::remove(&ctx, args).await,
        }
    })
}
