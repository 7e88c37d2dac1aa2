//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Declarative fleet management for AI agents
#[derive(Parser)]
#[command(
    name = "flotilla",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Skip confirmation prompts
    #[arg(short = 'y', long, global = true, env = "FLOTILLA_YES")]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile the fleet toward the manifest
    Apply(commands::apply::ApplyArgs),

    /// Preview the operations apply would run
    Plan(commands::plan::PlanArgs),

    /// Summarize per-agent drift
    Status(commands::status::StatusArgs),

    /// Inspect and delete store-side agents
    #[command(subcommand)]
    Agents(commands::agents::AgentsCommand),

    /// Sweep orphaned blocks off the store
    Cleanup(commands::cleanup::CleanupArgs),

    /// Send one message to many agents
    Send(commands::send::SendArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            command,
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
        })?;
        match command {
            Command::Apply(args) => commands::apply::run(&app, args).await,
            Command::Plan(args) => commands::plan::run(&app, args).await,
            Command::Status(args) => commands::status::run(&app, args).await,
            Command::Agents(cmd) => commands::agents::run(&app, cmd).await,
            Command::Cleanup(args) => commands::cleanup::run(&app, args).await,
            Command::Send(args) => commands::send::run(&app, args).await,
            Command::Config(cmd) => commands::config::run(&app, cmd).await,
            Command::Version => commands::version::run(&app),
        }
    }
}
