//! `flotilla agents` — inspect and delete store-side agents.

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::AgentStore;
use crate::application::services::agent_registry::find_agent;
use crate::application::services::cleanup::delete_agent_with_cleanup;
use crate::output::human::HumanRenderer;
use crate::output::reporter::TerminalReporter;
use crate::output::{json, progress};

/// Agents subcommands.
#[derive(Subcommand)]
pub enum AgentsCommand {
    /// List agents on the store
    List,
    /// Show one agent's configuration and attachments
    Info {
        /// Agent name (base or versioned, e.g. `triage` or `triage__v2`)
        name: String,
    },
    /// Delete an agent and clean up its agent-scoped blocks
    Delete {
        /// Agent name (a base name targets the active version)
        name: String,
        /// Delete without a confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

/// Run the agents command.
///
/// # Errors
///
/// Returns an error if the store is unreachable or the named agent does
/// not exist.
pub async fn run(app: &AppContext, cmd: AgentsCommand) -> Result<()> {
    match cmd {
        AgentsCommand::List => list(app).await,
        AgentsCommand::Info { name } => info(app, &name).await,
        AgentsCommand::Delete { name, force } => delete(app, &name, force).await,
    }
}

async fn list(app: &AppContext) -> Result<()> {
    let (store, _config) = app.connect().await?;

    let spinner = app
        .output
        .show_progress()
        .then(|| progress::spinner("Fetching agents..."));
    let result = store.list_agents().await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let mut agents = result?;
    agents.sort_by(|a, b| a.name.cmp(&b.name));

    if app.is_json() {
        json::print(&agents)?;
    } else {
        HumanRenderer::new(&app.output).render_agent_list(&agents);
    }
    Ok(())
}

async fn info(app: &AppContext, name: &str) -> Result<()> {
    let (store, _config) = app.connect().await?;

    let spinner = app
        .output
        .show_progress()
        .then(|| progress::spinner(&format!("Fetching '{name}'...")));
    let fetch = async {
        let record = find_agent(&store, name).await?;
        store.get_agent(&record.id).await
    };
    let result = fetch.await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let agent = result?;

    if app.is_json() {
        json::print(&agent)?;
    } else {
        HumanRenderer::new(&app.output).render_agent_info(&agent);
    }
    Ok(())
}

async fn delete(app: &AppContext, name: &str, force: bool) -> Result<()> {
    let (store, _config) = app.connect().await?;
    let record = find_agent(&store, name).await?;

    if !force {
        let prompt = format!(
            "Delete agent '{}' and its agent-scoped blocks?",
            record.name
        );
        if !app.confirm(&prompt)? {
            app.output.info("Cancelled.");
            return Ok(());
        }
    }

    let reporter = TerminalReporter::new(&app.output);
    let report = delete_agent_with_cleanup(&store, &reporter, name).await?;

    if app.is_json() {
        json::print(&report)?;
    }
    Ok(())
}
