//! `flotilla send` — bulk message fan-out to fleet agents.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::agent_registry::AgentRegistry;
use crate::application::services::bulk::{
    DEFAULT_POLL_INTERVAL, SendOptions, SendTarget, run_all, send_job,
};
use crate::application::services::fleet_loader::{LoadedFleet, load_fleet};
use crate::domain::error::AgentError;
use crate::infra::fs::StdFs;
use crate::output::human::HumanRenderer;
use crate::output::reporter::{BarReporter, TerminalReporter};
use crate::output::{json, progress};

/// Arguments for the send command.
#[derive(Args)]
pub struct SendArgs {
    /// Path to the fleet manifest
    #[arg(short = 'f', long = "file", default_value = "fleet.yaml")]
    pub file: PathBuf,

    /// Message text to deliver to every target
    #[arg(short = 'm', long = "message")]
    pub message: String,

    /// Send only to the named agent(s)
    #[arg(long = "agent", value_name = "NAME")]
    pub agents: Vec<String>,

    /// Concurrent sends ceiling (default from config)
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Per-target give-up timeout in seconds (default from config)
    #[arg(long, value_name = "S")]
    pub timeout_secs: Option<u64>,
}

/// Run `flotilla send`.
///
/// # Errors
///
/// Returns an error if the manifest is invalid, the store is unreachable,
/// a filter names an undeclared agent, or any target did not complete.
pub async fn run(app: &AppContext, args: SendArgs) -> Result<()> {
    let fleet = load_fleet(&StdFs, &args.file)?;
    let (store, config) = app.connect().await?;

    let names = target_names(&fleet, &args.agents)?;
    if names.is_empty() {
        app.output.info("No agents to send to.");
        return Ok(());
    }

    // resolve each declared name to its active store-side agent; names
    // with no remote agent become failed outcomes, not a pre-flight abort
    let registry = AgentRegistry::load_observed(&store).await?;
    let options = SendOptions {
        concurrency: args.concurrency.unwrap_or(config.bulk.concurrency),
        timeout: Duration::from_secs(args.timeout_secs.unwrap_or(config.bulk.timeout_secs)),
        poll_interval: DEFAULT_POLL_INTERVAL,
    };

    let jobs: Vec<(String, _)> = names
        .into_iter()
        .map(|name| {
            let target = SendTarget {
                name: name.clone(),
                agent_id: registry.get(&name).map(|record| record.id.clone()),
            };
            let job = send_job(store.clone(), target, args.message.clone(), options);
            (name, job)
        })
        .collect();

    let (outcomes, tally) = if app.output.show_progress() {
        let reporter = BarReporter::new(progress::bar(jobs.len() as u64, "sending..."));
        let result = run_all(&reporter, jobs, options.concurrency).await;
        reporter.finish("done");
        result
    } else {
        let reporter = TerminalReporter::new(&app.output);
        run_all(&reporter, jobs, options.concurrency).await
    };

    if app.is_json() {
        json::print(&serde_json::json!({ "outcomes": outcomes, "tally": tally }))?;
    } else {
        HumanRenderer::new(&app.output).render_bulk(&tally);
    }

    if !tally.all_completed() {
        let incomplete = tally.failed + tally.timed_out + tally.cancelled;
        anyhow::bail!("{incomplete} of {} target(s) did not complete", outcomes.len());
    }
    Ok(())
}

/// The target list: the whole fleet, or the `--agent` subset (every
/// filter name must be declared in the manifest).
fn target_names(fleet: &LoadedFleet, filter: &[String]) -> Result<Vec<String>> {
    if filter.is_empty() {
        return Ok(fleet.agents.iter().map(|a| a.name.clone()).collect());
    }
    let declared: HashSet<&str> = fleet.agents.iter().map(|a| a.name.as_str()).collect();
    for name in filter {
        if !declared.contains(name.as_str()) {
            return Err(AgentError::NotDeclared(name.clone()).into());
        }
    }
    Ok(filter.to_vec())
}
