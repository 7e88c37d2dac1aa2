//! `flotilla apply` — reconcile the fleet toward the manifest.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::LockfileStore;
use crate::application::services::fleet_loader::load_fleet;
use crate::application::services::reconcile::{ReconcileOptions, apply_fleet};
use crate::infra::fs::StdFs;
use crate::infra::lockfile::JsonLockfileStore;
use crate::output::human::HumanRenderer;
use crate::output::json;
use crate::output::reporter::TerminalReporter;

/// Arguments for the apply command.
#[derive(Args)]
pub struct ApplyArgs {
    /// Path to the fleet manifest
    #[arg(short = 'f', long = "file", default_value = "fleet.yaml")]
    pub file: PathBuf,

    /// Execute destructive operations (detach, remove, file delete)
    #[arg(long)]
    pub force: bool,

    /// Mint a new agent version when the config fingerprint drifted
    #[arg(long)]
    pub new_version: bool,

    /// Reconcile only the named agent(s)
    #[arg(long = "agent", value_name = "NAME")]
    pub agents: Vec<String>,

    /// Lock manifest output path (default: flotilla.lock.json next to the manifest)
    #[arg(long, value_name = "PATH")]
    pub lockfile: Option<PathBuf>,
}

/// Run `flotilla apply`.
///
/// # Errors
///
/// Returns an error if the manifest is invalid, the store is unreachable,
/// a shared-resource step fails, or any agent failed to converge.
pub async fn run(app: &AppContext, args: ApplyArgs) -> Result<()> {
    let fleet = load_fleet(&StdFs, &args.file)?;
    let (store, _config) = app.connect().await?;

    let reporter = TerminalReporter::new(&app.output);
    let options = ReconcileOptions {
        force: args.force,
        new_version: args.new_version,
        agents: args.agents,
    };
    let report = apply_fleet(&store, &reporter, &fleet, &options).await?;

    let lock_path = args.lockfile.unwrap_or_else(|| lock_path_for(&args.file));
    JsonLockfileStore.save_async(&lock_path, &report.lock).await?;

    if app.is_json() {
        json::print(&report)?;
    } else {
        HumanRenderer::new(&app.output).render_fleet_report(&report);
        app.output
            .info(&format!("lock manifest written to {}", lock_path.display()));
    }

    if !report.success() {
        let total = report.succeeded.len() + report.unchanged.len() + report.failed.len();
        anyhow::bail!(
            "{} of {total} agent(s) failed to converge",
            report.failed.len()
        );
    }
    Ok(())
}

/// Default lock path: `flotilla.lock.json` in the manifest's directory.
fn lock_path_for(manifest: &Path) -> PathBuf {
    match manifest.parent() {
        Some(dir) if dir.as_os_str().is_empty() => PathBuf::from("flotilla.lock.json"),
        Some(dir) => dir.join("flotilla.lock.json"),
        None => PathBuf::from("flotilla.lock.json"),
    }
}
