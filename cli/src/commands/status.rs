//! `flotilla status` — per-agent drift summary.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::fleet_loader::load_fleet;
use crate::application::services::reconcile::plan_fleet;
use crate::infra::fs::StdFs;
use crate::output::human::HumanRenderer;
use crate::output::json;
use crate::output::reporter::TerminalReporter;

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Path to the fleet manifest
    #[arg(short = 'f', long = "file", default_value = "fleet.yaml")]
    pub file: PathBuf,
}

/// Run `flotilla status`. The summary view over the same read-only plan
/// the plan command renders in full.
///
/// # Errors
///
/// Returns an error if the manifest is invalid or the store is
/// unreachable.
pub async fn run(app: &AppContext, args: StatusArgs) -> Result<()> {
    let fleet = load_fleet(&StdFs, &args.file)?;
    let (store, _config) = app.connect().await?;

    let reporter = TerminalReporter::new(&app.output);
    let plan = plan_fleet(&store, &reporter, &fleet, &[]).await?;

    if app.is_json() {
        json::print(&plan)?;
    } else {
        HumanRenderer::new(&app.output).render_status(&plan);
    }
    Ok(())
}
