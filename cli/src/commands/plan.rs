//! `flotilla plan` — preview the operations apply would run.

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

/// Arguments for the plan command.
#[derive(Args)]
pub struct PlanArgs {
    /// Path to the fleet manifest
    #[arg(short = 'f', long = "file", default_value = "fleet.yaml")]
    pub file: PathBuf,

    /// Plan only the named agent(s)
    #[arg(long = "agent", value_name = "NAME")]
    pub agents: Vec<String>,
}

/// Run `flotilla plan`. Read-only: no store mutation happens.
///
/// # Errors
///
/// Returns an error if the manifest is invalid or the store is
/// unreachable.
pub async fn run(app: &AppContext, args: PlanArgs) -> Result<()> {
    let fleet = load_fleet(&StdFs, &args.file)?;
    let (store, _config) = app.connect().await?;

    let reporter = TerminalReporter::new(&app.output);
    let plan = plan_fleet(&store, &reporter, &fleet, &args.agents).await?;

    if app.is_json() {
        json::print(&plan)?;
    } else {
        HumanRenderer::new(&app.output).render_plan(&plan);
    }
    Ok(())
}
