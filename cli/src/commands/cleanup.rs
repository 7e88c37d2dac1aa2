//! `flotilla cleanup` — sweep orphaned blocks off the store.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::cleanup::{SweepReport, orphan_sweep};
use crate::output::json;
use crate::output::reporter::TerminalReporter;

/// Arguments for the cleanup command.
#[derive(Args)]
pub struct CleanupArgs {
    /// Delete the orphans found (default: list only)
    #[arg(long)]
    pub force: bool,
}

/// Run `flotilla cleanup`.
///
/// # Errors
///
/// Returns an error if the store is unreachable or confirmation is
/// required but cannot be prompted for.
pub async fn run(app: &AppContext, args: CleanupArgs) -> Result<()> {
    let (store, _config) = app.connect().await?;

    if args.force && !app.confirm("Delete every block with zero attachments?")? {
        app.output.info("Cancelled.");
        return Ok(());
    }

    let reporter = TerminalReporter::new(&app.output);
    let report = orphan_sweep(&store, &reporter, args.force).await?;

    if app.is_json() {
        json::print(&report)?;
    } else {
        render_sweep(app, &report, args.force);
    }
    Ok(())
}

fn render_sweep(app: &AppContext, report: &SweepReport, force: bool) {
    if report.orphans.is_empty() {
        app.output.success("No orphaned blocks.");
        return;
    }
    for orphan in &report.orphans {
        app.output.kv(&format!("{}:", orphan.label), &orphan.id);
    }
    if force {
        app.output.success(&format!(
            "{} orphaned block(s) deleted",
            report.deleted.len()
        ));
    } else {
        app.output.warn(&format!(
            "{} orphaned block(s) found. Delete them: flotilla cleanup --force",
            report.orphans.len()
        ));
    }
}
