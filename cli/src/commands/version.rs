//! `flotilla version` — show the CLI version.

use anyhow::Result;

use crate::app::AppContext;
use crate::output::human::HumanRenderer;
use crate::output::json;

/// Run `flotilla version`.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn run(app: &AppContext) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");

    if app.is_json() {
        json::print(&serde_json::json!({ "version": version }))?;
    } else {
        HumanRenderer::new(&app.output).render_version(version);
    }
    Ok(())
}
