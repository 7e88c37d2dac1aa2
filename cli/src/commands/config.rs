//! `flotilla config` — show and set configuration values.

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::domain::config::{config_entries, set_config_value};
use crate::output::human::HumanRenderer;
use crate::output::json;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g. server.base_url)
        key: String,
        /// Configuration value
        value: String,
    },
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or written, or
/// the key/value pair fails validation.
pub async fn run(app: &AppContext, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(app).await,
        ConfigCommand::Set { key, value } => set(app, &key, &value).await,
    }
}

async fn show(app: &AppContext) -> Result<()> {
    let config = app.load_config().await?;
    let path = app.config_store.path();

    if app.is_json() {
        let entries: serde_json::Map<String, serde_json::Value> = config_entries(&config)
            .into_iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
            .collect();
        json::print(&serde_json::json!({
            "path": path,
            "config": entries,
        }))?;
    } else {
        HumanRenderer::new(&app.output).render_config(&config, &path);
    }
    Ok(())
}

async fn set(app: &AppContext, key: &str, value: &str) -> Result<()> {
    // Edit the file contents, not the env-overridden view, so
    // FLOTILLA_BASE_URL / FLOTILLA_API_KEY never get baked in.
    let mut config = app.config_store.load_for_edit().await?;
    set_config_value(&mut config, key, value)?;
    app.config_store.save_async(&config).await?;

    let shown = if key == "server.api_key" {
        "********"
    } else {
        value
    };
    if app.is_json() {
        json::print(&serde_json::json!({ "set": key, "value": shown }))?;
    } else {
        app.output.success(&format!("Set {key} = {shown}"));
    }
    Ok(())
}
