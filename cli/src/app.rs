//! Application context — unified state passed to every command handler.
//!
//! `AppContext` is constructed once in `Cli::run()` and passed as
//! `&AppContext` to all command handlers. It owns the output context, the
//! configuration store, and the connection recipe for the remote resource
//! store, so adding a cross-cutting concern requires one field change here
//! and zero command signature changes.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::config::FlotillaConfig;
use crate::domain::error::ConfigError;
use crate::infra::config::YamlConfigStore;
use crate::infra::http::HttpFleetStore;
use crate::output::OutputContext;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by the `FLOTILLA_YES` env var).
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Local configuration persistence.
    pub config_store: YamlConfigStore,
    /// When `true`, destructive prompts are auto-confirmed.
    ///
    /// Set when `--yes` / `-y` is passed or the `FLOTILLA_YES`
    /// environment variable is present.
    pub assume_yes: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config path cannot be determined (home
    /// directory not found).
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        // JSON mode implies quiet: stdout must stay a single document, so
        // progress and hint lines are suppressed.
        let quiet = flags.output.quiet || flags.output.json;

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, quiet),
            mode,
            config_store: YamlConfigStore::new()?,
            assume_yes: flags.behaviour.yes,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Load the local configuration (defaults when the file is missing,
    /// `FLOTILLA_BASE_URL` / `FLOTILLA_API_KEY` overrides applied).
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub async fn load_config(&self) -> Result<FlotillaConfig> {
        self.config_store.load_async().await
    }

    /// Build the remote store client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingBaseUrl` when no base URL is
    /// configured, or an error if the HTTP client cannot be built.
    pub async fn connect(&self) -> Result<(HttpFleetStore, FlotillaConfig)> {
        let config = self.load_config().await?;
        let base_url = config
            .server
            .base_url
            .clone()
            .ok_or(ConfigError::MissingBaseUrl)?;
        let store = HttpFleetStore::new(&base_url, config.server.api_key.clone())?;
        Ok((store, config))
    }

    /// Ask the user to confirm a destructive operation.
    ///
    /// `--yes` / `FLOTILLA_YES` confirms without prompting. Without it,
    /// non-interactive contexts (`--json`, `--quiet`, no TTY) refuse
    /// rather than guessing.
    ///
    /// # Errors
    ///
    /// Returns an error when confirmation is required but no prompt can
    /// be shown, or if the terminal prompt itself fails.
    pub fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        if self.is_json() || self.output.quiet || !self.output.is_tty {
            anyhow::bail!("confirmation required; re-run with --yes");
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(confirmed)
    }
}
