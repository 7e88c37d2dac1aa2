//! Domain types and validators for Flotilla configuration.
//!
//! Pure functions only — no I/O, no async, no filesystem access.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "server.base_url",
    "server.api_key",
    "bulk.concurrency",
    "bulk.timeout_secs",
];

pub const DEFAULT_BULK_CONCURRENCY: usize = 5;
pub const DEFAULT_BULK_TIMEOUT_SECS: u64 = 120;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.flotilla/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FlotillaConfig {
    /// Resource store connection settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Bulk send settings.
    #[serde(default)]
    pub bulk: BulkConfig,
}

/// Resource store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    /// Store base URL, e.g. `https://agents.example.dev`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Optional bearer token.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Bulk send settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Concurrency ceiling for bulk sends.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-target give-up timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_BULK_CONCURRENCY
}

fn default_timeout_secs() -> u64 {
    DEFAULT_BULK_TIMEOUT_SECS
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    let hint = match key {
        "server.base_url" => {
            if value.starts_with("http://") || value.starts_with("https://") {
                return Ok(());
            }
            "Expected an http(s) URL, e.g. https://agents.example.dev"
        }
        "bulk.concurrency" => {
            if value.parse::<usize>().is_ok_and(|n| n >= 1) {
                return Ok(());
            }
            "Expected a positive integer"
        }
        "bulk.timeout_secs" => {
            if value.parse::<u64>().is_ok_and(|n| n >= 1) {
                return Ok(());
            }
            "Expected a positive number of seconds"
        }
        _ => return Ok(()),
    };
    Err(ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        hint: hint.to_string(),
    }
    .into())
}

/// Writes a validated value into the config.
///
/// # Errors
///
/// Returns an error if the key is unknown or the value invalid.
pub fn set_config_value(config: &mut FlotillaConfig, key: &str, value: &str) -> Result<()> {
    validate_config_key(key)?;
    validate_config_value(key, value)?;
    match key {
        "server.base_url" => config.server.base_url = Some(value.to_string()),
        "server.api_key" => config.server.api_key = Some(value.to_string()),
        // parse errors ruled out by validation above
        "bulk.concurrency" => config.bulk.concurrency = value.parse().unwrap_or(1),
        "bulk.timeout_secs" => config.bulk.timeout_secs = value.parse().unwrap_or(1),
        _ => {}
    }
    Ok(())
}

/// Reads a single config value by key. `None` for unknown or unset keys.
#[must_use]
pub fn get_config_value(config: &FlotillaConfig, key: &str) -> Option<String> {
    match key {
        "server.base_url" => config.server.base_url.clone(),
        "server.api_key" => config.server.api_key.clone(),
        "bulk.concurrency" => Some(config.bulk.concurrency.to_string()),
        "bulk.timeout_secs" => Some(config.bulk.timeout_secs.to_string()),
        _ => None,
    }
}

/// Every known key with its current display value, API key redacted.
#[must_use]
pub fn config_entries(config: &FlotillaConfig) -> Vec<(&'static str, String)> {
    VALID_CONFIG_KEYS
        .iter()
        .map(|&key| {
            let value = if key == "server.api_key" {
                match &config.server.api_key {
                    Some(_) => "********".to_string(),
                    None => "(unset)".to_string(),
                }
            } else {
                get_config_value(config, key).unwrap_or_else(|| "(unset)".to_string())
            };
            (key, value)
        })
        .collect()
}

// ── Unit tests ───────────────────────────────────────────────────────────────
