//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Manifest errors ───────────────────────────────────────────────────────────

/// Errors related to the fleet manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Fleet manifest not found: {0}\n\nPass one with: flotilla apply -f <path>")]
    NotFound(String),

    #[error("Fleet manifest validation failed:\n{0}")]
    ValidationFailed(String),
}

// ── Agent errors ──────────────────────────────────────────────────────────────

/// Errors related to fleet agents.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent '{0}' not found on the store. Run 'flotilla agents list' to see the fleet.")]
    NotFound(String),

    #[error("Agent '{0}' is not declared in the manifest.")]
    NotDeclared(String),
}

// ── Store errors ──────────────────────────────────────────────────────────────

/// Errors surfaced by the remote resource store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store request failed ({status}): {message}")]
    Api { status: u16, message: String },
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Server base URL is not configured.\n\nSet it with: flotilla config set server.base_url <url>"
    )]
    MissingBaseUrl,

    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\n{hint}")]
    InvalidValue {
        key: String,
        value: String,
        hint: String,
    },
}
