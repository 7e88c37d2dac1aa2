//! JSON output helpers.
//!
//! Every `--json` code path prints exactly one document to stdout via
//! [`print`]; failures produce the error object from [`format_error`]
//! on stderr instead.

use anyhow::{Context, Result};
use serde::Serialize;

/// Pretty-print a serializable document to stdout.
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen in
/// practice — `serde_json` only fails on non-finite floats and maps with
/// non-string keys, neither of which appear here).
pub fn print<T: Serialize>(document: &T) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(document).context("JSON serialization failed")?;
    println!("{rendered}");
    Ok(())
}

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen in
/// practice; the object holds a single string field).
pub fn format_error(message: &str) -> Result<String> {
    let obj = serde_json::json!({ "error": message });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}
