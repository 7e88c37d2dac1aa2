//! Parsing and construction of versioned store-side names.
//!
//! Agents version with an ordinal suffix (`triage__v3`); blocks version
//! with a content-address token (`shared_rules__9f2ab1c4`). Plain names
//! are implicitly version 1.

use std::sync::LazyLock;

use flotilla_common::names::VERSION_SEP;
use regex::Regex;

static AGENT_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<base>.+?)__v(?P<num>\d+)$").expect("valid regex"));

static CONTENT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<base>.+?)__(?P<token>[0-9a-f]{8})$").expect("valid regex"));

/// Split a store-side agent name into (base, version).
///
/// `triage__v3` → `("triage", 3)`; names without a suffix are version 1.
#[must_use]
pub fn split_version(name: &str) -> (&str, u32) {
    if let Some(caps) = AGENT_VERSION_RE.captures(name) {
        let num = caps
            .name("num")
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(1);
        if let Some(base) = caps.name("base") {
            return (base.as_str(), num);
        }
    }
    (name, 1)
}

/// Store-side name for a given version of an agent. Version 1 is the bare
/// base name; later versions carry the ordinal suffix.
#[must_use]
pub fn versioned_name(base: &str, version: u32) -> String {
    if version <= 1 {
        base.to_string()
    } else {
        format!("{base}{VERSION_SEP}v{version}")
    }
}

/// Split a block label into (base, content token).
///
/// `shared_rules__9f2ab1c4` → `("shared_rules", Some("9f2ab1c4"))`;
/// labels without an 8-hex token pass through with `None`.
#[must_use]
pub fn split_content_token(label: &str) -> (&str, Option<&str>) {
    if let Some(caps) = CONTENT_TOKEN_RE.captures(label) {
        if let (Some(base), Some(token)) = (caps.name("base"), caps.name("token")) {
            return (base.as_str(), Some(token.as_str()));
        }
    }
    (label, None)
}

/// Content-addressed label for a superseding block version.
#[must_use]
pub fn versioned_label(base: &str, token: &str) -> String {
    format!("{base}{VERSION_SEP}{token}")
}
