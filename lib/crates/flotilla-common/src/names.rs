/// Separator between a resource's base name and its version or content
/// token in store-resolved names.
/// Format: `triage__v3` (agent version), `shared_rules__9f2ab1c4` (block
/// content address).
/// User-declared names must never contain it; the reconciler owns the
/// suffix namespace.
pub const VERSION_SEP: &str = "__";

/// Naming-convention marker for blocks owned by the fleet rather than a
/// single agent.
/// Format: `shared_guidelines`, `shared_policy__1a2b3c4d`.
pub const SHARED_PREFIX: &str = "shared_";

/// Maximum length of an agent or fleet name.
pub const MAX_AGENT_NAME_LEN: usize = 63;

/// Maximum length of a block label, version token included.
pub const MAX_BLOCK_LABEL_LEN: usize = 64;

/// Strip any `__`-delimited version or content token off a resolved name.
///
/// `base_name("triage__v3")` is `"triage"`; names without a token pass
/// through unchanged.
#[must_use]
pub fn base_name(name: &str) -> &str {
    name.split(VERSION_SEP).next().unwrap_or(name)
}

/// True iff the name carries the shared marker, after stripping any
/// version token. Purely a naming-convention predicate.
#[must_use]
pub fn is_shared_name(name: &str) -> bool {
    base_name(name).starts_with(SHARED_PREFIX)
}

/// Validate a user-declared agent (or fleet) name: `[a-z0-9][a-z0-9-]*`,
/// at most 63 characters.
/// Returns Ok(()) if valid, Err with description if invalid.
/// Hyphen-only punctuation keeps the `__` suffix namespace free for the
/// reconciler's version tokens.
pub fn validate_agent_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name must not be empty");
    }
    if name.len() > MAX_AGENT_NAME_LEN {
        return Err("name must be at most 63 characters");
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return Err("name must start with a lowercase letter or digit"),
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err("name must contain only lowercase letters, digits, and hyphens");
    }
    Ok(())
}

/// Validate a user-declared block label: `[a-z0-9_][a-z0-9_-]*`, at most
/// 64 characters, no `__` runs.
/// Returns Ok(()) if valid, Err with description if invalid.
pub fn validate_block_label(label: &str) -> Result<(), &'static str> {
    if label.is_empty() {
        return Err("block label must not be empty");
    }
    if label.len() > MAX_BLOCK_LABEL_LEN {
        return Err("block label must be at most 64 characters");
    }
    let mut chars = label.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' => {}
        _ => return Err("block label must start with a lowercase letter, digit, or underscore"),
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-') {
        return Err("block label must contain only lowercase letters, digits, underscores, and hyphens");
    }
    if label.contains(VERSION_SEP) {
        return Err("block label must not contain '__' (reserved for version tokens)");
    }
    Ok(())
}
