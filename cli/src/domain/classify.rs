//! Shared/orphan classification for cross-agent resources.
//!
//! Deciding whether a block can be deleted is a fleet-wide question:
//! shared resources and resources still referenced by another agent must
//! survive a single agent's removal. Everything here is pure; the
//! fallible per-agent scans live in the services and feed their results
//! in as [`AttachmentProbe`] values.

use flotilla_common::names;
use regex::Regex;

use crate::domain::resources::Block;

/// Result of probing one agent for a resource attachment.
///
/// Probes are best-effort: a fetch failure for an individual agent is its
/// own variant so callers can fold it into `NotFound` explicitly instead
/// of aborting the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentProbe {
    Found,
    NotFound,
    FetchError,
}

/// How widely a resource is used across the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// Attached to no agent.
    Orphaned,
    /// Attached to exactly one agent.
    Exclusive,
    /// Attached to two or more agents.
    Shared,
}

/// True iff the name carries the `shared_` marker (version tokens
/// stripped first). A naming-convention predicate, not a usage query.
#[must_use]
pub fn is_shared_name(name: &str) -> bool {
    names::is_shared_name(name)
}

/// Classify a resource by its attachment count.
#[must_use]
pub fn classify_usage(attachment_count: usize) -> Usage {
    match attachment_count {
        0 => Usage::Orphaned,
        1 => Usage::Exclusive,
        _ => Usage::Shared,
    }
}

/// True iff the resource is attached to two or more agents.
#[must_use]
pub fn is_shared_by_usage(attachment_count: usize) -> bool {
    classify_usage(attachment_count) == Usage::Shared
}

/// Fold a scan's per-agent probes into a single answer. `FetchError`
/// counts as not-found: a scan never fails the caller.
#[must_use]
pub fn any_found(probes: impl IntoIterator<Item = AttachmentProbe>) -> bool {
    probes.into_iter().any(|p| p == AttachmentProbe::Found)
}

/// True when the label embeds the agent's name as a delimited segment
/// (`triage`, `triage_notes`, `notes-triage`). Used only as a fallback
/// for legacy labels that predate agent-scoped registry keys; labels
/// carrying the shared marker never match.
#[must_use]
pub fn is_agent_specific(label: &str, agent_name: &str) -> bool {
    if agent_name.is_empty() || is_shared_name(label) {
        return false;
    }
    // delimiter-bounded containment: "chat" must not match "chatter_notes"
    let pattern = format!("(^|[_-]){}([_-]|$)", regex::escape(agent_name));
    Regex::new(&pattern).is_ok_and(|re| re.is_match(label))
}

/// Blocks whose labels look owned by the given agent, for legacy cleanup.
#[must_use]
pub fn agent_specific_blocks<'a>(blocks: &'a [Block], agent_name: &str) -> Vec<&'a Block> {
    blocks
        .iter()
        .filter(|b| is_agent_specific(&b.label, agent_name))
        .collect()
}
