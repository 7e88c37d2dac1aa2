//! Application service — agent deletion and orphaned-block cleanup.
//!
//! Both paths are classifier-guarded: shared blocks are never deleted,
//! and a block still attached to any other agent is kept. Attachment
//! probes that fail are treated as "not found" — a best-effort scan,
//! never a hard failure for the whole cleanup.

use anyhow::Result;
use serde::Serialize;

use crate::application::ports::{AgentStore, BlockStore, ProgressReporter};
use crate::application::services::agent_registry::find_agent;
use crate::domain::classify::{AttachmentProbe, is_agent_specific, is_shared_name};
use crate::domain::version::split_version;

/// What happened to each candidate block during an agent deletion.
#[derive(Debug, Default, Serialize)]
pub struct CleanupReport {
    pub deleted_agent: String,
    pub deleted_blocks: Vec<String>,
    pub kept_shared: Vec<String>,
    pub kept_in_use: Vec<String>,
}

/// A block attached to zero agents.
#[derive(Debug, Clone, Serialize)]
pub struct OrphanBlock {
    pub id: String,
    pub label: String,
}

/// An orphan-sweep result.
#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    /// Every orphaned block found.
    pub orphans: Vec<OrphanBlock>,
    /// Labels actually deleted (force mode only).
    pub deleted: Vec<String>,
}

/// Probe whether any agent still holds `block_id` attached. Fetch
/// failures surface as `FetchError`; the caller decides the policy.
async fn attachment_probe(store: &impl BlockStore, block_id: &str) -> AttachmentProbe {
    match store.agents_for_block(block_id).await {
        Ok(holders) if holders.is_empty() => AttachmentProbe::NotFound,
        Ok(_) => AttachmentProbe::Found,
        Err(_) => AttachmentProbe::FetchError,
    }
}

/// Delete the named agent, then clean up its agent-scoped blocks.
///
/// Candidates are the blocks the agent held at deletion time, plus a
/// fallback pass over the global block list for legacy labels that embed
/// the agent's name. A candidate survives if it is shared by naming
/// convention or still attached to another agent.
///
/// # Errors
///
/// Returns `AgentError::NotFound` if no agent with the base name exists,
/// or the store error if the deletion itself fails. Cleanup failures
/// after a successful deletion are warned, not fatal.
pub async fn delete_agent_with_cleanup(
    store: &(impl AgentStore + BlockStore),
    reporter: &impl ProgressReporter,
    name: &str,
) -> Result<CleanupReport> {
    let base = split_version(name).0.to_string();
    let target = find_agent(store, name).await?;

    let observed = store.get_agent(&target.id).await?;
    reporter.step(&format!("deleting agent '{}'...", target.name));
    store.delete_agent(&target.id).await?;

    let mut report = CleanupReport {
        deleted_agent: target.name,
        ..CleanupReport::default()
    };
    for block in &observed.blocks {
        sweep_candidate(store, reporter, &block.id, &block.label, &mut report).await;
    }

    // fallback pass for legacy blocks whose label embeds the agent name
    // but which were no longer attached
    match store.list_blocks().await {
        Ok(all_blocks) => {
            for block in all_blocks {
                let already_seen = report.deleted_blocks.contains(&block.label)
                    || report.kept_shared.contains(&block.label)
                    || report.kept_in_use.contains(&block.label);
                if already_seen || !is_agent_specific(&block.label, &base) {
                    continue;
                }
                sweep_candidate(store, reporter, &block.id, &block.label, &mut report).await;
            }
        }
        Err(e) => reporter.warn(&format!("listing blocks for legacy cleanup: {e}")),
    }

    reporter.success(&format!(
        "agent '{}' deleted ({} block(s) cleaned up)",
        report.deleted_agent,
        report.deleted_blocks.len()
    ));
    Ok(report)
}

async fn sweep_candidate(
    store: &impl BlockStore,
    reporter: &impl ProgressReporter,
    block_id: &str,
    label: &str,
    report: &mut CleanupReport,
) {
    if is_shared_name(label) {
        report.kept_shared.push(label.to_string());
        return;
    }
    // a failed probe counts as not-found: best effort, visible policy
    let probe = attachment_probe(store, block_id).await;
    if probe == AttachmentProbe::Found {
        report.kept_in_use.push(label.to_string());
        return;
    }
    match store.delete_block(block_id).await {
        Ok(()) => report.deleted_blocks.push(label.to_string()),
        Err(e) => reporter.warn(&format!("deleting block '{label}': {e}")),
    }
}

/// Find blocks attached to zero agents; delete them only in force mode.
///
/// # Errors
///
/// Returns an error only if the initial block listing fails; per-block
/// probe and delete failures are warned and skipped.
pub async fn orphan_sweep(
    store: &impl BlockStore,
    reporter: &impl ProgressReporter,
    force: bool,
) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    for block in store.list_blocks().await? {
        let probe = attachment_probe(store, &block.id).await;
        if probe == AttachmentProbe::Found {
            continue;
        }
        report.orphans.push(OrphanBlock {
            id: block.id.clone(),
            label: block.label.clone(),
        });
        if !force {
            continue;
        }
        match store.delete_block(&block.id).await {
            Ok(()) => {
                reporter.step(&format!("deleted orphaned block '{}'", block.label));
                report.deleted.push(block.label.clone());
            }
            Err(e) => reporter.warn(&format!("deleting block '{}': {e}", block.label)),
        }
    }
    Ok(report)
}
