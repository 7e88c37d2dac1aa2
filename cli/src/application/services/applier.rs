//! Application service — Operation Set execution against one agent.
//!
//! Additive operations and in-place updates always execute; subtractive
//! operations (detach, remove, file delete) execute only under force.
//! A single item's remote failure is warned and recorded, never fatal to
//! the rest of the set.

use anyhow::{Result, anyhow};

use crate::application::ports::{
    AgentPatch, AgentStore, ArchiveStore, BlockStore, FolderStore, ProgressReporter, ToolStore,
};
use crate::domain::diff::{FieldUpdate, OperationSet};

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    pub force: bool,
}

/// What actually happened while executing one Operation Set.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Items executed successfully.
    pub applied: usize,
    /// Destructive items present in the set but gated off (force not set).
    pub skipped_destructive: usize,
    /// Item-level failure messages, in execution order.
    pub failures: Vec<String>,
}

/// Execute `ops` against `agent_id`. Within each category, additions and
/// updates run before (gated) removals. An empty set short-circuits
/// before any remote call. Infallible by construction: every item failure
/// is caught into the report.
pub async fn apply(
    store: &(impl AgentStore + BlockStore + ToolStore + FolderStore + ArchiveStore),
    reporter: &impl ProgressReporter,
    agent_id: &str,
    ops: &OperationSet,
    options: ApplyOptions,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    if ops.is_empty() {
        return report;
    }

    apply_fields(store, reporter, agent_id, ops, &mut report).await;
    apply_tools(store, reporter, agent_id, ops, options, &mut report).await;
    apply_blocks(store, reporter, agent_id, ops, options, &mut report).await;
    apply_folders(store, reporter, agent_id, ops, options, &mut report).await;
    apply_archives(store, reporter, agent_id, ops, options, &mut report).await;

    if report.skipped_destructive > 0 {
        reporter.warn(&format!(
            "{} destructive operation(s) skipped; re-run with --force to execute them",
            report.skipped_destructive
        ));
    }
    report
}

fn note(
    reporter: &impl ProgressReporter,
    report: &mut ApplyReport,
    what: &str,
    outcome: Result<()>,
) {
    match outcome {
        Ok(()) => report.applied += 1,
        Err(e) => {
            reporter.warn(&format!("{what}: {e}"));
            report.failures.push(format!("{what}: {e}"));
        }
    }
}

fn require_id<'a>(id: Option<&'a str>, what: &str) -> Result<&'a str> {
    id.ok_or_else(|| anyhow!("{what} has no resolved id"))
}

async fn apply_fields(
    store: &impl AgentStore,
    reporter: &impl ProgressReporter,
    agent_id: &str,
    ops: &OperationSet,
    report: &mut ApplyReport,
) {
    if ops.field_updates.is_empty() {
        return;
    }
    let mut patch = AgentPatch::default();
    for update in &ops.field_updates {
        match update {
            FieldUpdate::System { to, .. } => patch.system = Some(to.clone()),
            FieldUpdate::Model { to, .. } => patch.model = Some(to.clone()),
            FieldUpdate::Embedding { to, .. } => patch.embedding = Some(to.clone()),
            FieldUpdate::ContextWindow { to, .. } => patch.context_window = Some(*to),
            FieldUpdate::Reasoning { to, .. } => patch.reasoning = Some(*to),
        }
    }
    match store.update_agent(agent_id, &patch).await {
        Ok(()) => report.applied += ops.field_updates.len(),
        Err(e) => {
            reporter.warn(&format!("updating agent fields: {e}"));
            report.failures.push(format!("updating agent fields: {e}"));
        }
    }
}

async fn apply_tools(
    store: &(impl AgentStore + ToolStore),
    reporter: &impl ProgressReporter,
    agent_id: &str,
    ops: &OperationSet,
    options: ApplyOptions,
    report: &mut ApplyReport,
) {
    for tool in &ops.tools.to_add {
        let what = format!("attaching tool '{}'", tool.name);
        let outcome = match require_id(tool.id.as_deref(), &what) {
            Ok(id) => store.attach_tool(agent_id, id).await,
            Err(e) => Err(e),
        };
        note(reporter, report, &what, outcome);
    }
    for update in &ops.tools.to_update {
        let what = format!("updating tool '{}' ({})", update.name, update.reason);
        let outcome = store.update_tool_source(&update.id, &update.source_code).await;
        note(reporter, report, &what, outcome);
    }
    for tool in &ops.tools.to_remove {
        if !options.force {
            report.skipped_destructive += 1;
            continue;
        }
        let what = format!("detaching tool '{}'", tool.name);
        let outcome = match require_id(tool.id.as_deref(), &what) {
            Ok(id) => store.detach_tool(agent_id, id).await,
            Err(e) => Err(e),
        };
        note(reporter, report, &what, outcome);
    }
}

async fn apply_blocks(
    store: &(impl AgentStore + BlockStore),
    reporter: &impl ProgressReporter,
    agent_id: &str,
    ops: &OperationSet,
    options: ApplyOptions,
    report: &mut ApplyReport,
) {
    for block in &ops.blocks.to_add {
        let what = format!("attaching block '{}'", block.label);
        let outcome = match require_id(block.id.as_deref(), &what) {
            Ok(id) => store.attach_block(agent_id, id).await,
            Err(e) => Err(e),
        };
        note(reporter, report, &what, outcome);
    }
    for sync in &ops.blocks.to_update_value {
        let what = format!("syncing block '{}'", sync.label);
        let outcome = match require_id(sync.id.as_deref(), &what) {
            Ok(id) => store.update_block_value(id, &sync.value).await,
            Err(e) => Err(e),
        };
        note(reporter, report, &what, outcome);
    }
    for swap in &ops.blocks.to_update {
        // detach the superseded block first so the agent never holds both
        let what = format!("swapping block '{}'", swap.label);
        let outcome = match require_id(swap.new_id.as_deref(), &what) {
            Ok(new_id) => match store.detach_block(agent_id, &swap.old_id).await {
                Ok(()) => store.attach_block(agent_id, new_id).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        note(reporter, report, &what, outcome);
    }
    for block in &ops.blocks.to_remove {
        if !options.force {
            report.skipped_destructive += 1;
            continue;
        }
        let what = format!("detaching block '{}'", block.label);
        let outcome = match require_id(block.id.as_deref(), &what) {
            Ok(id) => store.detach_block(agent_id, id).await,
            Err(e) => Err(e),
        };
        note(reporter, report, &what, outcome);
    }
}

async fn apply_folders(
    store: &(impl AgentStore + FolderStore),
    reporter: &impl ProgressReporter,
    agent_id: &str,
    ops: &OperationSet,
    options: ApplyOptions,
    report: &mut ApplyReport,
) {
    let mut files_touched = false;

    for folder in &ops.folders.to_attach {
        let what = format!("attaching folder '{}'", folder.name);
        let outcome = match require_id(folder.id.as_deref(), &what) {
            Ok(id) => store.attach_folder(agent_id, id).await,
            Err(e) => Err(e),
        };
        note(reporter, report, &what, outcome);
    }

    for file_ops in &ops.folders.file_ops {
        let folder_id = match require_id(
            file_ops.folder_id.as_deref(),
            &format!("folder '{}'", file_ops.folder_name),
        ) {
            Ok(id) => id,
            Err(e) => {
                reporter.warn(&format!("{e}"));
                report.failures.push(e.to_string());
                continue;
            }
        };
        for upload in file_ops.files_to_add.iter().chain(&file_ops.files_to_update) {
            let what = format!(
                "uploading '{}' to folder '{}'",
                upload.name, file_ops.folder_name
            );
            let outcome = store
                .upload_folder_file(folder_id, &upload.path, &upload.name)
                .await;
            if outcome.is_ok() {
                files_touched = true;
            }
            note(reporter, report, &what, outcome);
        }
        for removal in &file_ops.files_to_remove {
            if !options.force {
                report.skipped_destructive += 1;
                continue;
            }
            let what = format!(
                "deleting '{}' from folder '{}'",
                removal.name, file_ops.folder_name
            );
            let outcome = store.delete_folder_file(folder_id, &removal.file_id).await;
            if outcome.is_ok() {
                files_touched = true;
            }
            note(reporter, report, &what, outcome);
        }
    }

    for folder in &ops.folders.to_detach {
        if !options.force {
            report.skipped_destructive += 1;
            continue;
        }
        let what = format!("detaching folder '{}'", folder.name);
        let outcome = match require_id(folder.id.as_deref(), &what) {
            Ok(id) => store.detach_folder(agent_id, id).await,
            Err(e) => Err(e),
        };
        note(reporter, report, &what, outcome);
    }

    // context-window hygiene after any file mutation
    if files_touched {
        if let Err(e) = store.close_open_files(agent_id).await {
            reporter.warn(&format!("closing open files: {e}"));
        }
    }
}

async fn apply_archives(
    store: &(impl AgentStore + ArchiveStore),
    reporter: &impl ProgressReporter,
    agent_id: &str,
    ops: &OperationSet,
    options: ApplyOptions,
    report: &mut ApplyReport,
) {
    for archive in &ops.archives.to_attach {
        let what = format!("attaching archive '{}'", archive.name);
        let outcome = match require_id(archive.id.as_deref(), &what) {
            Ok(id) => store.attach_archive(agent_id, id).await,
            Err(e) => Err(e),
        };
        note(reporter, report, &what, outcome);
    }
    for update in &ops.archives.to_update {
        let what = format!("updating archive '{}'", update.name);
        let outcome = store.update_archive(&update.id, &update.description).await;
        note(reporter, report, &what, outcome);
    }
    for archive in &ops.archives.to_detach {
        if !options.force {
            report.skipped_destructive += 1;
            continue;
        }
        let what = format!("detaching archive '{}'", archive.name);
        let outcome = match require_id(archive.id.as_deref(), &what) {
            Ok(id) => store.detach_archive(agent_id, id).await,
            Err(e) => Err(e),
        };
        note(reporter, report, &what, outcome);
    }
}
