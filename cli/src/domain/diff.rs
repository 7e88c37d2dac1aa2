//! The diff engine: desired vs. observed comparison for one agent.
//!
//! `diff` is pure. The desired side arrives with block references already
//! resolved through the block registry (each carrying its resolution) and
//! folder files already fingerprinted; the observed side is the agent as
//! fetched from the store. The output is a categorized operation set the
//! applier executes under the force policy.

use std::collections::BTreeMap;
use std::path::PathBuf;

use flotilla_common::names;
use serde::Serialize;

use crate::domain::fingerprint::short_fingerprint;
use crate::domain::resources::{Agent, BlockResolution, FolderFile};

// ── Desired side ─────────────────────────────────────────────────────────────

/// One agent's desired configuration, references resolved.
#[derive(Debug, Clone)]
pub struct DesiredAgent {
    /// Store-side name, version suffix included.
    pub name: String,
    pub system: String,
    pub model: String,
    /// `None` defers to the store's default embedding.
    pub embedding: Option<String>,
    pub context_window: u32,
    pub reasoning: bool,
    pub tools: Vec<DesiredTool>,
    pub blocks: Vec<ResolvedBlock>,
    pub folders: Vec<DesiredFolder>,
    pub archives: Vec<DesiredArchive>,
}

/// A desired tool reference. `id`/`source_hash` are `None` for tools that
/// do not exist yet or have no source (builtin, MCP).
#[derive(Debug, Clone)]
pub struct DesiredTool {
    pub name: String,
    pub id: Option<String>,
    pub source_hash: Option<String>,
    pub source_code: Option<String>,
}

/// A desired block after registry resolution. `id` is `None` only in
/// read-only planning, where would-be-created resources have no identity
/// yet.
#[derive(Debug, Clone)]
pub struct ResolvedBlock {
    pub id: Option<String>,
    pub label: String,
    pub value: String,
    pub limit: u32,
    pub resolution: BlockResolution,
}

/// A desired folder. `remote_files` is the store-side file listing for
/// the folder regardless of attachment (file state is global; attachment
/// is per-agent), empty when the folder does not exist yet.
#[derive(Debug, Clone)]
pub struct DesiredFolder {
    pub id: Option<String>,
    pub name: String,
    pub files: Vec<DesiredFile>,
    pub remote_files: Vec<FolderFile>,
}

/// A local file destined for a folder, fingerprinted at load time.
#[derive(Debug, Clone)]
pub struct DesiredFile {
    pub name: String,
    pub path: PathBuf,
    pub content_hash: String,
}

/// A desired archive reference.
#[derive(Debug, Clone)]
pub struct DesiredArchive {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
}

// ── Operation set ────────────────────────────────────────────────────────────

/// Categorized operations converging one agent toward its desired state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationSet {
    pub field_updates: Vec<FieldUpdate>,
    pub tools: ToolOps,
    pub blocks: BlockOps,
    pub folders: FolderOps,
    pub archives: ArchiveOps,
}

/// A scalar agent-field change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldUpdate {
    System { from: String, to: String },
    Model { from: String, to: String },
    Embedding { from: Option<String>, to: String },
    ContextWindow { from: u32, to: u32 },
    Reasoning { from: bool, to: bool },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolOps {
    pub to_add: Vec<ToolRef>,
    pub to_remove: Vec<ToolRef>,
    pub to_update: Vec<ToolUpdate>,
    pub unchanged: Vec<String>,
}

/// An attach/detach target. `id` is `None` when planning against a tool
/// that does not exist yet.
#[derive(Debug, Clone, Serialize)]
pub struct ToolRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// An in-place source update for a custom tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolUpdate {
    pub id: String,
    pub name: String,
    pub reason: String,
    #[serde(skip)]
    pub source_code: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BlockOps {
    pub to_add: Vec<BlockAttach>,
    pub to_remove: Vec<BlockAttach>,
    /// Version swaps: detach `old_id`, attach `new_id`.
    pub to_update: Vec<BlockSwap>,
    /// In-place content syncs for mutable agent-scoped blocks.
    pub to_update_value: Vec<BlockValueSync>,
    pub unchanged: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockAttach {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockSwap {
    pub label: String,
    pub old_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockValueSync {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FolderOps {
    pub to_attach: Vec<FolderRef>,
    pub to_detach: Vec<FolderRef>,
    pub file_ops: Vec<FolderFileOps>,
    pub unchanged: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// File-granular convergence for one folder.
#[derive(Debug, Clone, Serialize)]
pub struct FolderFileOps {
    pub folder_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    pub files_to_add: Vec<FileUpload>,
    pub files_to_update: Vec<FileUpload>,
    pub files_to_remove: Vec<FileRemove>,
}

impl FolderFileOps {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files_to_add.is_empty()
            && self.files_to_update.is_empty()
            && self.files_to_remove.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files_to_add.len() + self.files_to_update.len() + self.files_to_remove.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileUpload {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileRemove {
    pub name: String,
    pub file_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveOps {
    pub to_attach: Vec<ArchiveRef>,
    pub to_detach: Vec<ArchiveRef>,
    pub to_update: Vec<ArchiveUpdate>,
    pub unchanged: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveUpdate {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl OperationSet {
    /// Total non-`unchanged` items across every category; scalar field
    /// updates and per-file folder operations each count as one.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        let file_ops: usize = self.folders.file_ops.iter().map(FolderFileOps::len).sum();
        self.field_updates.len()
            + self.tools.to_add.len()
            + self.tools.to_remove.len()
            + self.tools.to_update.len()
            + self.blocks.to_add.len()
            + self.blocks.to_remove.len()
            + self.blocks.to_update.len()
            + self.blocks.to_update_value.len()
            + self.folders.to_attach.len()
            + self.folders.to_detach.len()
            + file_ops
            + self.archives.to_attach.len()
            + self.archives.to_detach.len()
            + self.archives.to_update.len()
    }

    /// True when applying would be a no-op; the applier short-circuits on
    /// this before any remote call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }

    /// Whether applying this set keeps the agent's conversational and
    /// recall state. Always true: convergence mutates attachments and
    /// scalar fields in place and never recreates the agent — only the
    /// registry's explicit versioning path produces a new identity.
    #[must_use]
    pub fn preserves_conversation(&self) -> bool {
        true
    }
}

// ── Diff ─────────────────────────────────────────────────────────────────────

/// Compare one agent's desired configuration against its observed state.
#[must_use]
pub fn diff(desired: &DesiredAgent, observed: &Agent) -> OperationSet {
    OperationSet {
        field_updates: diff_fields(desired, observed),
        tools: diff_tools(desired, observed),
        blocks: diff_blocks(desired, observed),
        folders: diff_folders(desired, observed),
        archives: diff_archives(desired, observed),
    }
}

fn diff_fields(desired: &DesiredAgent, observed: &Agent) -> Vec<FieldUpdate> {
    let mut updates = Vec::new();
    if desired.system != observed.system {
        updates.push(FieldUpdate::System {
            from: observed.system.clone(),
            to: desired.system.clone(),
        });
    }
    if desired.model != observed.model {
        updates.push(FieldUpdate::Model {
            from: observed.model.clone(),
            to: desired.model.clone(),
        });
    }
    if let Some(want) = &desired.embedding {
        if observed.embedding.as_deref() != Some(want.as_str()) {
            updates.push(FieldUpdate::Embedding {
                from: observed.embedding.clone(),
                to: want.clone(),
            });
        }
    }
    if desired.context_window != observed.context_window {
        updates.push(FieldUpdate::ContextWindow {
            from: observed.context_window,
            to: desired.context_window,
        });
    }
    if desired.reasoning != observed.reasoning {
        updates.push(FieldUpdate::Reasoning {
            from: observed.reasoning,
            to: desired.reasoning,
        });
    }
    updates
}

fn diff_tools(desired: &DesiredAgent, observed: &Agent) -> ToolOps {
    let desired_by_name: BTreeMap<&str, &DesiredTool> =
        desired.tools.iter().map(|t| (t.name.as_str(), t)).collect();
    let observed_by_name: BTreeMap<&str, &crate::domain::resources::Tool> =
        observed.tools.iter().map(|t| (t.name.as_str(), t)).collect();

    let mut ops = ToolOps::default();
    for (name, dt) in &desired_by_name {
        match observed_by_name.get(name) {
            None => ops.to_add.push(ToolRef {
                name: (*name).to_string(),
                id: dt.id.clone(),
            }),
            Some(ot) => {
                let drifted = match (&dt.source_hash, ot.source_hash()) {
                    (Some(want), Some(have)) => *want != have,
                    // builtin and MCP tools are never source-diffed
                    _ => false,
                };
                if drifted {
                    ops.to_update.push(ToolUpdate {
                        id: ot.id.clone(),
                        name: (*name).to_string(),
                        reason: format!(
                            "source changed ({} → {})",
                            ot.source_hash().map(|h| short(&h)).unwrap_or_default(),
                            dt.source_hash.as_deref().map(short).unwrap_or_default(),
                        ),
                        source_code: dt.source_code.clone().unwrap_or_default(),
                    });
                } else {
                    ops.unchanged.push((*name).to_string());
                }
            }
        }
    }
    for (name, ot) in &observed_by_name {
        if !desired_by_name.contains_key(name) {
            ops.to_remove.push(ToolRef {
                name: (*name).to_string(),
                id: Some(ot.id.clone()),
            });
        }
    }
    ops
}

fn short(hash: &str) -> String {
    hash.chars().take(8).collect()
}

fn diff_blocks(desired: &DesiredAgent, observed: &Agent) -> BlockOps {
    let observed_by_base: BTreeMap<&str, &crate::domain::resources::Block> = observed
        .blocks
        .iter()
        .map(|b| (names::base_name(&b.label), b))
        .collect();

    let mut ops = BlockOps::default();
    let mut desired_bases = Vec::new();
    for d in &desired.blocks {
        let base = names::base_name(&d.label);
        desired_bases.push(base);
        let Some(ob) = observed_by_base.get(base) else {
            ops.to_add.push(BlockAttach {
                label: d.label.clone(),
                id: d.id.clone(),
            });
            continue;
        };
        if matches!(d.resolution, BlockResolution::SyncValue) {
            ops.to_update_value.push(BlockValueSync {
                label: d.label.clone(),
                id: d.id.clone().or_else(|| Some(ob.id.clone())),
                value: d.value.clone(),
            });
        } else if d.id.as_deref() == Some(ob.id.as_str()) {
            ops.unchanged.push(d.label.clone());
        } else {
            // observed agent holds a superseded or stale instance
            ops.to_update.push(BlockSwap {
                label: d.label.clone(),
                old_id: ob.id.clone(),
                new_id: d.id.clone(),
            });
        }
    }
    for (base, ob) in &observed_by_base {
        if !desired_bases.contains(base) {
            ops.to_remove.push(BlockAttach {
                label: ob.label.clone(),
                id: Some(ob.id.clone()),
            });
        }
    }
    ops
}

fn diff_folders(desired: &DesiredAgent, observed: &Agent) -> FolderOps {
    let observed_by_name: BTreeMap<&str, &crate::domain::resources::Folder> = observed
        .folders
        .iter()
        .map(|f| (f.name.as_str(), f))
        .collect();

    let mut ops = FolderOps::default();
    for df in &desired.folders {
        let file_ops = diff_folder_files(df);
        let attached = observed_by_name.contains_key(df.name.as_str());
        if !attached {
            ops.to_attach.push(FolderRef {
                name: df.name.clone(),
                id: df.id.clone(),
            });
        } else if file_ops.is_empty() {
            ops.unchanged.push(df.name.clone());
        }
        if !file_ops.is_empty() {
            ops.file_ops.push(file_ops);
        }
    }
    for (name, of) in &observed_by_name {
        if !desired.folders.iter().any(|df| df.name == **name) {
            ops.to_detach.push(FolderRef {
                name: (*name).to_string(),
                id: Some(of.id.clone()),
            });
        }
    }
    ops
}

fn diff_folder_files(df: &DesiredFolder) -> FolderFileOps {
    let remote_by_name: BTreeMap<&str, &FolderFile> = df
        .remote_files
        .iter()
        .map(|f| (f.file_name.as_str(), f))
        .collect();

    let mut ops = FolderFileOps {
        folder_name: df.name.clone(),
        folder_id: df.id.clone(),
        files_to_add: Vec::new(),
        files_to_update: Vec::new(),
        files_to_remove: Vec::new(),
    };
    for f in &df.files {
        match remote_by_name.get(f.name.as_str()) {
            None => ops.files_to_add.push(FileUpload {
                name: f.name.clone(),
                path: f.path.clone(),
            }),
            Some(rf) => {
                // a missing remote digest means we cannot prove the file
                // is current, so re-upload
                let current = rf.content_hash.as_deref() == Some(f.content_hash.as_str());
                if !current {
                    ops.files_to_update.push(FileUpload {
                        name: f.name.clone(),
                        path: f.path.clone(),
                    });
                }
            }
        }
    }
    for (name, rf) in &remote_by_name {
        if !df.files.iter().any(|f| f.name == **name) {
            ops.files_to_remove.push(FileRemove {
                name: (*name).to_string(),
                file_id: rf.id.clone(),
            });
        }
    }
    ops
}

fn diff_archives(desired: &DesiredAgent, observed: &Agent) -> ArchiveOps {
    let observed_by_name: BTreeMap<&str, &crate::domain::resources::Archive> = observed
        .archives
        .iter()
        .map(|a| (a.name.as_str(), a))
        .collect();

    let mut ops = ArchiveOps::default();
    for da in &desired.archives {
        match observed_by_name.get(da.name.as_str()) {
            None => ops.to_attach.push(ArchiveRef {
                name: da.name.clone(),
                id: da.id.clone(),
            }),
            Some(oa) => match &da.description {
                Some(want) if oa.description.as_deref() != Some(want.as_str()) => {
                    ops.to_update.push(ArchiveUpdate {
                        id: oa.id.clone(),
                        name: da.name.clone(),
                        description: want.clone(),
                    });
                }
                _ => ops.unchanged.push(da.name.clone()),
            },
        }
    }
    for (name, oa) in &observed_by_name {
        if !desired.archives.iter().any(|da| da.name == **name) {
            ops.to_detach.push(ArchiveRef {
                name: (*name).to_string(),
                id: Some(oa.id.clone()),
            });
        }
    }
    ops
}

// ── Unit tests ───────────────────────────────────────────────────────────────
