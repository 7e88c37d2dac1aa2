//! Remote resource types, as observed from the store.
//!
//! These map one-to-one onto the store's JSON bodies; serde derives do the
//! wire translation in `infra::http` with no intermediate DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::fingerprint;

/// Tools every store agent can attach without a source definition.
pub const BUILTIN_TOOLS: &[&str] = &[
    "send_message",
    "conversation_search",
    "archival_memory_insert",
    "archival_memory_search",
    "core_memory_append",
    "core_memory_replace",
    "web_search",
    "run_code",
];

/// True iff the tool ships with the store and is never created, deleted,
/// or source-diffed — only attached and detached.
#[must_use]
pub fn is_builtin_tool(name: &str) -> bool {
    BUILTIN_TOOLS.contains(&name)
}

/// A remote agent with its attachment collections expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub embedding: Option<String>,
    #[serde(default)]
    pub context_window: u32,
    #[serde(default)]
    pub reasoning: bool,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub archives: Vec<Archive>,
}

/// One row of the store's agent list; attachments are not expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A memory block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub value: String,
}

impl Block {
    /// Fingerprint of the block's current content.
    #[must_use]
    pub fn content_hash(&self) -> String {
        fingerprint::fingerprint(&self.value)
    }
}

/// A tool; custom tools carry their source, builtin and MCP tools do not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_code: Option<String>,
}

impl Tool {
    /// Fingerprint of the tool's source, when it has one.
    #[must_use]
    pub fn source_hash(&self) -> Option<String> {
        self.source_code.as_deref().map(fingerprint::fingerprint)
    }
}

/// A knowledge folder with its current file listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub files: Vec<FolderFile>,
}

/// One file inside a folder. The store records a content digest at upload
/// time; older files may predate that and report `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderFile {
    pub id: String,
    pub file_name: String,
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// A searchable archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archive {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A registered MCP server binding on the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServer {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// A tool advertised by an MCP server, not yet materialized as a store
/// tool (so no id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// The store's asynchronous message-processing job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Run lifecycle: `created → running → {completed | failed | cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// True once the run can no longer change state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// How the block registry resolved a desired block against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockResolution {
    /// Exists with identical content; nothing to do.
    Unchanged,
    /// Created remotely during this run.
    Created,
    /// Mutable block whose content drifted; the applier syncs the value
    /// in place.
    SyncValue,
    /// Immutable block superseded by a new content-addressed version;
    /// agents still holding the old id need a swap.
    Versioned { superseded_id: String },
}
