//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use flotilla_common::LockManifest;
use serde::Serialize;

use crate::domain::config::FlotillaConfig;
use crate::domain::resources::{
    Agent, AgentSummary, Archive, Block, Folder, FolderFile, McpServer, McpTool, Run, Tool,
};

// ── Value Types ───────────────────────────────────────────────────────────────
//
// Serialize derives double as the wire encoding: the HTTP store client
// posts these bodies as-is. `None` fields are omitted, never sent as null.

/// Creation parameters for a new agent. Attachments are not part of
/// creation: a fresh agent starts bare and converges through the same
/// diff/apply path as an existing one.
#[derive(Debug, Clone, Serialize)]
pub struct NewAgent {
    pub name: String,
    pub system: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<String>,
    pub context_window: u32,
    pub reasoning: bool,
}

/// Scalar-field updates for an existing agent. `None` fields are left
/// untouched by the store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<bool>,
}

impl AgentPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.system.is_none()
            && self.model.is_none()
            && self.embedding.is_none()
            && self.context_window.is_none()
            && self.reasoning.is_none()
    }
}

/// Creation parameters for a memory block.
#[derive(Debug, Clone, Serialize)]
pub struct NewBlock {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub limit: u32,
    pub value: String,
}

/// Creation parameters for a custom tool.
#[derive(Debug, Clone, Serialize)]
pub struct NewTool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source_code: String,
}

/// Creation parameters for an archive.
#[derive(Debug, Clone, Serialize)]
pub struct NewArchive {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Registration parameters for an MCP server. `token` is the resolved
/// bearer token, not the environment variable name.
#[derive(Debug, Clone, Serialize)]
pub struct McpServerBinding {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

// ── Resource Store Ports ──────────────────────────────────────────────────────

/// Agent CRUD plus the attach/detach join operations.
#[allow(async_fn_in_trait)]
pub trait AgentStore {
    /// List all agents (summary view, no attachments).
    async fn list_agents(&self) -> Result<Vec<AgentSummary>>;
    /// Fetch one agent with its full attachment graph.
    async fn get_agent(&self, agent_id: &str) -> Result<Agent>;
    /// Create a bare agent.
    async fn create_agent(&self, new: &NewAgent) -> Result<Agent>;
    /// Patch scalar fields on an existing agent.
    async fn update_agent(&self, agent_id: &str, patch: &AgentPatch) -> Result<()>;
    /// Delete an agent.
    async fn delete_agent(&self, agent_id: &str) -> Result<()>;
    async fn attach_tool(&self, agent_id: &str, tool_id: &str) -> Result<()>;
    async fn detach_tool(&self, agent_id: &str, tool_id: &str) -> Result<()>;
    async fn attach_block(&self, agent_id: &str, block_id: &str) -> Result<()>;
    async fn detach_block(&self, agent_id: &str, block_id: &str) -> Result<()>;
    async fn attach_folder(&self, agent_id: &str, folder_id: &str) -> Result<()>;
    async fn detach_folder(&self, agent_id: &str, folder_id: &str) -> Result<()>;
    async fn attach_archive(&self, agent_id: &str, archive_id: &str) -> Result<()>;
    async fn detach_archive(&self, agent_id: &str, archive_id: &str) -> Result<()>;
    /// Close every file the agent currently holds open (context-window
    /// hygiene after folder file mutations).
    async fn close_open_files(&self, agent_id: &str) -> Result<()>;
}

/// Memory-block CRUD plus reverse attachment lookup.
#[allow(async_fn_in_trait)]
pub trait BlockStore {
    async fn list_blocks(&self) -> Result<Vec<Block>>;
    async fn create_block(&self, new: &NewBlock) -> Result<Block>;
    /// Sync a block's value in place.
    async fn update_block_value(&self, block_id: &str, value: &str) -> Result<()>;
    async fn delete_block(&self, block_id: &str) -> Result<()>;
    /// Agents currently holding this block attached.
    async fn agents_for_block(&self, block_id: &str) -> Result<Vec<AgentSummary>>;
}

/// Tool CRUD.
#[allow(async_fn_in_trait)]
pub trait ToolStore {
    async fn list_tools(&self) -> Result<Vec<Tool>>;
    async fn create_tool(&self, new: &NewTool) -> Result<Tool>;
    /// Replace a custom tool's source in place.
    async fn update_tool_source(&self, tool_id: &str, source_code: &str) -> Result<()>;
    async fn delete_tool(&self, tool_id: &str) -> Result<()>;
}

/// Folder CRUD plus file-granular operations.
#[allow(async_fn_in_trait)]
pub trait FolderStore {
    async fn list_folders(&self) -> Result<Vec<Folder>>;
    async fn create_folder(&self, name: &str) -> Result<Folder>;
    async fn delete_folder(&self, folder_id: &str) -> Result<()>;
    /// Current file listing for a folder (global state, not per-agent).
    async fn list_folder_files(&self, folder_id: &str) -> Result<Vec<FolderFile>>;
    /// Multipart upload; the store replaces a same-named file.
    async fn upload_folder_file(
        &self,
        folder_id: &str,
        local_path: &Path,
        file_name: &str,
    ) -> Result<()>;
    async fn delete_folder_file(&self, folder_id: &str, file_id: &str) -> Result<()>;
}

/// Archive CRUD. The store exposes no archive deletion route.
#[allow(async_fn_in_trait)]
pub trait ArchiveStore {
    async fn list_archives(&self) -> Result<Vec<Archive>>;
    async fn create_archive(&self, new: &NewArchive) -> Result<Archive>;
    async fn update_archive(&self, archive_id: &str, description: &str) -> Result<()>;
}

/// MCP server registration and tool materialization.
#[allow(async_fn_in_trait)]
pub trait McpStore {
    async fn list_mcp_servers(&self) -> Result<Vec<McpServer>>;
    async fn register_mcp_server(&self, binding: &McpServerBinding) -> Result<McpServer>;
    /// Tools advertised by a registered server.
    async fn list_mcp_tools(&self, server_name: &str) -> Result<Vec<McpTool>>;
    /// Materialize one advertised MCP tool as a store tool.
    async fn add_mcp_tool(&self, server_name: &str, tool_name: &str) -> Result<Tool>;
}

/// The asynchronous message-run abstraction.
#[allow(async_fn_in_trait)]
pub trait RunStore {
    /// Enqueue a message for asynchronous processing; returns the run
    /// handle immediately.
    async fn create_run(&self, agent_id: &str, message: &str) -> Result<Run>;
    /// Poll a run's current status.
    async fn get_run(&self, run_id: &str) -> Result<Run>;
}

/// Composite trait — any type implementing every resource port is a `FleetStore`.
pub trait FleetStore:
    AgentStore + BlockStore + ToolStore + FolderStore + ArchiveStore + McpStore + RunStore
{
}

/// Blanket implementation: any type implementing every resource port is a `FleetStore`.
impl<T> FleetStore for T where
    T: AgentStore + BlockStore + ToolStore + FolderStore + ArchiveStore + McpStore + RunStore
{
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Local Filesystem Port ─────────────────────────────────────────────────────

/// Abstracts local file reads so the fleet loader can be tested without
/// touching a real filesystem. Sync trait — manifest-adjacent files are
/// small and read once per invocation.
pub trait LocalFs {
    fn exists(&self, path: &Path) -> bool;
    /// Read a UTF-8 text file (prompts, block values, tool sources).
    fn read_to_string(&self, path: &Path) -> Result<String>;
    /// Read raw bytes (folder files, for fingerprinting).
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
}

// ── Configuration and Artifact Ports ──────────────────────────────────────────

/// Abstracts local configuration persistence (load/save).
#[allow(async_fn_in_trait)]
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults if no file exists.
    async fn load_async(&self) -> Result<FlotillaConfig>;
    /// Persist the given configuration.
    async fn save_async(&self, config: &FlotillaConfig) -> Result<()>;
    /// The on-disk location this store reads and writes.
    fn path(&self) -> PathBuf;
}

/// Abstracts lock manifest persistence. Writes must be atomic
/// (temp-file-plus-rename) so a crashed run never leaves a torn artifact.
#[allow(async_fn_in_trait)]
pub trait LockfileStore {
    /// Write the lock manifest to `path`.
    async fn save_async(&self, path: &Path, lock: &LockManifest) -> Result<()>;
}
