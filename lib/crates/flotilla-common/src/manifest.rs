use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_block_limit() -> u32 {
    5000
}

fn default_context_window() -> u32 {
    32_000
}

/// Fleet manifest (`fleet.yaml`): the desired state of a whole fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetManifest {
    /// Optional fleet label, recorded in the lock manifest.
    #[serde(default)]
    pub fleet: Option<String>,
    /// Fleet-owned blocks attachable by any agent via `shared_blocks`
    /// references. Names must carry the `shared_` prefix.
    #[serde(default)]
    pub shared_blocks: Vec<BlockSpec>,
    /// Custom tool definitions backed by local source files.
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub mcp_servers: Vec<McpServerSpec>,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

impl FleetManifest {
    /// Look up a declared agent by name.
    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.name == name)
    }
}

/// One desired agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    /// Inline system prompt; mutually exclusive with `system_prompt_file`.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Path to a system prompt file, relative to the manifest.
    #[serde(default)]
    pub system_prompt_file: Option<String>,
    pub model: String,
    /// Embedding model; the store's default applies when absent.
    #[serde(default)]
    pub embedding: Option<String>,
    #[serde(default = "default_context_window")]
    pub context_window: u32,
    #[serde(default)]
    pub reasoning: bool,
    /// Tool names: builtin, defined under top-level `tools:`, or provided
    /// by a declared MCP server.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Agent-scoped memory blocks.
    #[serde(default)]
    pub blocks: Vec<BlockSpec>,
    /// References to top-level `shared_blocks` entries by name.
    #[serde(default)]
    pub shared_blocks: Vec<String>,
    #[serde(default)]
    pub folders: Vec<FolderSpec>,
    #[serde(default)]
    pub archives: Vec<ArchiveSpec>,
}

/// A memory block, either agent-scoped or fleet-shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Maximum content length enforced by the store.
    #[serde(default = "default_block_limit")]
    pub limit: u32,
    /// Inline content; mutually exclusive with `value_file`.
    #[serde(default)]
    pub value: Option<String>,
    /// Path to a content file, relative to the manifest.
    #[serde(default)]
    pub value_file: Option<String>,
    /// Mutable blocks sync in place on content change; immutable blocks
    /// are superseded by a content-addressed versioned copy.
    #[serde(default = "default_true")]
    pub mutable: bool,
}

/// A custom tool backed by a local source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Path to the tool's source, relative to the manifest.
    pub source_file: String,
}

/// An MCP server whose tools agents may reference by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerSpec {
    pub name: String,
    pub url: String,
    /// Environment variable holding the server's bearer token.
    #[serde(default)]
    pub token_env: Option<String>,
}

/// A knowledge folder: a named set of local files mirrored to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderSpec {
    pub name: String,
    /// File paths relative to the manifest; the remote file name is the
    /// path's final component.
    #[serde(default)]
    pub files: Vec<String>,
}

/// A searchable archive attachable per agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}
