//! Infrastructure implementation of the resource store ports.
//!
//! One `HttpFleetStore` implements every store trait over the store's
//! REST API. Request and response bodies map directly onto the domain
//! resource types via serde; there are no intermediate DTOs. Non-2xx
//! responses become `StoreError::Api` carrying the status and any
//! server-supplied message; a 404 becomes `StoreError::NotFound` so
//! callers can branch without string matching.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::application::ports::{
    AgentPatch, AgentStore, ArchiveStore, BlockStore, FolderStore, McpServerBinding, McpStore,
    NewAgent, NewArchive, NewBlock, NewTool, RunStore, ToolStore,
};
use crate::domain::error::StoreError;
use crate::domain::resources::{
    Agent, AgentSummary, Archive, Block, Folder, FolderFile, McpServer, McpTool, Run, Tool,
};

/// Per-request timeout. Covers folder file uploads, which are the largest
/// payloads the CLI ever sends.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the resource store. Cheap to clone: `reqwest::Client`
/// is an `Arc` around its connection pool.
#[derive(Clone)]
pub struct HttpFleetStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFleetStore {
    /// Build a client for the store at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    /// Send a prepared request and map the response status. `what` names
    /// the resource for error messages ("agent agent-123", "blocks").
    async fn execute(
        &self,
        builder: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("store request for {what}"))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(what.to_string()).into());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        }
        .into())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let response = self.execute(self.request(Method::GET, path), what).await?;
        response
            .json()
            .await
            .with_context(|| format!("decoding store response for {what}"))
    }

    async fn send_json<T, B>(&self, method: Method, path: &str, body: &B, what: &str) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .execute(self.request(method, path).json(body), what)
            .await?;
        response
            .json()
            .await
            .with_context(|| format!("decoding store response for {what}"))
    }

    async fn send_unit<B>(&self, method: Method, path: &str, body: &B, what: &str) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.execute(self.request(method, path).json(body), what)
            .await?;
        Ok(())
    }

    async fn send_bare(&self, method: Method, path: &str, what: &str) -> Result<()> {
        self.execute(self.request(method, path), what).await?;
        Ok(())
    }
}

/// Pull a human-readable message out of an error body. The store wraps
/// errors as `{"detail": ...}` or `{"message": ...}`; fall back to the
/// raw body, truncated.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "detail", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    if body.is_empty() {
        "no response body".to_string()
    } else {
        body.chars().take(200).collect()
    }
}

// ── AgentStore ────────────────────────────────────────────────────────────────

impl AgentStore for HttpFleetStore {
    async fn list_agents(&self) -> Result<Vec<AgentSummary>> {
        self.get_json("/v1/agents", "agents").await
    }

    async fn get_agent(&self, agent_id: &str) -> Result<Agent> {
        self.get_json(&format!("/v1/agents/{agent_id}"), &format!("agent {agent_id}"))
            .await
    }

    async fn create_agent(&self, new: &NewAgent) -> Result<Agent> {
        self.send_json(Method::POST, "/v1/agents", new, &format!("agent '{}'", new.name))
            .await
    }

    async fn update_agent(&self, agent_id: &str, patch: &AgentPatch) -> Result<()> {
        self.send_unit(
            Method::PATCH,
            &format!("/v1/agents/{agent_id}"),
            patch,
            &format!("agent {agent_id}"),
        )
        .await
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        self.send_bare(
            Method::DELETE,
            &format!("/v1/agents/{agent_id}"),
            &format!("agent {agent_id}"),
        )
        .await
    }

    async fn attach_tool(&self, agent_id: &str, tool_id: &str) -> Result<()> {
        self.send_bare(
            Method::PATCH,
            &format!("/v1/agents/{agent_id}/tools/attach/{tool_id}"),
            &format!("tool {tool_id}"),
        )
        .await
    }

    async fn detach_tool(&self, agent_id: &str, tool_id: &str) -> Result<()> {
        self.send_bare(
            Method::PATCH,
            &format!("/v1/agents/{agent_id}/tools/detach/{tool_id}"),
            &format!("tool {tool_id}"),
        )
        .await
    }

    async fn attach_block(&self, agent_id: &str, block_id: &str) -> Result<()> {
        self.send_bare(
            Method::PATCH,
            &format!("/v1/agents/{agent_id}/core-memory/blocks/attach/{block_id}"),
            &format!("block {block_id}"),
        )
        .await
    }

    async fn detach_block(&self, agent_id: &str, block_id: &str) -> Result<()> {
        self.send_bare(
            Method::PATCH,
            &format!("/v1/agents/{agent_id}/core-memory/blocks/detach/{block_id}"),
            &format!("block {block_id}"),
        )
        .await
    }

    async fn attach_folder(&self, agent_id: &str, folder_id: &str) -> Result<()> {
        self.send_bare(
            Method::PATCH,
            &format!("/v1/agents/{agent_id}/folders/attach/{folder_id}"),
            &format!("folder {folder_id}"),
        )
        .await
    }

    async fn detach_folder(&self, agent_id: &str, folder_id: &str) -> Result<()> {
        self.send_bare(
            Method::PATCH,
            &format!("/v1/agents/{agent_id}/folders/detach/{folder_id}"),
            &format!("folder {folder_id}"),
        )
        .await
    }

    async fn attach_archive(&self, agent_id: &str, archive_id: &str) -> Result<()> {
        self.send_bare(
            Method::PATCH,
            &format!("/v1/agents/{agent_id}/archives/attach/{archive_id}"),
            &format!("archive {archive_id}"),
        )
        .await
    }

    async fn detach_archive(&self, agent_id: &str, archive_id: &str) -> Result<()> {
        self.send_bare(
            Method::PATCH,
            &format!("/v1/agents/{agent_id}/archives/detach/{archive_id}"),
            &format!("archive {archive_id}"),
        )
        .await
    }

    async fn close_open_files(&self, agent_id: &str) -> Result<()> {
        self.send_bare(
            Method::PATCH,
            &format!("/v1/agents/{agent_id}/files/close-all"),
            &format!("agent {agent_id}"),
        )
        .await
    }
}

// ── BlockStore ────────────────────────────────────────────────────────────────

impl BlockStore for HttpFleetStore {
    async fn list_blocks(&self) -> Result<Vec<Block>> {
        self.get_json("/v1/blocks", "blocks").await
    }

    async fn create_block(&self, new: &NewBlock) -> Result<Block> {
        self.send_json(Method::POST, "/v1/blocks", new, &format!("block '{}'", new.label))
            .await
    }

    async fn update_block_value(&self, block_id: &str, value: &str) -> Result<()> {
        self.send_unit(
            Method::PATCH,
            &format!("/v1/blocks/{block_id}"),
            &json!({ "value": value }),
            &format!("block {block_id}"),
        )
        .await
    }

    async fn delete_block(&self, block_id: &str) -> Result<()> {
        self.send_bare(
            Method::DELETE,
            &format!("/v1/blocks/{block_id}"),
            &format!("block {block_id}"),
        )
        .await
    }

    async fn agents_for_block(&self, block_id: &str) -> Result<Vec<AgentSummary>> {
        self.get_json(
            &format!("/v1/blocks/{block_id}/agents"),
            &format!("block {block_id}"),
        )
        .await
    }
}

// ── ToolStore ─────────────────────────────────────────────────────────────────

impl ToolStore for HttpFleetStore {
    async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.get_json("/v1/tools", "tools").await
    }

    async fn create_tool(&self, new: &NewTool) -> Result<Tool> {
        self.send_json(Method::POST, "/v1/tools", new, &format!("tool '{}'", new.name))
            .await
    }

    async fn update_tool_source(&self, tool_id: &str, source_code: &str) -> Result<()> {
        self.send_unit(
            Method::PATCH,
            &format!("/v1/tools/{tool_id}"),
            &json!({ "source_code": source_code }),
            &format!("tool {tool_id}"),
        )
        .await
    }

    async fn delete_tool(&self, tool_id: &str) -> Result<()> {
        self.send_bare(
            Method::DELETE,
            &format!("/v1/tools/{tool_id}"),
            &format!("tool {tool_id}"),
        )
        .await
    }
}

// ── FolderStore ───────────────────────────────────────────────────────────────

impl FolderStore for HttpFleetStore {
    async fn list_folders(&self) -> Result<Vec<Folder>> {
        self.get_json("/v1/folders", "folders").await
    }

    async fn create_folder(&self, name: &str) -> Result<Folder> {
        self.send_json(
            Method::POST,
            "/v1/folders",
            &json!({ "name": name }),
            &format!("folder '{name}'"),
        )
        .await
    }

    async fn delete_folder(&self, folder_id: &str) -> Result<()> {
        self.send_bare(
            Method::DELETE,
            &format!("/v1/folders/{folder_id}"),
            &format!("folder {folder_id}"),
        )
        .await
    }

    async fn list_folder_files(&self, folder_id: &str) -> Result<Vec<FolderFile>> {
        self.get_json(
            &format!("/v1/folders/{folder_id}/files"),
            &format!("folder {folder_id}"),
        )
        .await
    }

    async fn upload_folder_file(
        &self,
        folder_id: &str,
        local_path: &Path,
        file_name: &str,
    ) -> Result<()> {
        let bytes = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("reading {}", local_path.display()))?;
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        self.execute(
            self.request(Method::POST, &format!("/v1/folders/{folder_id}/upload"))
                .multipart(form),
            &format!("folder {folder_id}"),
        )
        .await?;
        Ok(())
    }

    async fn delete_folder_file(&self, folder_id: &str, file_id: &str) -> Result<()> {
        self.send_bare(
            Method::DELETE,
            &format!("/v1/folders/{folder_id}/files/{file_id}"),
            &format!("file {file_id}"),
        )
        .await
    }
}

// ── ArchiveStore ──────────────────────────────────────────────────────────────

impl ArchiveStore for HttpFleetStore {
    async fn list_archives(&self) -> Result<Vec<Archive>> {
        self.get_json("/v1/archives", "archives").await
    }

    async fn create_archive(&self, new: &NewArchive) -> Result<Archive> {
        self.send_json(
            Method::POST,
            "/v1/archives",
            new,
            &format!("archive '{}'", new.name),
        )
        .await
    }

    async fn update_archive(&self, archive_id: &str, description: &str) -> Result<()> {
        self.send_unit(
            Method::PATCH,
            &format!("/v1/archives/{archive_id}"),
            &json!({ "description": description }),
            &format!("archive {archive_id}"),
        )
        .await
    }
}

// ── McpStore ──────────────────────────────────────────────────────────────────

impl McpStore for HttpFleetStore {
    async fn list_mcp_servers(&self) -> Result<Vec<McpServer>> {
        self.get_json("/v1/mcp/servers", "MCP servers").await
    }

    async fn register_mcp_server(&self, binding: &McpServerBinding) -> Result<McpServer> {
        self.send_json(
            Method::POST,
            "/v1/mcp/servers",
            binding,
            &format!("MCP server '{}'", binding.name),
        )
        .await
    }

    async fn list_mcp_tools(&self, server_name: &str) -> Result<Vec<McpTool>> {
        self.get_json(
            &format!("/v1/mcp/servers/{server_name}/tools"),
            &format!("MCP server '{server_name}'"),
        )
        .await
    }

    async fn add_mcp_tool(&self, server_name: &str, tool_name: &str) -> Result<Tool> {
        let response = self
            .execute(
                self.request(
                    Method::POST,
                    &format!("/v1/mcp/servers/{server_name}/{tool_name}"),
                ),
                &format!("MCP tool '{tool_name}'"),
            )
            .await?;
        response
            .json()
            .await
            .with_context(|| format!("decoding store response for MCP tool '{tool_name}'"))
    }
}

// ── RunStore ──────────────────────────────────────────────────────────────────

impl RunStore for HttpFleetStore {
    async fn create_run(&self, agent_id: &str, message: &str) -> Result<Run> {
        self.send_json(
            Method::POST,
            &format!("/v1/agents/{agent_id}/messages/async"),
            &json!({ "messages": [{ "role": "user", "content": message }] }),
            &format!("agent {agent_id}"),
        )
        .await
    }

    async fn get_run(&self, run_id: &str) -> Result<Run> {
        self.get_json(&format!("/v1/runs/{run_id}"), &format!("run {run_id}"))
            .await
    }
}
