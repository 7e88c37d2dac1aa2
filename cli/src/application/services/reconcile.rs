//! Application service — fleet reconciliation and planning.
//!
//! `apply_fleet` drives the full convergence pipeline: a shared-resource
//! pre-pass (tools, MCP servers, shared blocks, folders, archives) that
//! completes before any per-agent work, then a strictly sequential
//! per-agent resolve/diff/apply loop. A failure inside one agent's cycle
//! is caught, warned, and recorded; the remaining agents still run.
//! `plan_fleet` is the read-only variant: same resolution and diffing,
//! no mutation, ids left unset for resources that would be created.

use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result, bail};
use flotilla_common::{AgentLock, LockManifest};
use serde::Serialize;

use crate::application::ports::{
    ArchiveStore, FleetStore, FolderStore, McpStore, NewAgent, NewArchive, NewTool,
    ProgressReporter, ToolStore,
};
use crate::application::services::agent_registry::{AgentRecord, AgentRegistry};
use crate::application::services::applier::{self, ApplyOptions};
use crate::application::services::block_registry::{BlockRecord, BlockRegistry};
use crate::application::services::fleet_loader::{LoadedAgent, LoadedBlock, LoadedFleet};
use crate::domain::diff::{
    DesiredAgent, DesiredArchive, DesiredFile, DesiredFolder, DesiredTool, OperationSet,
    ResolvedBlock, diff,
};
use crate::domain::error::AgentError;
use crate::domain::fingerprint::{agent_config_fingerprint, short_fingerprint};
use crate::domain::resources::{
    Agent, Archive, BlockResolution, Folder, McpServer, Tool, is_builtin_tool,
};
use crate::domain::version::{split_version, versioned_label};

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub force: bool,
    pub new_version: bool,
    /// Restrict the run to these declared agents; empty means all.
    pub agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedAgent {
    pub name: String,
    pub error: String,
}

/// End-of-run summary: three name lists plus the resolved-identity lock.
#[derive(Debug, Serialize)]
pub struct FleetReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedAgent>,
    pub unchanged: Vec<String>,
    #[serde(skip)]
    pub lock: LockManifest,
}

impl FleetReport {
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Shared-resource actions a plan would run before any per-agent work.
#[derive(Debug, Default, Serialize)]
pub struct SharedPlan {
    pub blocks_to_create: Vec<String>,
    pub blocks_to_sync: Vec<String>,
    pub blocks_to_version: Vec<String>,
    pub tools_to_create: Vec<String>,
    pub tools_to_update: Vec<String>,
    pub mcp_servers_to_register: Vec<String>,
    pub folders_to_create: Vec<String>,
    pub archives_to_create: Vec<String>,
}

impl SharedPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks_to_create.is_empty()
            && self.blocks_to_sync.is_empty()
            && self.blocks_to_version.is_empty()
            && self.tools_to_create.is_empty()
            && self.tools_to_update.is_empty()
            && self.mcp_servers_to_register.is_empty()
            && self.folders_to_create.is_empty()
            && self.archives_to_create.is_empty()
    }
}

#[derive(Debug, Serialize)]
pub struct AgentPlan {
    pub name: String,
    pub resolved_name: String,
    /// Remote id, when the agent already exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub create: bool,
    pub config_differs: bool,
    pub operations: OperationSet,
}

#[derive(Debug, Serialize)]
pub struct FleetPlan {
    pub shared: SharedPlan,
    pub agents: Vec<AgentPlan>,
}

impl FleetPlan {
    /// True when applying would change nothing.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.shared.is_empty()
            && self
                .agents
                .iter()
                .all(|a| !a.create && a.operations.is_empty())
    }
}

// ── Apply ─────────────────────────────────────────────────────────────────────

/// Reconcile the fleet: shared pre-pass, then the sequential per-agent
/// loop. Pre-pass failures abort the run (they would cascade to most
/// agents); per-agent failures are caught and recorded.
pub async fn apply_fleet(
    store: &impl FleetStore,
    reporter: &impl ProgressReporter,
    fleet: &LoadedFleet,
    options: &ReconcileOptions,
) -> Result<FleetReport> {
    let targets = filter_agents(fleet, &options.agents)?;

    reporter.step("fetching fleet state...");
    let mut block_registry = BlockRegistry::load_observed(store)
        .await
        .context("listing blocks")?;
    let mut agent_registry = AgentRegistry::load_observed(store)
        .await
        .context("listing agents")?;
    let mut indexes = Indexes::load(store).await?;
    let mut lock = LockManifest::new(fleet.fleet.clone());

    ensure_custom_tools(store, reporter, fleet, &mut indexes, &mut lock).await?;
    ensure_mcp_servers(store, reporter, fleet, &mut indexes, &mut lock).await?;
    materialize_mcp_tools(store, reporter, fleet, &targets, &mut indexes, &mut lock).await;
    let shared_resolutions =
        ensure_shared_blocks(store, reporter, fleet, &mut block_registry, &mut lock).await?;
    ensure_folders(store, reporter, &targets, &mut indexes, &mut lock).await?;
    ensure_archives(store, reporter, &targets, &mut indexes).await?;

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    let mut unchanged = Vec::new();
    for &agent in &targets {
        reporter.step(&format!("reconciling '{}'...", agent.name));
        let converged = converge_agent(
            store,
            reporter,
            fleet,
            agent,
            options,
            &mut block_registry,
            &mut agent_registry,
            &indexes,
            &shared_resolutions,
        )
        .await;
        match converged {
            Ok(outcome) => {
                lock.agents.insert(
                    agent.name.clone(),
                    AgentLock {
                        id: outcome.id,
                        resolved_name: outcome.resolved_name,
                    },
                );
                if outcome.changed {
                    succeeded.push(agent.name.clone());
                } else {
                    unchanged.push(agent.name.clone());
                }
            }
            Err(e) => {
                reporter.warn(&format!("agent '{}': {e}", agent.name));
                failed.push(FailedAgent {
                    name: agent.name.clone(),
                    error: format!("{e}"),
                });
            }
        }
    }

    lock.generated_at = chrono::Utc::now();
    Ok(FleetReport {
        succeeded,
        failed,
        unchanged,
        lock,
    })
}

struct AgentOutcome {
    resolved_name: String,
    id: String,
    changed: bool,
}

#[allow(clippy::too_many_arguments)]
async fn converge_agent(
    store: &impl FleetStore,
    reporter: &impl ProgressReporter,
    fleet: &LoadedFleet,
    agent: &LoadedAgent,
    options: &ReconcileOptions,
    block_registry: &mut BlockRegistry,
    agent_registry: &mut AgentRegistry,
    indexes: &Indexes,
    shared_resolutions: &HashMap<String, BlockResolution>,
) -> Result<AgentOutcome> {
    let fingerprint = agent_config_fingerprint(&agent.system, &tool_pairs(agent, fleet));
    let resolution = agent_registry
        .resolve(store, &agent.name, &fingerprint, options.new_version)
        .await?;

    let observed = if resolution.should_create {
        reporter.step(&format!("creating agent '{}'...", resolution.resolved_name));
        let created = store
            .create_agent(&NewAgent {
                name: resolution.resolved_name.clone(),
                system: agent.system.clone(),
                model: agent.model.clone(),
                embedding: agent.embedding.clone(),
                context_window: agent.context_window,
                reasoning: agent.reasoning,
            })
            .await
            .with_context(|| format!("creating agent '{}'", resolution.resolved_name))?;
        let (_, version) = split_version(&created.name);
        agent_registry.register(
            &agent.name,
            AgentRecord {
                id: created.id.clone(),
                name: created.name.clone(),
                version,
            },
        );
        created
    } else {
        let Some(existing) = resolution.existing else {
            bail!("agent '{}' resolved without an observed state", agent.name);
        };
        existing
    };

    block_registry.register_agent_blocks(&agent.name, &observed);
    let blocks = desired_blocks_apply(
        store,
        fleet,
        agent,
        block_registry,
        shared_resolutions,
    )
    .await?;
    let desired = assemble_desired(
        store,
        fleet,
        agent,
        &resolution.resolved_name,
        blocks,
        indexes,
    )
    .await?;

    let ops = diff(&desired, &observed);
    if ops.is_empty() {
        // a freshly created agent still counts as a change
        return Ok(AgentOutcome {
            resolved_name: resolution.resolved_name,
            id: observed.id,
            changed: resolution.should_create,
        });
    }

    reporter.step(&format!(
        "applying {} operation(s) to '{}'...",
        ops.operation_count(),
        resolution.resolved_name
    ));
    let report = applier::apply(
        store,
        reporter,
        &observed.id,
        &ops,
        ApplyOptions {
            force: options.force,
        },
    )
    .await;
    if !report.failures.is_empty() {
        reporter.warn(&format!(
            "'{}': {} operation(s) failed",
            resolution.resolved_name,
            report.failures.len()
        ));
    }
    Ok(AgentOutcome {
        resolved_name: resolution.resolved_name,
        id: observed.id,
        changed: true,
    })
}

// ── Plan ──────────────────────────────────────────────────────────────────────

/// Read-only preview: resolves every agent and computes its Operation Set
/// without creating or mutating anything. Resources that do not exist yet
/// appear with no id.
pub async fn plan_fleet(
    store: &impl FleetStore,
    reporter: &impl ProgressReporter,
    fleet: &LoadedFleet,
    agent_filter: &[String],
) -> Result<FleetPlan> {
    let targets = filter_agents(fleet, agent_filter)?;

    reporter.step("fetching fleet state...");
    let mut block_registry = BlockRegistry::load_observed(store)
        .await
        .context("listing blocks")?;
    let agent_registry = AgentRegistry::load_observed(store)
        .await
        .context("listing agents")?;
    let indexes = Indexes::load(store).await?;

    let shared = shared_plan(fleet, &targets, &block_registry, &indexes);

    let mut agents = Vec::new();
    for &agent in &targets {
        let fingerprint = agent_config_fingerprint(&agent.system, &tool_pairs(agent, fleet));
        let resolution = agent_registry
            .resolve(store, &agent.name, &fingerprint, false)
            .await?;
        let (observed, id) = match resolution.existing {
            Some(existing) => {
                block_registry.register_agent_blocks(&agent.name, &existing);
                let id = existing.id.clone();
                (existing, Some(id))
            }
            None => (placeholder_agent(agent, &resolution.resolved_name), None),
        };
        let blocks = desired_blocks_plan(fleet, agent, &block_registry);
        let desired = assemble_desired(
            store,
            fleet,
            agent,
            &resolution.resolved_name,
            blocks,
            &indexes,
        )
        .await?;
        agents.push(AgentPlan {
            name: agent.name.clone(),
            resolved_name: resolution.resolved_name,
            id,
            create: resolution.should_create,
            config_differs: resolution.config_differs,
            operations: diff(&desired, &observed),
        });
    }

    Ok(FleetPlan { shared, agents })
}

/// A stand-in observed state for an agent that does not exist yet: the
/// desired scalars (so no spurious field updates) and no attachments (so
/// every attachment shows as an addition).
fn placeholder_agent(agent: &LoadedAgent, resolved_name: &str) -> Agent {
    Agent {
        id: String::new(),
        name: resolved_name.to_string(),
        system: agent.system.clone(),
        model: agent.model.clone(),
        embedding: agent.embedding.clone(),
        context_window: agent.context_window,
        reasoning: agent.reasoning,
        tools: Vec::new(),
        blocks: Vec::new(),
        folders: Vec::new(),
        archives: Vec::new(),
    }
}

fn shared_plan(
    fleet: &LoadedFleet,
    targets: &[&LoadedAgent],
    block_registry: &BlockRegistry,
    indexes: &Indexes,
) -> SharedPlan {
    let mut plan = SharedPlan::default();
    for block in &fleet.shared_blocks {
        match block_registry.plan_shared(block) {
            BlockResolution::Created => plan.blocks_to_create.push(block.name.clone()),
            BlockResolution::SyncValue => plan.blocks_to_sync.push(block.name.clone()),
            BlockResolution::Versioned { .. } => plan.blocks_to_version.push(block.name.clone()),
            BlockResolution::Unchanged => {}
        }
    }
    for tool in &fleet.tools {
        match indexes.tools.get(&tool.name) {
            None => plan.tools_to_create.push(tool.name.clone()),
            Some(existing) => {
                if existing.source_hash().is_some_and(|h| h != tool.source_hash) {
                    plan.tools_to_update.push(tool.name.clone());
                }
            }
        }
    }
    for server in &fleet.mcp_servers {
        if !indexes.mcp_servers.contains_key(&server.name) {
            plan.mcp_servers_to_register.push(server.name.clone());
        }
    }
    for name in referenced_folder_names(targets) {
        if !indexes.folders.contains_key(name) {
            plan.folders_to_create.push(name.to_string());
        }
    }
    for (name, _) in referenced_archives(targets) {
        if !indexes.archives.contains_key(name) {
            plan.archives_to_create.push(name.to_string());
        }
    }
    plan
}

// ── Shared pre-pass ───────────────────────────────────────────────────────────

struct Indexes {
    tools: HashMap<String, Tool>,
    folders: HashMap<String, Folder>,
    archives: HashMap<String, Archive>,
    mcp_servers: HashMap<String, McpServer>,
}

impl Indexes {
    async fn load(store: &impl FleetStore) -> Result<Self> {
        let tools = store
            .list_tools()
            .await
            .context("listing tools")?
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();
        let folders = store
            .list_folders()
            .await
            .context("listing folders")?
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect();
        let archives = store
            .list_archives()
            .await
            .context("listing archives")?
            .into_iter()
            .map(|a| (a.name.clone(), a))
            .collect();
        let mcp_servers = store
            .list_mcp_servers()
            .await
            .context("listing MCP servers")?
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect();
        Ok(Self {
            tools,
            folders,
            archives,
            mcp_servers,
        })
    }
}

async fn ensure_custom_tools(
    store: &impl ToolStore,
    reporter: &impl ProgressReporter,
    fleet: &LoadedFleet,
    indexes: &mut Indexes,
    lock: &mut LockManifest,
) -> Result<()> {
    for tool in &fleet.tools {
        match indexes.tools.get(&tool.name) {
            None => {
                reporter.step(&format!("creating tool '{}'...", tool.name));
                let created = store
                    .create_tool(&NewTool {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        source_code: tool.source_code.clone(),
                    })
                    .await
                    .with_context(|| format!("creating tool '{}'", tool.name))?;
                lock.tools.insert(tool.name.clone(), created.id.clone());
                indexes.tools.insert(tool.name.clone(), created);
            }
            Some(existing) => {
                lock.tools.insert(tool.name.clone(), existing.id.clone());
                if existing.source_hash().is_some_and(|h| h != tool.source_hash) {
                    reporter.step(&format!("updating tool '{}' source...", tool.name));
                    store
                        .update_tool_source(&existing.id, &tool.source_code)
                        .await
                        .with_context(|| format!("updating tool '{}'", tool.name))?;
                    if let Some(entry) = indexes.tools.get_mut(&tool.name) {
                        entry.source_code = Some(tool.source_code.clone());
                    }
                }
            }
        }
    }
    Ok(())
}

async fn ensure_mcp_servers(
    store: &impl McpStore,
    reporter: &impl ProgressReporter,
    fleet: &LoadedFleet,
    indexes: &mut Indexes,
    lock: &mut LockManifest,
) -> Result<()> {
    for binding in &fleet.mcp_servers {
        if let Some(server) = indexes.mcp_servers.get(&binding.name) {
            lock.mcp_servers.insert(binding.name.clone(), server.id.clone());
            continue;
        }
        reporter.step(&format!("registering MCP server '{}'...", binding.name));
        let created = store
            .register_mcp_server(binding)
            .await
            .with_context(|| format!("registering MCP server '{}'", binding.name))?;
        lock.mcp_servers.insert(binding.name.clone(), created.id.clone());
        indexes.mcp_servers.insert(binding.name.clone(), created);
    }
    Ok(())
}

/// Materialize every referenced MCP-provided tool that the store does not
/// yet carry. Best effort: a server that cannot be queried or a tool that
/// cannot be materialized is warned about, and the affected agents record
/// the failure at apply time.
async fn materialize_mcp_tools(
    store: &impl McpStore,
    reporter: &impl ProgressReporter,
    fleet: &LoadedFleet,
    targets: &[&LoadedAgent],
    indexes: &mut Indexes,
    lock: &mut LockManifest,
) {
    if fleet.mcp_servers.is_empty() {
        return;
    }
    let mut providers: HashMap<String, String> = HashMap::new();
    for binding in &fleet.mcp_servers {
        match store.list_mcp_tools(&binding.name).await {
            Ok(tools) => {
                for tool in tools {
                    providers.entry(tool.name).or_insert_with(|| binding.name.clone());
                }
            }
            Err(e) => {
                reporter.warn(&format!(
                    "listing tools for MCP server '{}': {e}",
                    binding.name
                ));
            }
        }
    }

    let custom: BTreeSet<&str> = fleet.tools.iter().map(|t| t.name.as_str()).collect();
    let mut needed: BTreeSet<&str> = BTreeSet::new();
    for agent in targets {
        for name in &agent.tools {
            if is_builtin_tool(name)
                || custom.contains(name.as_str())
                || indexes.tools.contains_key(name)
            {
                continue;
            }
            needed.insert(name);
        }
    }
    for name in needed {
        let Some(server) = providers.get(name) else {
            reporter.warn(&format!("no declared MCP server advertises tool '{name}'"));
            continue;
        };
        reporter.step(&format!("materializing MCP tool '{name}' from '{server}'..."));
        match store.add_mcp_tool(server, name).await {
            Ok(tool) => {
                lock.tools.insert(name.to_string(), tool.id.clone());
                indexes.tools.insert(name.to_string(), tool);
            }
            Err(e) => reporter.warn(&format!("materializing MCP tool '{name}': {e}")),
        }
    }
}

async fn ensure_shared_blocks(
    store: &impl FleetStore,
    reporter: &impl ProgressReporter,
    fleet: &LoadedFleet,
    block_registry: &mut BlockRegistry,
    lock: &mut LockManifest,
) -> Result<HashMap<String, BlockResolution>> {
    let mut resolutions = HashMap::new();
    for block in &fleet.shared_blocks {
        let resolution = block_registry
            .ensure_shared(store, block)
            .await
            .with_context(|| format!("ensuring shared block '{}'", block.name))?;
        match &resolution {
            BlockResolution::Created => {
                reporter.step(&format!("created shared block '{}'", block.name));
            }
            BlockResolution::SyncValue => {
                reporter.step(&format!("synced shared block '{}'", block.name));
            }
            BlockResolution::Versioned { .. } => {
                reporter.step(&format!("versioned shared block '{}'", block.name));
            }
            BlockResolution::Unchanged => {}
        }
        if let Some(record) = block_registry.lookup_shared(&block.name) {
            lock.shared_blocks.insert(block.name.clone(), record.id.clone());
        }
        resolutions.insert(block.name.clone(), resolution);
    }
    Ok(resolutions)
}

fn referenced_folder_names<'a>(targets: &[&'a LoadedAgent]) -> BTreeSet<&'a str> {
    targets
        .iter()
        .flat_map(|a| a.folders.iter().map(|f| f.name.as_str()))
        .collect()
}

/// Archive name plus the first non-empty description any target declares.
fn referenced_archives<'a>(targets: &[&'a LoadedAgent]) -> Vec<(&'a str, Option<&'a str>)> {
    let mut names: Vec<&str> = Vec::new();
    let mut descriptions: HashMap<&str, Option<&str>> = HashMap::new();
    for agent in targets {
        for archive in &agent.archives {
            let entry = descriptions.entry(archive.name.as_str()).or_insert_with(|| {
                names.push(archive.name.as_str());
                None
            });
            if entry.is_none() {
                *entry = archive.description.as_deref();
            }
        }
    }
    names.sort_unstable();
    names
        .into_iter()
        .map(|n| (n, descriptions.get(n).copied().flatten()))
        .collect()
}

async fn ensure_folders(
    store: &impl FolderStore,
    reporter: &impl ProgressReporter,
    targets: &[&LoadedAgent],
    indexes: &mut Indexes,
    lock: &mut LockManifest,
) -> Result<()> {
    for name in referenced_folder_names(targets) {
        if !indexes.folders.contains_key(name) {
            reporter.step(&format!("creating folder '{name}'..."));
            let created = store
                .create_folder(name)
                .await
                .with_context(|| format!("creating folder '{name}'"))?;
            indexes.folders.insert(name.to_string(), created);
        }
        if let Some(folder) = indexes.folders.get(name) {
            lock.folders.insert(name.to_string(), folder.id.clone());
        }
    }
    Ok(())
}

async fn ensure_archives(
    store: &impl ArchiveStore,
    reporter: &impl ProgressReporter,
    targets: &[&LoadedAgent],
    indexes: &mut Indexes,
) -> Result<()> {
    for (name, description) in referenced_archives(targets) {
        if indexes.archives.contains_key(name) {
            continue;
        }
        reporter.step(&format!("creating archive '{name}'..."));
        let created = store
            .create_archive(&NewArchive {
                name: name.to_string(),
                description: description.map(String::from),
            })
            .await
            .with_context(|| format!("creating archive '{name}'"))?;
        indexes.archives.insert(name.to_string(), created);
    }
    Ok(())
}

// ── Desired-state assembly ────────────────────────────────────────────────────

fn filter_agents<'a>(fleet: &'a LoadedFleet, filter: &[String]) -> Result<Vec<&'a LoadedAgent>> {
    if filter.is_empty() {
        return Ok(fleet.agents.iter().collect());
    }
    let mut picked = Vec::new();
    for name in filter {
        let agent = fleet
            .agents
            .iter()
            .find(|a| a.name == *name)
            .ok_or_else(|| AgentError::NotDeclared(name.clone()))?;
        picked.push(agent);
    }
    Ok(picked)
}

/// `(tool name, source hash)` pairs for the configuration fingerprint:
/// custom tools carry their source hash, builtin and MCP tools none.
fn tool_pairs(agent: &LoadedAgent, fleet: &LoadedFleet) -> Vec<(String, Option<String>)> {
    agent
        .tools
        .iter()
        .map(|name| {
            let source_hash = fleet
                .tools
                .iter()
                .find(|t| t.name == *name)
                .map(|t| t.source_hash.clone());
            (name.clone(), source_hash)
        })
        .collect()
}

async fn assemble_desired(
    store: &impl FolderStore,
    fleet: &LoadedFleet,
    agent: &LoadedAgent,
    resolved_name: &str,
    blocks: Vec<ResolvedBlock>,
    indexes: &Indexes,
) -> Result<DesiredAgent> {
    Ok(DesiredAgent {
        name: resolved_name.to_string(),
        system: agent.system.clone(),
        model: agent.model.clone(),
        embedding: agent.embedding.clone(),
        context_window: agent.context_window,
        reasoning: agent.reasoning,
        tools: desired_tools(fleet, agent, indexes),
        blocks,
        folders: desired_folders(store, agent, indexes).await?,
        archives: agent
            .archives
            .iter()
            .map(|a| DesiredArchive {
                id: indexes.archives.get(&a.name).map(|ar| ar.id.clone()),
                name: a.name.clone(),
                description: a.description.clone(),
            })
            .collect(),
    })
}

fn desired_tools(fleet: &LoadedFleet, agent: &LoadedAgent, indexes: &Indexes) -> Vec<DesiredTool> {
    agent
        .tools
        .iter()
        .map(|name| {
            let loaded = fleet.tools.iter().find(|t| t.name == *name);
            DesiredTool {
                name: name.clone(),
                id: indexes.tools.get(name).map(|t| t.id.clone()),
                source_hash: loaded.map(|t| t.source_hash.clone()),
                source_code: loaded.map(|t| t.source_code.clone()),
            }
        })
        .collect()
}

/// Folder file listings are fetched fresh here rather than from the
/// startup index: an earlier agent's apply may have changed them.
async fn desired_folders(
    store: &impl FolderStore,
    agent: &LoadedAgent,
    indexes: &Indexes,
) -> Result<Vec<DesiredFolder>> {
    let mut folders = Vec::new();
    for loaded in &agent.folders {
        let (id, remote_files) = match indexes.folders.get(&loaded.name) {
            Some(folder) => {
                let files = store
                    .list_folder_files(&folder.id)
                    .await
                    .with_context(|| format!("listing files in folder '{}'", loaded.name))?;
                (Some(folder.id.clone()), files)
            }
            None => (None, Vec::new()),
        };
        folders.push(DesiredFolder {
            id,
            name: loaded.name.clone(),
            files: loaded
                .files
                .iter()
                .map(|f| DesiredFile {
                    name: f.name.clone(),
                    path: f.path.clone(),
                    content_hash: f.content_hash.clone(),
                })
                .collect(),
            remote_files,
        });
    }
    Ok(folders)
}

async fn desired_blocks_apply(
    store: &impl FleetStore,
    fleet: &LoadedFleet,
    agent: &LoadedAgent,
    block_registry: &mut BlockRegistry,
    shared_resolutions: &HashMap<String, BlockResolution>,
) -> Result<Vec<ResolvedBlock>> {
    let mut blocks = Vec::new();
    for config in &agent.blocks {
        let (record, resolution) = block_registry
            .ensure_agent_scoped(store, &agent.name, config)
            .await
            .with_context(|| format!("ensuring block '{}'", config.name))?;
        blocks.push(ResolvedBlock {
            id: Some(record.id),
            label: record.label,
            value: config.value.clone(),
            limit: config.limit,
            resolution,
        });
    }
    for reference in &agent.shared_block_refs {
        let Some(record) = block_registry.lookup_shared(reference) else {
            bail!("shared block '{reference}' was not resolved during the pre-pass");
        };
        let Some(config) = fleet.shared_blocks.iter().find(|b| b.name == *reference) else {
            bail!("shared block '{reference}' is not declared in the manifest");
        };
        // content convergence already happened in the pre-pass; only a
        // version swap still needs per-agent work
        let resolution = match shared_resolutions.get(reference) {
            Some(BlockResolution::Versioned { superseded_id }) => BlockResolution::Versioned {
                superseded_id: superseded_id.clone(),
            },
            _ => BlockResolution::Unchanged,
        };
        blocks.push(ResolvedBlock {
            id: Some(record.id.clone()),
            label: record.label.clone(),
            value: config.value.clone(),
            limit: config.limit,
            resolution,
        });
    }
    Ok(blocks)
}

fn desired_blocks_plan(
    fleet: &LoadedFleet,
    agent: &LoadedAgent,
    block_registry: &BlockRegistry,
) -> Vec<ResolvedBlock> {
    let mut blocks = Vec::new();
    for config in &agent.blocks {
        let resolution = block_registry.plan_agent_scoped(&agent.name, config);
        let existing = block_registry.lookup_agent_scoped(&agent.name, &config.name);
        blocks.push(planned_block(config, resolution, existing));
    }
    for reference in &agent.shared_block_refs {
        let Some(config) = fleet.shared_blocks.iter().find(|b| b.name == *reference) else {
            continue;
        };
        let resolution = match block_registry.plan_shared(config) {
            // the pre-pass would sync content globally; per-agent this is
            // not an operation
            BlockResolution::SyncValue => BlockResolution::Unchanged,
            other => other,
        };
        let existing = block_registry.lookup_shared(reference);
        blocks.push(planned_block(config, resolution, existing));
    }
    blocks
}

fn planned_block(
    config: &LoadedBlock,
    resolution: BlockResolution,
    existing: Option<&BlockRecord>,
) -> ResolvedBlock {
    let (id, label) = match &resolution {
        BlockResolution::Created => (None, config.name.clone()),
        BlockResolution::Versioned { .. } => (
            None,
            versioned_label(&config.name, &short_fingerprint(&config.value)),
        ),
        BlockResolution::SyncValue | BlockResolution::Unchanged => match existing {
            Some(record) => (Some(record.id.clone()), record.label.clone()),
            None => (None, config.name.clone()),
        },
    };
    ResolvedBlock {
        id,
        label,
        value: config.value.clone(),
        limit: config.limit,
        resolution,
    }
}
