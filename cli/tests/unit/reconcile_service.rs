//! End-to-end reconciliation tests against the mock store: the shared
//! pre-pass, per-agent convergence, idempotence, and read-only planning.

use flotilla_cli::application::ports::McpServerBinding;
use flotilla_cli::application::services::fleet_loader::{
    LoadedAgent, LoadedArchive, LoadedBlock, LoadedFile, LoadedFleet, LoadedFolder, LoadedTool,
};
use flotilla_cli::application::services::reconcile::{ReconcileOptions, apply_fleet, plan_fleet};
use flotilla_cli::domain::fingerprint::fingerprint;
use flotilla_cli::domain::resources::McpTool;

use crate::mocks::{MockStore, RecordingReporter, StoreState, bare_agent, tool};

fn loaded_agent(name: &str) -> LoadedAgent {
    LoadedAgent {
        name: name.to_string(),
        system: "You triage support tickets.".to_string(),
        model: "openai/gpt-4o".to_string(),
        embedding: None,
        context_window: 32_000,
        reasoning: false,
        tools: Vec::new(),
        blocks: Vec::new(),
        shared_block_refs: Vec::new(),
        folders: Vec::new(),
        archives: Vec::new(),
    }
}

fn empty_fleet() -> LoadedFleet {
    LoadedFleet {
        fleet: Some("support".to_string()),
        shared_blocks: Vec::new(),
        tools: Vec::new(),
        mcp_servers: Vec::new(),
        agents: Vec::new(),
    }
}

/// A fleet exercising every resource category, with one agent.
fn full_fleet(handbook_path: &std::path::Path, handbook_body: &str) -> LoadedFleet {
    let source = "def summarize(doc): ...".to_string();
    let mut agent = loaded_agent("alpha");
    agent.tools = vec!["summarize".to_string(), "send_message".to_string()];
    agent.blocks = vec![LoadedBlock {
        name: "persona".to_string(),
        description: None,
        limit: 4000,
        value: "Terse and direct.".to_string(),
        mutable: true,
    }];
    agent.shared_block_refs = vec!["shared_guidelines".to_string()];
    agent.folders = vec![LoadedFolder {
        name: "docs".to_string(),
        files: vec![LoadedFile {
            name: "handbook.md".to_string(),
            path: handbook_path.to_path_buf(),
            content_hash: fingerprint(handbook_body),
        }],
    }];
    agent.archives = vec![LoadedArchive {
        name: "research".to_string(),
        description: Some("Long-term findings".to_string()),
    }];

    LoadedFleet {
        fleet: Some("support".to_string()),
        shared_blocks: vec![LoadedBlock {
            name: "shared_guidelines".to_string(),
            description: Some("House style".to_string()),
            limit: 8000,
            value: "Be helpful.".to_string(),
            mutable: true,
        }],
        tools: vec![LoadedTool {
            name: "summarize".to_string(),
            description: None,
            source_hash: fingerprint(&source),
            source_code: source,
        }],
        mcp_servers: Vec::new(),
        agents: vec![agent],
    }
}

fn store_with_builtins() -> MockStore {
    let mut state = StoreState::default();
    state.tools.push(tool("tool-builtin-1", "send_message"));
    MockStore::new(state)
}

#[tokio::test]
async fn apply_creates_the_whole_fleet_from_scratch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let handbook = dir.path().join("handbook.md");
    std::fs::write(&handbook, "# Handbook").expect("write");

    let store = store_with_builtins();
    let reporter = RecordingReporter::default();
    let fleet = full_fleet(&handbook, "# Handbook");

    let report = apply_fleet(&store, &reporter, &fleet, &ReconcileOptions::default())
        .await
        .expect("applies");

    assert!(report.success(), "failed: {:?}", report.failed);
    assert_eq!(report.succeeded, vec!["alpha"]);
    assert!(report.unchanged.is_empty());

    // the lock records every resolved identity
    assert_eq!(report.lock.agents["alpha"].resolved_name, "alpha");
    assert!(report.lock.shared_blocks.contains_key("shared_guidelines"));
    assert!(report.lock.tools.contains_key("summarize"));
    assert!(report.lock.folders.contains_key("docs"));

    let state = store.state.lock().expect("lock");
    let agent = state.agents.iter().find(|a| a.name == "alpha").expect("created");
    let tool_names: Vec<&str> = agent.tools.iter().map(|t| t.name.as_str()).collect();
    assert!(tool_names.contains(&"summarize"));
    assert!(tool_names.contains(&"send_message"));
    let block_labels: Vec<&str> = agent.blocks.iter().map(|b| b.label.as_str()).collect();
    assert!(block_labels.contains(&"persona"));
    assert!(block_labels.contains(&"shared_guidelines"));
    assert_eq!(agent.folders.len(), 1);
    assert_eq!(agent.archives.len(), 1);
    let folder_id = &state.folders[0].id;
    assert_eq!(state.folder_files[folder_id].len(), 1);
}

#[tokio::test]
async fn a_converged_fleet_plans_to_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let handbook = dir.path().join("handbook.md");
    std::fs::write(&handbook, "# Handbook").expect("write");

    let store = store_with_builtins();
    let reporter = RecordingReporter::default();
    let fleet = full_fleet(&handbook, "# Handbook");

    apply_fleet(&store, &reporter, &fleet, &ReconcileOptions::default())
        .await
        .expect("applies");

    let plan = plan_fleet(&store, &reporter, &fleet, &[])
        .await
        .expect("plans");

    assert!(
        plan.is_converged(),
        "expected convergence, got shared: {:?}, ops: {}",
        plan.shared,
        plan.agents[0].operations.operation_count()
    );
}

#[tokio::test]
async fn a_second_apply_reports_the_agent_unchanged() {
    let store = store_with_builtins();
    let reporter = RecordingReporter::default();
    let mut fleet = empty_fleet();
    fleet.agents.push(loaded_agent("alpha"));

    apply_fleet(&store, &reporter, &fleet, &ReconcileOptions::default())
        .await
        .expect("first apply");
    let second = apply_fleet(&store, &reporter, &fleet, &ReconcileOptions::default())
        .await
        .expect("second apply");

    assert!(second.succeeded.is_empty());
    assert_eq!(second.unchanged, vec!["alpha"]);
    assert_eq!(store.state.lock().expect("lock").agents.len(), 1);
}

#[tokio::test]
async fn one_failing_agent_never_stops_the_others() {
    let store = MockStore::default();
    store.inject_failure("create_agent beta");
    let reporter = RecordingReporter::default();
    let mut fleet = empty_fleet();
    fleet.agents.push(loaded_agent("alpha"));
    fleet.agents.push(loaded_agent("beta"));
    fleet.agents.push(loaded_agent("gamma"));

    let report = apply_fleet(&store, &reporter, &fleet, &ReconcileOptions::default())
        .await
        .expect("applies");

    assert!(!report.success());
    assert_eq!(report.succeeded, vec!["alpha", "gamma"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "beta");
    assert!(report.failed[0].error.contains("creating agent 'beta'"));
    // the failed agent never makes it into the lock
    assert!(!report.lock.agents.contains_key("beta"));
    assert!(report.lock.agents.contains_key("gamma"));
}

#[tokio::test]
async fn plan_makes_no_mutating_calls() {
    let store = MockStore::default();
    let reporter = RecordingReporter::default();
    let mut fleet = empty_fleet();
    fleet.shared_blocks.push(LoadedBlock {
        name: "shared_guidelines".to_string(),
        description: None,
        limit: 8000,
        value: "Be helpful.".to_string(),
        mutable: true,
    });
    let mut agent = loaded_agent("alpha");
    agent.shared_block_refs = vec!["shared_guidelines".to_string()];
    fleet.agents.push(agent);

    let plan = plan_fleet(&store, &reporter, &fleet, &[])
        .await
        .expect("plans");

    assert!(
        store.mutating_calls().is_empty(),
        "plan mutated the store: {:?}",
        store.mutating_calls()
    );
    assert!(!plan.is_converged());
    assert_eq!(plan.shared.blocks_to_create, vec!["shared_guidelines"]);
    assert!(plan.agents[0].create);
    assert!(plan.agents[0].id.is_none());
    // the would-be shared attachment shows up with no id yet
    assert_eq!(plan.agents[0].operations.blocks.to_add.len(), 1);
    assert!(plan.agents[0].operations.blocks.to_add[0].id.is_none());
}

#[tokio::test]
async fn new_version_mints_a_successor_instead_of_converging() {
    let mut state = StoreState::default();
    // existing alpha with a different system prompt than desired
    state.agents.push(bare_agent("agent-1", "alpha"));
    let store = MockStore::new(state);
    let reporter = RecordingReporter::default();
    let mut fleet = empty_fleet();
    fleet.agents.push(loaded_agent("alpha"));

    let options = ReconcileOptions {
        new_version: true,
        ..ReconcileOptions::default()
    };
    let report = apply_fleet(&store, &reporter, &fleet, &options)
        .await
        .expect("applies");

    assert!(report.success());
    assert_eq!(report.lock.agents["alpha"].resolved_name, "alpha__v2");
    let state = store.state.lock().expect("lock");
    assert_eq!(state.agents.len(), 2, "the old version survives");
    assert!(state.agents.iter().any(|a| a.name == "alpha__v2"));
}

#[tokio::test]
async fn mcp_tools_are_materialized_for_referencing_agents() {
    let mut state = StoreState::default();
    state
        .mcp_tools
        .insert("git-tools".to_string(), vec![McpTool {
            name: "list_issues".to_string(),
            description: None,
        }]);
    let store = MockStore::new(state);
    let reporter = RecordingReporter::default();

    let mut fleet = empty_fleet();
    fleet.mcp_servers = vec![McpServerBinding {
        name: "git-tools".to_string(),
        url: "https://mcp.example.dev/git".to_string(),
        token: None,
    }];
    let mut agent = loaded_agent("alpha");
    agent.tools = vec!["list_issues".to_string()];
    fleet.agents.push(agent);

    let report = apply_fleet(&store, &reporter, &fleet, &ReconcileOptions::default())
        .await
        .expect("applies");

    assert!(report.success(), "failed: {:?}", report.failed);
    assert_eq!(store.calls_matching("register_mcp_server git-tools").len(), 1);
    assert_eq!(store.calls_matching("add_mcp_tool git-tools list_issues").len(), 1);
    let state = store.state.lock().expect("lock");
    let agent = state.agents.iter().find(|a| a.name == "alpha").expect("created");
    assert!(agent.tools.iter().any(|t| t.name == "list_issues"));
    assert!(report.lock.mcp_servers.contains_key("git-tools"));
    assert!(report.lock.tools.contains_key("list_issues"));
}

#[tokio::test]
async fn an_undeclared_agent_filter_is_an_error() {
    let store = MockStore::default();
    let reporter = RecordingReporter::default();
    let mut fleet = empty_fleet();
    fleet.agents.push(loaded_agent("alpha"));

    let err = plan_fleet(&store, &reporter, &fleet, &["ghost".to_string()])
        .await
        .expect_err("undeclared");
    assert!(err.to_string().contains("not declared in the manifest"), "got: {err}");
}

#[tokio::test]
async fn the_agent_filter_restricts_the_run() {
    let store = MockStore::default();
    let reporter = RecordingReporter::default();
    let mut fleet = empty_fleet();
    fleet.agents.push(loaded_agent("alpha"));
    fleet.agents.push(loaded_agent("beta"));

    let options = ReconcileOptions {
        agents: vec!["beta".to_string()],
        ..ReconcileOptions::default()
    };
    let report = apply_fleet(&store, &reporter, &fleet, &options)
        .await
        .expect("applies");

    assert_eq!(report.succeeded, vec!["beta"]);
    let state = store.state.lock().expect("lock");
    assert_eq!(state.agents.len(), 1);
    assert_eq!(state.agents[0].name, "beta");
}
