//! Block and agent registry tests: the mutability policy, versioned-name
//! resolution, and observed-state loading.

use flotilla_cli::application::services::agent_registry::{AgentRegistry, find_agent};
use flotilla_cli::application::services::block_registry::{BlockRecord, BlockRegistry};
use flotilla_cli::application::services::fleet_loader::LoadedBlock;
use flotilla_cli::domain::fingerprint::{agent_config_fingerprint, fingerprint, short_fingerprint};
use flotilla_cli::domain::resources::BlockResolution;

use crate::mocks::{MockStore, StoreState, bare_agent, block};

fn loaded(name: &str, value: &str, mutable: bool) -> LoadedBlock {
    LoadedBlock {
        name: name.to_string(),
        description: None,
        limit: 5000,
        value: value.to_string(),
        mutable,
    }
}

fn record(id: &str, label: &str, value: &str, shared: bool) -> BlockRecord {
    BlockRecord {
        id: id.to_string(),
        label: label.to_string(),
        content_hash: fingerprint(value),
        shared,
    }
}

// ── The mutability policy ─────────────────────────────────────────────────────

#[test]
fn absent_block_resolves_to_created() {
    let resolution = BlockRegistry::decide(None, &fingerprint("v"), true);
    assert_eq!(resolution, BlockResolution::Created);
}

#[test]
fn identical_content_resolves_to_unchanged() {
    let existing = record("b1", "persona", "v", false);
    let resolution = BlockRegistry::decide(Some(&existing), &fingerprint("v"), false);
    assert_eq!(resolution, BlockResolution::Unchanged);
}

#[test]
fn mutable_drift_resolves_to_sync() {
    let existing = record("b1", "persona", "old", false);
    let resolution = BlockRegistry::decide(Some(&existing), &fingerprint("new"), true);
    assert_eq!(resolution, BlockResolution::SyncValue);
}

#[test]
fn immutable_drift_resolves_to_a_new_version() {
    let existing = record("b1", "shared_rules", "old", true);
    let resolution = BlockRegistry::decide(Some(&existing), &fingerprint("new"), false);
    assert_eq!(
        resolution,
        BlockResolution::Versioned {
            superseded_id: "b1".to_string()
        }
    );
}

// ── Loading observed state ────────────────────────────────────────────────────

#[tokio::test]
async fn load_observed_registers_shared_blocks_under_their_base() {
    let mut state = StoreState::default();
    state.blocks.push(block("b1", "shared_rules", "v1"));
    state.blocks.push(block("b2", "shared_rules__9f2ab1c4", "v2"));
    state.blocks.push(block("b3", "persona", "agent stuff"));
    let store = MockStore::new(state);

    let registry = BlockRegistry::load_observed(&store).await.expect("loads");

    // the versioned copy comes later in creation order and wins
    let active = registry.lookup_shared("shared_rules").expect("registered");
    assert_eq!(active.id, "b2");
    assert_eq!(active.label, "shared_rules__9f2ab1c4");
    // non-shared labels never enter the shared namespace
    assert!(registry.lookup_shared("persona").is_none());
}

#[tokio::test]
async fn agent_scoped_entries_never_collide_across_agents() {
    let store = MockStore::default();
    let mut registry = BlockRegistry::load_observed(&store).await.expect("loads");

    let mut triage = bare_agent("agent-1", "triage");
    triage.blocks.push(block("b1", "persona", "terse"));
    triage.blocks.push(block("b2", "shared_rules", "house style"));
    let mut scout = bare_agent("agent-2", "scout");
    scout.blocks.push(block("b3", "persona", "verbose"));

    registry.register_agent_blocks("triage", &triage);
    registry.register_agent_blocks("scout", &scout);

    let triage_persona = registry
        .lookup_agent_scoped("triage", "persona")
        .expect("registered");
    let scout_persona = registry
        .lookup_agent_scoped("scout", "persona")
        .expect("registered");
    assert_eq!(triage_persona.id, "b1");
    assert_eq!(scout_persona.id, "b3");
    // shared labels are skipped at agent scope
    assert!(registry.lookup_agent_scoped("triage", "shared_rules").is_none());
}

// ── Shared convergence ────────────────────────────────────────────────────────

#[tokio::test]
async fn ensure_shared_creates_missing_blocks_once() {
    let store = MockStore::default();
    let mut registry = BlockRegistry::load_observed(&store).await.expect("loads");
    let config = loaded("shared_rules", "Be helpful.", true);

    let first = registry.ensure_shared(&store, &config).await.expect("first");
    assert_eq!(first, BlockResolution::Created);
    assert_eq!(store.calls_matching("create_block").len(), 1);

    // a second pass with identical content touches nothing
    let second = registry.ensure_shared(&store, &config).await.expect("second");
    assert_eq!(second, BlockResolution::Unchanged);
    assert_eq!(store.calls_matching("create_block").len(), 1);
    assert!(store.calls_matching("update_block_value").is_empty());
}

#[tokio::test]
async fn ensure_shared_syncs_mutable_drift_in_place() {
    let mut state = StoreState::default();
    state.blocks.push(block("b1", "shared_rules", "old"));
    let store = MockStore::new(state);
    let mut registry = BlockRegistry::load_observed(&store).await.expect("loads");

    let resolution = registry
        .ensure_shared(&store, &loaded("shared_rules", "new", true))
        .await
        .expect("syncs");

    assert_eq!(resolution, BlockResolution::SyncValue);
    assert_eq!(store.calls_matching("update_block_value b1").len(), 1);
    assert!(store.calls_matching("create_block").is_empty());
    // the registry now reflects the synced content
    let record = registry.lookup_shared("shared_rules").expect("present");
    assert_eq!(record.content_hash, fingerprint("new"));
}

#[tokio::test]
async fn ensure_shared_versions_immutable_drift_with_a_content_token() {
    let mut state = StoreState::default();
    state.blocks.push(block("b1", "shared_rules", "old"));
    let store = MockStore::new(state);
    let mut registry = BlockRegistry::load_observed(&store).await.expect("loads");

    let resolution = registry
        .ensure_shared(&store, &loaded("shared_rules", "new", false))
        .await
        .expect("versions");

    assert_eq!(
        resolution,
        BlockResolution::Versioned {
            superseded_id: "b1".to_string()
        }
    );
    let expected_label = format!("shared_rules__{}", short_fingerprint("new"));
    assert_eq!(
        store.calls_matching("create_block").len(),
        1,
        "got: {:?}",
        store.calls()
    );
    assert!(store.calls().contains(&format!("create_block {expected_label}")));
    // the registry re-points to the superseding copy
    let record = registry.lookup_shared("shared_rules").expect("present");
    assert_eq!(record.label, expected_label);
    assert_ne!(record.id, "b1");
}

#[tokio::test]
async fn ensure_agent_scoped_defers_sync_to_the_applier() {
    let store = MockStore::default();
    let mut registry = BlockRegistry::load_observed(&store).await.expect("loads");
    let mut observed = bare_agent("agent-1", "triage");
    observed.blocks.push(block("b1", "persona", "old"));
    registry.register_agent_blocks("triage", &observed);

    let (record, resolution) = registry
        .ensure_agent_scoped(&store, "triage", &loaded("persona", "new", true))
        .await
        .expect("resolves");

    assert_eq!(resolution, BlockResolution::SyncValue);
    assert_eq!(record.id, "b1");
    // unlike the shared pre-pass, no remote mutation happens here
    assert!(store.calls_matching("update_block_value").is_empty());
}

// ── Agent registry ────────────────────────────────────────────────────────────

#[tokio::test]
async fn load_observed_keeps_the_highest_version_per_base() {
    let mut state = StoreState::default();
    state.agents.push(bare_agent("agent-1", "triage"));
    state.agents.push(bare_agent("agent-3", "triage__v3"));
    state.agents.push(bare_agent("agent-2", "triage__v2"));
    let store = MockStore::new(state);

    let registry = AgentRegistry::load_observed(&store).await.expect("loads");

    let active = registry.get("triage").expect("registered");
    assert_eq!(active.id, "agent-3");
    assert_eq!(active.version, 3);
}

#[tokio::test]
async fn resolve_creates_the_base_name_when_absent() {
    let store = MockStore::default();
    let registry = AgentRegistry::load_observed(&store).await.expect("loads");

    let resolution = registry
        .resolve(&store, "triage", "any-fingerprint", false)
        .await
        .expect("resolves");

    assert!(resolution.should_create);
    assert_eq!(resolution.resolved_name, "triage");
    assert!(resolution.existing.is_none());
}

#[tokio::test]
async fn resolve_reuses_an_agent_whose_fingerprint_matches() {
    let mut state = StoreState::default();
    state.agents.push(bare_agent("agent-1", "triage"));
    let store = MockStore::new(state);
    let registry = AgentRegistry::load_observed(&store).await.expect("loads");

    // bare_agent has system "You help." and no tools
    let matching = agent_config_fingerprint("You help.", &[]);
    let resolution = registry
        .resolve(&store, "triage", &matching, true)
        .await
        .expect("resolves");

    assert!(!resolution.should_create, "no pointless new version");
    assert!(!resolution.config_differs);
    assert_eq!(resolution.resolved_name, "triage");
}

#[tokio::test]
async fn resolve_mints_the_next_version_on_drift_under_new_version() {
    let mut state = StoreState::default();
    state.agents.push(bare_agent("agent-1", "triage"));
    let store = MockStore::new(state);
    let registry = AgentRegistry::load_observed(&store).await.expect("loads");

    let drifted = agent_config_fingerprint("You do something else.", &[]);
    let resolution = registry
        .resolve(&store, "triage", &drifted, true)
        .await
        .expect("resolves");

    assert!(resolution.should_create);
    assert!(resolution.config_differs);
    assert_eq!(resolution.resolved_name, "triage__v2");
    assert!(resolution.existing.is_some());
}

#[tokio::test]
async fn resolve_converges_in_place_on_drift_without_new_version() {
    let mut state = StoreState::default();
    state.agents.push(bare_agent("agent-1", "triage"));
    let store = MockStore::new(state);
    let registry = AgentRegistry::load_observed(&store).await.expect("loads");

    let drifted = agent_config_fingerprint("You do something else.", &[]);
    let resolution = registry
        .resolve(&store, "triage", &drifted, false)
        .await
        .expect("resolves");

    assert!(!resolution.should_create);
    assert!(resolution.config_differs);
    assert_eq!(resolution.resolved_name, "triage");
}

#[tokio::test]
async fn find_agent_matches_an_explicit_version_exactly() {
    let mut state = StoreState::default();
    state.agents.push(bare_agent("agent-1", "triage"));
    state.agents.push(bare_agent("agent-2", "triage__v2"));
    let store = MockStore::new(state);

    let found = find_agent(&store, "triage__v2").await.expect("found");
    assert_eq!(found.id, "agent-2");

    let missing = find_agent(&store, "triage__v9").await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn find_agent_resolves_a_base_name_to_its_highest_version() {
    let mut state = StoreState::default();
    state.agents.push(bare_agent("agent-1", "triage"));
    state.agents.push(bare_agent("agent-3", "triage__v3"));
    state.agents.push(bare_agent("agent-2", "triage__v2"));
    let store = MockStore::new(state);

    let found = find_agent(&store, "triage").await.expect("found");
    assert_eq!(found.id, "agent-3");
    assert_eq!(found.version, 3);
}

#[tokio::test]
async fn find_agent_reports_unknown_names() {
    let store = MockStore::default();
    let err = find_agent(&store, "ghost").await.expect_err("errors");
    assert!(err.to_string().contains("'ghost' not found"), "got: {err}");
}
