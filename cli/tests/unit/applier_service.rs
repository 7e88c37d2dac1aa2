//! Applier tests: force gating, per-item failure isolation, and the
//! detach-before-attach ordering of block version swaps.

use flotilla_cli::application::services::applier::{ApplyOptions, apply};
use flotilla_cli::domain::diff::{
    BlockAttach, BlockSwap, BlockValueSync, FieldUpdate, FileRemove, FileUpload, FolderFileOps,
    FolderRef, OperationSet, ToolRef, ToolUpdate,
};

use crate::mocks::{MockStore, RecordingReporter, StoreState, bare_agent, block, tool};

fn store_with_agent() -> MockStore {
    let mut state = StoreState::default();
    state.agents.push(bare_agent("agent-1", "triage"));
    MockStore::new(state)
}

#[tokio::test]
async fn empty_set_short_circuits_before_any_remote_call() {
    let store = store_with_agent();
    let reporter = RecordingReporter::default();

    let report = apply(
        &store,
        &reporter,
        "agent-1",
        &OperationSet::default(),
        ApplyOptions::default(),
    )
    .await;

    assert_eq!(report.applied, 0);
    assert!(report.failures.is_empty());
    assert!(store.calls().is_empty(), "got: {:?}", store.calls());
}

#[tokio::test]
async fn additive_operations_run_without_force() {
    let store = store_with_agent();
    store
        .state
        .lock()
        .expect("lock")
        .tools
        .push(tool("tool-1", "web_search"));
    store
        .state
        .lock()
        .expect("lock")
        .blocks
        .push(block("block-1", "persona", "Terse."));
    let reporter = RecordingReporter::default();

    let mut ops = OperationSet::default();
    ops.tools.to_add.push(ToolRef {
        name: "web_search".into(),
        id: Some("tool-1".into()),
    });
    ops.blocks.to_add.push(BlockAttach {
        label: "persona".into(),
        id: Some("block-1".into()),
    });

    let report = apply(&store, &reporter, "agent-1", &ops, ApplyOptions::default()).await;

    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped_destructive, 0);
    assert!(report.failures.is_empty());
    assert_eq!(store.calls_matching("attach_tool").len(), 1);
    assert_eq!(store.calls_matching("attach_block").len(), 1);
}

#[tokio::test]
async fn subtractive_operations_are_gated_without_force() {
    let store = store_with_agent();
    let reporter = RecordingReporter::default();

    let mut ops = OperationSet::default();
    ops.tools.to_remove.push(ToolRef {
        name: "old_tool".into(),
        id: Some("tool-9".into()),
    });
    ops.blocks.to_remove.push(BlockAttach {
        label: "stale".into(),
        id: Some("block-9".into()),
    });
    ops.folders.to_detach.push(FolderRef {
        name: "old-docs".into(),
        id: Some("folder-9".into()),
    });
    ops.archives.to_detach.push(
        flotilla_cli::domain::diff::ArchiveRef {
            name: "old-archive".into(),
            id: Some("archive-9".into()),
        },
    );
    ops.folders.file_ops.push(FolderFileOps {
        folder_name: "docs".into(),
        folder_id: Some("folder-1".into()),
        files_to_add: Vec::new(),
        files_to_update: Vec::new(),
        files_to_remove: vec![FileRemove {
            name: "stale.md".into(),
            file_id: "file-9".into(),
        }],
    });

    let report = apply(&store, &reporter, "agent-1", &ops, ApplyOptions { force: false }).await;

    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped_destructive, 5);
    assert!(store.calls_matching("detach_").is_empty());
    assert!(store.calls_matching("delete_").is_empty());
    assert!(
        reporter
            .warnings()
            .iter()
            .any(|w| w.contains("5 destructive operation(s) skipped")),
        "got: {:?}",
        reporter.warnings()
    );
}

#[tokio::test]
async fn force_executes_subtractive_operations() {
    let store = store_with_agent();
    let reporter = RecordingReporter::default();

    let mut ops = OperationSet::default();
    ops.tools.to_remove.push(ToolRef {
        name: "old_tool".into(),
        id: Some("tool-9".into()),
    });
    ops.blocks.to_remove.push(BlockAttach {
        label: "stale".into(),
        id: Some("block-9".into()),
    });

    let report = apply(&store, &reporter, "agent-1", &ops, ApplyOptions { force: true }).await;

    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped_destructive, 0);
    assert_eq!(store.calls_matching("detach_tool").len(), 1);
    assert_eq!(store.calls_matching("detach_block").len(), 1);
}

#[tokio::test]
async fn one_item_failure_never_stops_its_siblings() {
    let store = store_with_agent();
    {
        let mut state = store.state.lock().expect("lock");
        state.tools.push(tool("tool-1", "web_search"));
        state.tools.push(tool("tool-2", "run_code"));
    }
    store.inject_failure("attach_tool agent-1 tool-1");
    let reporter = RecordingReporter::default();

    let mut ops = OperationSet::default();
    ops.tools.to_add.push(ToolRef {
        name: "web_search".into(),
        id: Some("tool-1".into()),
    });
    ops.tools.to_add.push(ToolRef {
        name: "run_code".into(),
        id: Some("tool-2".into()),
    });

    let report = apply(&store, &reporter, "agent-1", &ops, ApplyOptions::default()).await;

    assert_eq!(report.applied, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].contains("web_search"), "got: {:?}", report.failures);
    // the sibling attach still ran
    assert_eq!(store.calls_matching("attach_tool").len(), 2);
}

#[tokio::test]
async fn unresolved_id_is_an_item_failure_not_a_panic() {
    let store = store_with_agent();
    let reporter = RecordingReporter::default();

    let mut ops = OperationSet::default();
    ops.blocks.to_add.push(BlockAttach {
        label: "persona".into(),
        id: None,
    });

    let report = apply(&store, &reporter, "agent-1", &ops, ApplyOptions::default()).await;

    assert_eq!(report.applied, 0);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].contains("no resolved id"));
    assert!(store.calls_matching("attach_block").is_empty());
}

#[tokio::test]
async fn block_swap_detaches_the_old_id_before_attaching_the_new() {
    let store = store_with_agent();
    {
        let mut state = store.state.lock().expect("lock");
        let old = block("block-old", "shared_rules", "v1");
        state.blocks.push(old.clone());
        state.blocks.push(block("block-new", "shared_rules__9f2ab1c4", "v2"));
        state.agents[0].blocks.push(old);
    }
    let reporter = RecordingReporter::default();

    let mut ops = OperationSet::default();
    ops.blocks.to_update.push(BlockSwap {
        label: "shared_rules__9f2ab1c4".into(),
        old_id: "block-old".into(),
        new_id: Some("block-new".into()),
    });

    let report = apply(&store, &reporter, "agent-1", &ops, ApplyOptions::default()).await;

    assert_eq!(report.applied, 1);
    let calls = store.calls();
    let detach = calls
        .iter()
        .position(|c| c == "detach_block agent-1 block-old")
        .expect("detach recorded");
    let attach = calls
        .iter()
        .position(|c| c == "attach_block agent-1 block-new")
        .expect("attach recorded");
    assert!(detach < attach, "swap must detach first, got: {calls:?}");
}

#[tokio::test]
async fn value_sync_updates_in_place() {
    let store = store_with_agent();
    store
        .state
        .lock()
        .expect("lock")
        .blocks
        .push(block("block-1", "persona", "old"));
    let reporter = RecordingReporter::default();

    let mut ops = OperationSet::default();
    ops.blocks.to_update_value.push(BlockValueSync {
        label: "persona".into(),
        id: Some("block-1".into()),
        value: "new".into(),
    });

    let report = apply(&store, &reporter, "agent-1", &ops, ApplyOptions::default()).await;

    assert_eq!(report.applied, 1);
    assert_eq!(store.calls_matching("update_block_value").len(), 1);
    let state = store.state.lock().expect("lock");
    assert_eq!(state.blocks[0].value, "new");
}

#[tokio::test]
async fn field_updates_collapse_into_a_single_patch_call() {
    let store = store_with_agent();
    let reporter = RecordingReporter::default();

    let ops = OperationSet {
        field_updates: vec![
            FieldUpdate::System {
                from: "You help.".into(),
                to: "You triage.".into(),
            },
            FieldUpdate::ContextWindow {
                from: 32_000,
                to: 16_000,
            },
        ],
        ..OperationSet::default()
    };

    let report = apply(&store, &reporter, "agent-1", &ops, ApplyOptions::default()).await;

    assert_eq!(report.applied, 2);
    assert_eq!(store.calls_matching("update_agent").len(), 1);
    let state = store.state.lock().expect("lock");
    assert_eq!(state.agents[0].system, "You triage.");
    assert_eq!(state.agents[0].context_window, 16_000);
}

#[tokio::test]
async fn tool_source_update_runs_without_force() {
    let store = store_with_agent();
    store
        .state
        .lock()
        .expect("lock")
        .tools
        .push(tool("tool-1", "summarize"));
    let reporter = RecordingReporter::default();

    let mut ops = OperationSet::default();
    ops.tools.to_update.push(ToolUpdate {
        id: "tool-1".into(),
        name: "summarize".into(),
        reason: "source changed (aaaaaaaa → bbbbbbbb)".into(),
        source_code: "def summarize(): ...".into(),
    });

    let report = apply(&store, &reporter, "agent-1", &ops, ApplyOptions::default()).await;

    assert_eq!(report.applied, 1);
    assert_eq!(store.calls_matching("update_tool_source").len(), 1);
}

#[tokio::test]
async fn file_uploads_trigger_a_single_open_file_close() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path_a = dir.path().join("a.md");
    let path_b = dir.path().join("b.md");
    std::fs::write(&path_a, "alpha").expect("write");
    std::fs::write(&path_b, "beta").expect("write");

    let store = store_with_agent();
    let reporter = RecordingReporter::default();

    let mut ops = OperationSet::default();
    ops.folders.file_ops.push(FolderFileOps {
        folder_name: "docs".into(),
        folder_id: Some("folder-1".into()),
        files_to_add: vec![FileUpload {
            name: "a.md".into(),
            path: path_a,
        }],
        files_to_update: vec![FileUpload {
            name: "b.md".into(),
            path: path_b,
        }],
        files_to_remove: Vec::new(),
    });

    let report = apply(&store, &reporter, "agent-1", &ops, ApplyOptions::default()).await;

    assert_eq!(report.applied, 2);
    assert_eq!(store.calls_matching("upload_folder_file").len(), 2);
    assert_eq!(
        store.calls_matching("close_open_files").len(),
        1,
        "exactly one close after all file mutations"
    );
}

#[tokio::test]
async fn no_file_mutation_means_no_open_file_close() {
    let store = store_with_agent();
    store
        .state
        .lock()
        .expect("lock")
        .folders
        .push(flotilla_cli::domain::resources::Folder {
            id: "folder-1".into(),
            name: "docs".into(),
            files: Vec::new(),
        });
    let reporter = RecordingReporter::default();

    let mut ops = OperationSet::default();
    ops.folders.to_attach.push(FolderRef {
        name: "docs".into(),
        id: Some("folder-1".into()),
    });

    let report = apply(&store, &reporter, "agent-1", &ops, ApplyOptions::default()).await;

    assert_eq!(report.applied, 1);
    assert!(store.calls_matching("close_open_files").is_empty());
}
