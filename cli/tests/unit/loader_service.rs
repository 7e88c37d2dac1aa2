//! Fleet loader tests over an in-memory filesystem: file resolution,
//! fingerprinting, and collected validation failures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use flotilla_cli::application::ports::LocalFs;
use flotilla_cli::application::services::fleet_loader::load_fleet;
use flotilla_cli::domain::fingerprint::fingerprint;

#[derive(Default)]
struct MapFs {
    files: HashMap<PathBuf, String>,
}

impl MapFs {
    fn with(mut self, path: &str, content: &str) -> Self {
        self.files.insert(PathBuf::from(path), content.to_string());
        self
    }
}

impl LocalFs for MapFs {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.read_to_string(path).map(String::into_bytes)
    }
}

const MANIFEST: &str = "/fleet/fleet.yaml";

#[test]
fn missing_manifest_is_a_dedicated_error() {
    let fs = MapFs::default();
    let err = load_fleet(&fs, Path::new(MANIFEST)).expect_err("missing");
    assert!(
        err.to_string().contains("Fleet manifest not found"),
        "got: {err}"
    );
}

#[test]
fn unparseable_yaml_is_a_parse_error() {
    let fs = MapFs::default().with(MANIFEST, "agents: [not: {valid");
    let err = load_fleet(&fs, Path::new(MANIFEST)).expect_err("bad yaml");
    assert!(
        err.to_string().contains("failed to parse fleet manifest"),
        "got: {err}"
    );
}

#[test]
fn happy_path_resolves_files_and_fingerprints() {
    let fs = MapFs::default()
        .with(
            MANIFEST,
            r"
fleet: support
shared_blocks:
  - name: shared_guidelines
    value: Be helpful.
    mutable: false
tools:
  - name: summarize
    source_file: tools/summarize.py
agents:
  - name: triage
    system_prompt_file: prompts/triage.md
    model: openai/gpt-4o
    tools: [summarize, web_search]
    blocks:
      - name: persona
        value_file: blocks/persona.md
    shared_blocks: [shared_guidelines]
    folders:
      - name: docs
        files: [docs/handbook.md]
    archives:
      - name: research
        description: Long-term findings
",
        )
        .with("/fleet/prompts/triage.md", "You triage support tickets.")
        .with("/fleet/blocks/persona.md", "Terse and direct.")
        .with("/fleet/tools/summarize.py", "def summarize(): ...")
        .with("/fleet/docs/handbook.md", "# Handbook");

    let fleet = load_fleet(&fs, Path::new(MANIFEST)).expect("loads");

    assert_eq!(fleet.fleet.as_deref(), Some("support"));
    assert_eq!(fleet.shared_blocks.len(), 1);
    assert!(!fleet.shared_blocks[0].mutable);

    let tool = &fleet.tools[0];
    assert_eq!(tool.source_code, "def summarize(): ...");
    assert_eq!(tool.source_hash, fingerprint("def summarize(): ..."));

    let agent = &fleet.agents[0];
    assert_eq!(agent.system, "You triage support tickets.");
    assert_eq!(agent.blocks[0].value, "Terse and direct.");
    assert_eq!(agent.shared_block_refs, vec!["shared_guidelines"]);

    let file = &agent.folders[0].files[0];
    assert_eq!(file.name, "handbook.md");
    assert_eq!(file.path, PathBuf::from("/fleet/docs/handbook.md"));
    assert_eq!(file.content_hash, fingerprint("# Handbook"));

    assert_eq!(agent.archives[0].name, "research");
}

#[test]
fn inline_values_win_and_need_no_files() {
    let fs = MapFs::default().with(
        MANIFEST,
        r"
agents:
  - name: solo
    system_prompt: Hi.
    model: openai/gpt-4o-mini
    blocks:
      - name: persona
        value: Short.
",
    );

    let fleet = load_fleet(&fs, Path::new(MANIFEST)).expect("loads");
    assert_eq!(fleet.agents[0].system, "Hi.");
    assert_eq!(fleet.agents[0].blocks[0].value, "Short.");
    assert_eq!(fleet.agents[0].context_window, 32_000);
}

#[test]
fn every_problem_is_collected_into_one_error() {
    // three independent problems: missing prompt file, missing block
    // content, undeclared shared reference
    let fs = MapFs::default().with(
        MANIFEST,
        r"
agents:
  - name: triage
    system_prompt_file: prompts/missing.md
    model: openai/gpt-4o
    blocks:
      - name: persona
    shared_blocks: [shared_ghost]
",
    );

    let err = load_fleet(&fs, Path::new(MANIFEST)).expect_err("invalid");
    let text = err.to_string();
    assert!(text.contains("validation failed"), "got: {text}");
    assert!(text.contains("cannot read file: prompts/missing.md"), "got: {text}");
    assert!(text.contains("provide value or value_file"), "got: {text}");
    assert!(
        text.contains("'shared_ghost' is not declared under shared_blocks"),
        "got: {text}"
    );
}

#[test]
fn over_limit_block_values_are_reported() {
    let fs = MapFs::default().with(
        MANIFEST,
        r"
agents:
  - name: triage
    system_prompt: x
    model: m
    blocks:
      - name: persona
        limit: 4
        value: much too long
",
    );

    let err = load_fleet(&fs, Path::new(MANIFEST)).expect_err("over limit");
    assert!(
        err.to_string().contains("exceeds limit 4"),
        "got: {err}"
    );
}

#[test]
fn duplicate_folder_file_names_are_reported() {
    let fs = MapFs::default()
        .with(
            MANIFEST,
            r"
agents:
  - name: triage
    system_prompt: x
    model: m
    folders:
      - name: docs
        files: [a/notes.md, b/notes.md]
",
        )
        .with("/fleet/a/notes.md", "one")
        .with("/fleet/b/notes.md", "two");

    let err = load_fleet(&fs, Path::new(MANIFEST)).expect_err("duplicate names");
    assert!(
        err.to_string().contains("duplicate file name 'notes.md'"),
        "got: {err}"
    );
}

#[test]
fn missing_folder_files_are_reported() {
    let fs = MapFs::default().with(
        MANIFEST,
        r"
agents:
  - name: triage
    system_prompt: x
    model: m
    folders:
      - name: docs
        files: [docs/ghost.md]
",
    );

    let err = load_fleet(&fs, Path::new(MANIFEST)).expect_err("missing file");
    assert!(
        err.to_string().contains("file not found: docs/ghost.md"),
        "got: {err}"
    );
}
