//! `flotilla config` against a real config file in a temp directory,
//! isolated through `FLOTILLA_CONFIG`.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn config_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("config.yaml")
}

fn flotilla(config_dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("flotilla").expect("binary builds");
    cmd.env("NO_COLOR", "1")
        .env("FLOTILLA_CONFIG", config_path(config_dir))
        .env_remove("FLOTILLA_BASE_URL")
        .env_remove("FLOTILLA_API_KEY")
        .env_remove("FLOTILLA_YES");
    cmd
}

#[test]
fn show_prints_defaults_when_no_file_exists() {
    let dir = tempfile::tempdir().expect("tempdir");
    flotilla(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("server.base_url"))
        .stdout(predicate::str::contains("(unset)"))
        .stdout(predicate::str::contains("bulk.concurrency"))
        .stdout(predicate::str::contains("5"))
        .stdout(predicate::str::contains("120"));
}

#[test]
fn set_persists_and_show_reflects_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    flotilla(&dir)
        .args(["config", "set", "server.base_url", "https://agents.example.dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Set server.base_url = https://agents.example.dev",
        ));

    // the value lands in the file named by FLOTILLA_CONFIG
    let raw = std::fs::read_to_string(config_path(&dir)).expect("config written");
    assert!(raw.contains("https://agents.example.dev"), "got: {raw}");

    flotilla(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://agents.example.dev"));
}

#[test]
fn set_accumulates_across_invocations() {
    let dir = tempfile::tempdir().expect("tempdir");
    flotilla(&dir)
        .args(["config", "set", "server.base_url", "https://agents.example.dev"])
        .assert()
        .success();
    flotilla(&dir)
        .args(["config", "set", "bulk.concurrency", "9"])
        .assert()
        .success();

    let raw = std::fs::read_to_string(config_path(&dir)).expect("config written");
    assert!(raw.contains("https://agents.example.dev"), "got: {raw}");
    assert!(raw.contains('9'), "got: {raw}");
}

#[test]
fn api_key_is_never_echoed_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    flotilla(&dir)
        .args(["config", "set", "server.api_key", "sk-secret-123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("sk-secret-123").not());

    flotilla(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("sk-secret-123").not());
}

#[test]
fn unknown_keys_are_rejected_with_the_valid_list() {
    let dir = tempfile::tempdir().expect("tempdir");
    flotilla(&dir)
        .args(["config", "set", "server.password", "hunter2"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unknown setting: server.password"))
        .stderr(predicate::str::contains("server.base_url"))
        .stderr(predicate::str::contains("bulk.timeout_secs"));
}

#[test]
fn non_numeric_concurrency_is_rejected_with_a_hint() {
    let dir = tempfile::tempdir().expect("tempdir");
    flotilla(&dir)
        .args(["config", "set", "bulk.concurrency", "lots"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid value for bulk.concurrency: lots"))
        .stderr(predicate::str::contains("Expected a positive integer"));
}

#[test]
fn bare_hosts_are_rejected_for_the_base_url() {
    let dir = tempfile::tempdir().expect("tempdir");
    flotilla(&dir)
        .args(["config", "set", "server.base_url", "agents.example.dev"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Expected an http(s) URL"));
}

#[test]
fn rejected_sets_leave_no_config_file_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    flotilla(&dir)
        .args(["config", "set", "bulk.concurrency", "0"])
        .assert()
        .failure();
    assert!(!config_path(&dir).exists());
}

#[test]
fn show_json_is_a_single_document_with_path_and_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    flotilla(&dir)
        .args(["config", "set", "bulk.timeout_secs", "90"])
        .assert()
        .success();

    let assert = flotilla(&dir)
        .args(["config", "show", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let doc: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert!(doc["path"].as_str().is_some_and(|p| p.ends_with("config.yaml")));
    assert_eq!(doc["config"]["bulk.timeout_secs"], "90");
    assert_eq!(doc["config"]["bulk.concurrency"], "5");
    assert_eq!(doc["config"]["server.api_key"], "(unset)");
}

#[test]
fn env_overrides_show_up_in_show_but_are_never_written_back() {
    let dir = tempfile::tempdir().expect("tempdir");

    flotilla(&dir)
        .args(["config", "show"])
        .env("FLOTILLA_BASE_URL", "https://env.example.dev")
        .assert()
        .success()
        .stdout(predicate::str::contains("https://env.example.dev"));

    // a set under the same env edits the file, not the overridden view
    flotilla(&dir)
        .args(["config", "set", "bulk.concurrency", "7"])
        .env("FLOTILLA_BASE_URL", "https://env.example.dev")
        .assert()
        .success();

    let raw = std::fs::read_to_string(config_path(&dir)).expect("config written");
    assert!(!raw.contains("env.example.dev"), "env leaked into the file: {raw}");
}
