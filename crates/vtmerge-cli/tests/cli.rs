//! End-to-end tests for the `vtmerge` binary over fixture repositories.
//!
//! Coverage:
//! - merge-base prints the shared ancestor
//! - clean merge reports `clean` in JSON
//! - conflicting merge succeeds with `completed_with_conflicts`
//! - unrelated histories abort with a non-zero exit
//! - verify reports unique-index violations
//! - --working refuses to stomp uncommitted changes

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const PEOPLE_COLUMNS: &str = r#"[
  { "tag": 1, "name": "id", "type": "int", "nullable": false },
  { "tag": 2, "name": "name", "type": "varchar(32)" }
]"#;

fn people(rows: &str) -> String {
    format!(
        r#"{{ "columns": {PEOPLE_COLUMNS}, "primary_key": ["id"],
             "indexes": [{{ "name": "uniq_name", "columns": ["name"], "unique": true }}],
             "rows": {rows} }}"#
    )
}

/// base -> ours, base -> theirs, base -> conflict, plus an unrelated root.
fn fixture() -> String {
    format!(
        r#"{{
  "commits": [
    {{ "id": "base", "tables": {{ "people": {base} }} }},
    {{ "id": "ours", "parents": ["base"], "tables": {{ "people": {ours} }} }},
    {{ "id": "theirs", "parents": ["base"], "tables": {{ "people": {theirs} }} }},
    {{ "id": "clash", "parents": ["base"], "tables": {{ "people": {clash} }} }},
    {{ "id": "dirty", "parents": ["ours"], "tables": {{ "people": {dirty} }} }},
    {{ "id": "orphan", "message": "unrelated", "tables": {{ "people": {base} }} }},
    {{ "id": "dupes", "tables": {{ "people": {dupes} }} }}
  ],
  "refs": {{ "main": "ours", "feature": "theirs" }}
}}"#,
        base = people(r#"[[1, "ada"], [2, "grace"]]"#),
        ours = people(r#"[[1, "ada lovelace"], [2, "grace"]]"#),
        theirs = people(r#"[[1, "ada"], [2, "grace"], [3, "edsger"]]"#),
        clash = people(r#"[[1, "countess"], [2, "grace"]]"#),
        dirty = people(r#"[[1, "ada lovelace"], [2, "grace"], [4, "alan"]]"#),
        dupes = people(r#"[[1, "ada"], [2, "ada"]]"#),
    )
}

fn setup() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("repo.json");
    std::fs::write(&path, fixture()).expect("failed to write fixture");
    (dir, path)
}

fn vtmerge(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vtmerge"))
        .args(args)
        .current_dir(dir)
        .env_remove("VTMERGE_LOG")
        .output()
        .expect("failed to run vtmerge")
}

fn stdout_json(out: &Output) -> serde_json::Value {
    assert!(
        out.status.success(),
        "vtmerge failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("stdout is not JSON")
}

#[test]
fn merge_base_finds_shared_ancestor() {
    let (dir, repo) = setup();
    let repo = repo.to_str().unwrap();
    let base = vtmerge(dir.path(), &["merge-base", "-r", repo, "main", "feature", "--json"]);
    let base = stdout_json(&base);
    let direct = vtmerge(dir.path(), &["merge-base", "-r", repo, "base", "base"]);
    let direct = String::from_utf8_lossy(&direct.stdout);
    assert_eq!(base["base"].as_str().unwrap(), direct.trim());
    assert_eq!(base["height"], 1);
}

#[test]
fn disjoint_changes_merge_clean() {
    let (dir, repo) = setup();
    let out = vtmerge(
        dir.path(),
        &["merge", "-r", repo.to_str().unwrap(), "main", "feature", "--json"],
    );
    let report = stdout_json(&out);
    assert_eq!(report["status"], "clean");
    assert_eq!(report["outcome"], "merged");
    assert_eq!(report["tables"]["people"]["adds"], 1);
    assert_eq!(report["parents"].as_array().unwrap().len(), 2);
}

#[test]
fn conflicting_edit_completes_with_conflicts() {
    let (dir, repo) = setup();
    let out = vtmerge(
        dir.path(),
        &["merge", "-r", repo.to_str().unwrap(), "main", "clash", "--format", "json"],
    );
    let report = stdout_json(&out);
    assert_eq!(report["status"], "completed_with_conflicts");
    assert_eq!(report["tables"]["people"]["data_conflicts"], 1);
}

#[test]
fn unrelated_histories_abort() {
    let (dir, repo) = setup();
    let out = vtmerge(dir.path(), &["merge", "-r", repo.to_str().unwrap(), "main", "orphan"]);
    assert!(!out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("status: aborted"), "stdout: {stdout}");
}

#[test]
fn verify_reports_duplicate_unique_values() {
    let (dir, repo) = setup();
    let out = vtmerge(
        dir.path(),
        &["verify", "-r", repo.to_str().unwrap(), "dupes", "--json"],
    );
    let out = stdout_json(&out);
    assert_eq!(out["violations"]["people"], 2);
}

#[test]
fn working_changes_block_overlapping_merge() {
    let (dir, repo) = setup();
    let out = vtmerge(
        dir.path(),
        &[
            "merge",
            "-r",
            repo.to_str().unwrap(),
            "main",
            "feature",
            "--working",
            "dirty",
        ],
    );
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("uncommitted changes in: people"), "stderr: {stderr}");
}

#[test]
fn config_file_is_honoured() {
    let (dir, repo) = setup();
    std::fs::write(dir.path().join("vtmerge.toml"), "[merge]\nconcurrency = 0\n").unwrap();
    let out = vtmerge(dir.path(), &["merge", "-r", repo.to_str().unwrap(), "main", "feature"]);
    assert!(!out.status.success(), "zero concurrency must be rejected");
}
