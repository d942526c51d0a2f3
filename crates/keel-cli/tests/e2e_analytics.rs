//! E2E tests for the analytics commands:
//! `keel coverage`, `keel cycles`, `keel timeline`, `keel wbs`, `keel graph`.
//!
//! Covers: JSON payload shape, non-zero exit on cycles, and error rendering
//! for a missing snapshot.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test harness helpers
// ---------------------------------------------------------------------------

fn keel_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("keel"));
    cmd.current_dir(dir);
    cmd.env("KEEL_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd
}

fn write_snapshot(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, body).expect("write snapshot");
    path
}

fn json_of(dir: &TempDir, snapshot: &Path, args: &[&str]) -> Value {
    let output = keel_cmd(dir.path())
        .args(args)
        .arg("--snapshot")
        .arg(snapshot)
        .args(["--format", "json"])
        .output()
        .expect("command should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

const PLAN: &str = r#"{
  "objectives": [
    {"id": "o1", "title": "Ship v1"},
    {"id": "o2", "title": "Grow"},
    {"id": "o3", "title": "Hire"}
  ],
  "deliverables": [
    {"id": "d1", "title": "API", "objective_id": "o1"}
  ],
  "work_items": [
    {"id": "a", "title": "Design", "deliverable_id": "d1",
     "start_date": "2024-01-01", "due_date": "2024-01-03"},
    {"id": "b", "title": "Build", "deliverable_id": "d1",
     "start_date": "2024-01-01", "due_date": "2024-01-06", "dependencies": ["a"]},
    {"id": "c", "title": "Docs", "deliverable_id": "d1",
     "start_date": "2024-01-01", "due_date": "2024-01-02", "dependencies": ["a"]}
  ]
}"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn coverage_reports_uncovered_objectives() {
    let dir = TempDir::new().expect("tempdir");
    let snapshot = write_snapshot(&dir, PLAN);

    let json = json_of(&dir, &snapshot, &["coverage"]);
    assert_eq!(json["score"], 33);
    assert_eq!(json["total_objectives"], 3);
    assert_eq!(json["covered_objectives"], 1);
    let ids: Vec<&str> = json["issues"]
        .as_array()
        .expect("issues array")
        .iter()
        .filter_map(|i| i["entity_id"].as_str())
        .collect();
    assert_eq!(ids, vec!["o2", "o3"]);
}

#[test]
fn timeline_finds_critical_path() {
    let dir = TempDir::new().expect("tempdir");
    let snapshot = write_snapshot(&dir, PLAN);

    let json = json_of(&dir, &snapshot, &["timeline", "--as-of", "2024-01-01"]);
    let path: Vec<&str> = json["critical_path"]
        .as_array()
        .expect("critical_path array")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(path, vec!["a", "b"]);
    assert_eq!(json["total_duration"], 7);
}

#[test]
fn wbs_assigns_codes() {
    let dir = TempDir::new().expect("tempdir");
    let snapshot = write_snapshot(&dir, PLAN);

    keel_cmd(dir.path())
        .arg("wbs")
        .arg("--snapshot")
        .arg(&snapshot)
        .args(["--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.1"));
}

#[test]
fn graph_defaults_to_dependency_edges() {
    let dir = TempDir::new().expect("tempdir");
    let snapshot = write_snapshot(&dir, PLAN);

    let json = json_of(&dir, &snapshot, &["graph"]);
    let edges = json["edges"].as_array().expect("edges array");
    assert_eq!(edges.len(), 2);
    assert!(edges.iter().all(|e| e["relation"] == "depends_on"));
}

#[test]
fn cycles_exit_non_zero() {
    let dir = TempDir::new().expect("tempdir");
    let snapshot = write_snapshot(
        &dir,
        r#"{"work_items": [
            {"id": "x", "title": "X", "dependencies": ["y"]},
            {"id": "y", "title": "Y", "dependencies": ["x"]}
        ]}"#,
    );

    let output = keel_cmd(dir.path())
        .arg("cycles")
        .arg("--snapshot")
        .arg(&snapshot)
        .args(["--format", "json"])
        .output()
        .expect("cycles should not crash");
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON on stdout");
    assert_eq!(json["dependency"]["count"], 1);
    assert_eq!(json["hierarchy"]["has_cycle"], false);
}

#[test]
fn clean_plan_has_no_cycles() {
    let dir = TempDir::new().expect("tempdir");
    let snapshot = write_snapshot(&dir, PLAN);

    keel_cmd(dir.path())
        .arg("cycles")
        .arg("--snapshot")
        .arg(&snapshot)
        .args(["--format", "text"])
        .assert()
        .success();
}

#[test]
fn missing_snapshot_renders_error_code() {
    let dir = TempDir::new().expect("tempdir");

    keel_cmd(dir.path())
        .args(["coverage", "--snapshot", "nope.json", "--format", "json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn completions_do_not_need_a_snapshot() {
    let dir = TempDir::new().expect("tempdir");

    keel_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keel"));
}
