//! E2E tests for the reporting commands: timeline, status, completion, pivot.

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

fn trackline_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("target/debug/trackline")
}

fn write_snapshot(dir: &tempfile::TempDir, name: &str, json: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(json.as_bytes()).unwrap();
    path
}

fn run(args: &[&str]) -> (i32, String, String) {
    let output = Command::new(trackline_binary())
        .args(args)
        .output()
        .expect("failed to execute trackline");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

const SNAPSHOT: &str = r#"[
    {"key": "E1", "hierarchy_level": 1, "status": "In Progress",
     "team": {"name": "alpha", "velocity": 20.0, "tracks": 2}},
    {"key": "S1", "parent_key": "E1", "status": "In Progress",
     "start_date": "2026-01-05", "due_date": "2026-02-20",
     "total_days_of_work": 10.0, "completed_days_of_work": 4.0,
     "team": {"name": "alpha", "velocity": 20.0, "tracks": 2}},
    {"key": "S2", "parent_key": "E1", "status": "Done",
     "start_date": "2026-02-02", "due_date": "2026-03-13",
     "total_days_of_work": 6.0,
     "team": {"name": "beta", "velocity": 15.0, "tracks": 1}}
]"#;

const PRIOR_SNAPSHOT: &str = r#"[
    {"key": "E1", "hierarchy_level": 1, "status": "In Progress"},
    {"key": "S1", "parent_key": "E1", "status": "In Progress",
     "start_date": "2026-01-05", "due_date": "2026-01-30"}
]"#;

// =============================================================================
// timeline
// =============================================================================

#[test]
fn timeline_text_shows_rollup_windows() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(&dir, "now.json", SNAPSHOT);

    let (code, stdout, _) = run(&["timeline", snapshot.to_str().unwrap()]);
    assert_eq!(code, 0);
    // Epic rolls up the widest child span under the default chain
    assert!(stdout.contains("E1  2026-01-05 .. 2026-03-13"), "stdout: {stdout}");
    assert!(stdout.contains("  S1  "), "children are indented: {stdout}");
}

#[test]
fn timeline_json_is_parseable_and_carries_provenance() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(&dir, "now.json", SNAPSHOT);

    let (code, stdout, _) = run(&["timeline", snapshot.to_str().unwrap(), "--format", "json"]);
    assert_eq!(code, 0);
    let roots: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(roots[0]["issue"]["key"], "E1");
    assert!(roots[0]["date_data"]["rollup"]["start_from"].is_object());
}

#[test]
fn timeline_honors_chain_flag() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(&dir, "now.json", SNAPSHOT);

    // parentOnly: the epic has no dates of its own
    let (code, stdout, _) = run(&[
        "timeline",
        snapshot.to_str().unwrap(),
        "--chain",
        "parentOnly",
    ]);
    assert_eq!(code, 0);
    assert!(stdout.contains("E1  (no timing)"), "stdout: {stdout}");
}

#[test]
fn unknown_chain_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(&dir, "now.json", SNAPSHOT);

    let (code, _, stderr) = run(&[
        "timeline",
        snapshot.to_str().unwrap(),
        "--chain",
        "bogusStrategy",
    ]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown merge strategy"), "stderr: {stderr}");
}

// =============================================================================
// status
// =============================================================================

#[test]
fn status_detects_slip_against_prior() {
    let dir = tempfile::tempdir().unwrap();
    let now = write_snapshot(&dir, "now.json", SNAPSHOT);
    let prior = write_snapshot(&dir, "prior.json", PRIOR_SNAPSHOT);

    let (code, stdout, _) = run(&[
        "status",
        now.to_str().unwrap(),
        "--prior",
        prior.to_str().unwrap(),
        "--as-of",
        "2026-01-15",
        "--format",
        "json",
    ]);
    assert_eq!(code, 0);
    let statuses: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let s1 = statuses
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["key"] == "S1")
        .unwrap();
    // S1's due slipped from Jan 30 to Feb 20
    assert_eq!(s1["overall"]["status"], "behind");
}

#[test]
fn status_without_prior_reports_new() {
    let dir = tempfile::tempdir().unwrap();
    let now = write_snapshot(&dir, "now.json", SNAPSHOT);

    let (code, stdout, _) = run(&[
        "status",
        now.to_str().unwrap(),
        "--as-of",
        "2026-01-15",
    ]);
    assert_eq!(code, 0);
    assert!(stdout.contains("new"), "stdout: {stdout}");
}

#[test]
fn status_reports_labeled_stream_classifications() {
    const STREAMED: &str = r#"[
        {"key": "E1", "hierarchy_level": 1, "status": "In Progress"},
        {"key": "S1", "parent_key": "E1", "status": "In Progress",
         "labels": ["dev"], "start_date": "2026-01-05", "due_date": "2026-02-20"},
        {"key": "S2", "parent_key": "E1", "status": "To Do",
         "labels": ["qa"], "start_date": "2026-02-23", "due_date": "2026-03-13"}
    ]"#;
    let dir = tempfile::tempdir().unwrap();
    let now = write_snapshot(&dir, "now.json", STREAMED);

    let (code, stdout, _) = run(&[
        "status",
        now.to_str().unwrap(),
        "--as-of",
        "2026-01-15",
        "--format",
        "json",
    ]);
    assert_eq!(code, 0);
    let statuses: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let e1 = statuses
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["key"] == "E1")
        .unwrap();
    // No prior snapshot, so both labeled streams classify as new
    assert_eq!(e1["dev"]["status"], "new");
    assert_eq!(e1["qa"]["status"], "new");
    assert!(e1["uat"].is_null());
}

// =============================================================================
// completion
// =============================================================================

#[test]
fn completion_text_sums_children() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(&dir, "now.json", SNAPSHOT);

    let (code, stdout, _) = run(&["completion", snapshot.to_str().unwrap()]);
    assert_eq!(code, 0);
    // E1 = 10 + 6 total; 4 + 6 completed (S2 is done)
    assert!(stdout.contains("E1"), "stdout: {stdout}");
    assert!(stdout.contains("16.0"), "stdout: {stdout}");
    assert!(stdout.contains("10.0"), "stdout: {stdout}");
}

#[test]
fn completion_json_carries_sources() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(&dir, "now.json", SNAPSHOT);

    let (code, stdout, _) = run(&[
        "completion",
        snapshot.to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert_eq!(code, 0);
    let rollups: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(rollups["S1"]["source"], "self");
    assert_eq!(rollups["E1"]["source"], "children");
}

#[test]
fn completion_accepts_policy_chain() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(&dir, "now.json", SNAPSHOT);

    let (code, stdout, _) = run(&[
        "completion",
        snapshot.to_str().unwrap(),
        "--policy",
        "cascade,level-average",
        "--format",
        "json",
    ]);
    assert_eq!(code, 0);
    let rollups: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    // Every node here carries real estimates, so the chain changes nothing
    assert_eq!(rollups["E1"]["total_working_days"], 16.0);
}

#[test]
fn unknown_policy_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(&dir, "now.json", SNAPSHOT);

    let (code, _, stderr) = run(&[
        "completion",
        snapshot.to_str().unwrap(),
        "--policy",
        "optimistic",
    ]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown completion policy"), "stderr: {stderr}");
}

// =============================================================================
// pivot
// =============================================================================

#[test]
fn pivot_by_team_counts_issues() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(&dir, "now.json", SNAPSHOT);

    let (code, stdout, _) = run(&["pivot", snapshot.to_str().unwrap(), "--by", "team"]);
    assert_eq!(code, 0);
    let rows: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let alpha = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["team"] == "alpha")
        .unwrap();
    assert_eq!(alpha["count"], 2);
}

#[test]
fn pivot_by_month_expands_spanning_issues() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(&dir, "now.json", SNAPSHOT);

    let (code, stdout, _) = run(&["pivot", snapshot.to_str().unwrap(), "--by", "month"]);
    assert_eq!(code, 0);
    let rows: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let months: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["month"].as_str().unwrap())
        .collect();
    // S1 spans Jan-Feb, S2 spans Feb-Mar
    assert_eq!(months, vec!["2026-01", "2026-02", "2026-03"]);
}

#[test]
fn unknown_pivot_dimension_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(&dir, "now.json", SNAPSHOT);

    let (code, _, stderr) = run(&["pivot", snapshot.to_str().unwrap(), "--by", "sprint"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown pivot dimension"), "stderr: {stderr}");
}
