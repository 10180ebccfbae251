//! Integration tests for index maintenance and the doctor report.

mod common;

use common::TestEnv;
use std::fs;

fn seeded() -> TestEnv {
    let env = TestEnv::init();
    env.td_json(&["create", "epic", "Checkout"]);
    env.td_json(&["create", "issue", "Rounding", "--epic", "EP-0001"]);
    env.td_json(&["create", "task", "Fix it", "--issue", "ISS-0001"]);
    env
}

#[test]
fn test_rebuild_then_validate_is_healthy() {
    let env = seeded();
    let value = env.td_json(&["index", "rebuild"]);
    assert_eq!(value["indexed"], 3);

    let value = env.td_json(&["index", "validate"]);
    assert_eq!(value["healthy"], true);
}

#[test]
fn test_validate_flags_out_of_band_changes() {
    let env = seeded();
    // A record dropped in without going through the store
    let text = fs::read_to_string(env.path().join("tasks/issues/ISS-0001-rounding.md")).unwrap();
    fs::write(
        env.path().join("tasks/issues/ISS-0002-copy.md"),
        text.replace("issue_id: ISS-0001", "issue_id: ISS-0002"),
    )
    .unwrap();

    let output = env.td().args(["index", "validate"]).output().unwrap();
    assert!(!output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["healthy"], false);
    assert!(value["issues"][0].as_str().unwrap().contains("issue"));

    // A rebuild reconciles
    env.td_json(&["index", "rebuild"]);
    let value = env.td_json(&["index", "validate"]);
    assert_eq!(value["healthy"], true);
}

#[test]
fn test_corrupt_index_recovers_transparently() {
    let env = seeded();
    fs::write(env.path().join(".trackdown/index.json"), "{definitely not json").unwrap();

    // Operations keep working at full-scan cost
    let value = env.td_json(&["list"]);
    assert_eq!(value["total_count"], 3);
    let value = env.td_json(&["show", "ISS-0001"]);
    assert_eq!(value["issue_id"], "ISS-0001");
}

#[test]
fn test_missing_index_recovers_transparently() {
    let env = seeded();
    fs::remove_file(env.path().join(".trackdown/index.json")).unwrap();

    let value = env.td_json(&["list"]);
    assert_eq!(value["total_count"], 3);
    assert!(env.path().join(".trackdown/index.json").exists());
}

#[test]
fn test_doctor_healthy_project() {
    let env = seeded();
    let value = env.td_json(&["doctor"]);
    assert_eq!(value["healthy"], true);
    assert_eq!(value["records"], 3);
    assert_eq!(value["violations"].as_array().unwrap().len(), 0);
}

#[test]
fn test_doctor_reports_dangling_reference() {
    let env = seeded();
    let file = env.path().join("tasks/tasks/TSK-0001-fix-it.md");
    let text = fs::read_to_string(&file).unwrap();
    fs::write(&file, text.replace("issue_id: ISS-0001", "issue_id: ISS-0404")).unwrap();

    let output = env.td().args(["doctor"]).output().unwrap();
    assert!(!output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["healthy"], false);
    let violations = value["violations"].as_array().unwrap();
    assert!(
        violations
            .iter()
            .any(|v| v["entity_id"] == "TSK-0001" && v["field"] == "issue_id")
    );
}

#[test]
fn test_doctor_collects_all_violations() {
    let env = seeded();
    // Two independent problems: a dangling task parent and a corrupt file
    let file = env.path().join("tasks/tasks/TSK-0001-fix-it.md");
    let text = fs::read_to_string(&file).unwrap();
    fs::write(&file, text.replace("issue_id: ISS-0001", "issue_id: ISS-0404")).unwrap();
    fs::write(env.path().join("tasks/epics/EP-0099-junk.md"), "no metadata").unwrap();

    let output = env.td().args(["doctor"]).output().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["healthy"], false);
    assert!(!value["violations"].as_array().unwrap().is_empty());
    assert!(!value["scan_warnings"].as_array().unwrap().is_empty());
}
