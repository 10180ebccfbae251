//! Integration tests for the PR workflow through the CLI.

mod common;

use common::TestEnv;
use predicates::prelude::*;

fn env_with_pr() -> TestEnv {
    let env = TestEnv::init();
    env.td_json(&["create", "epic", "Checkout"]);
    env.td_json(&["create", "issue", "Rounding", "--epic", "EP-0001"]);
    env.td_json(&[
        "create", "pr", "Fix rounding", "--issue", "ISS-0001", "--branch", "fix/rounding",
    ]);
    env
}

#[test]
fn test_pr_starts_as_draft() {
    let env = env_with_pr();
    let value = env.td_json(&["show", "PR-0001"]);
    assert_eq!(value["pr_status"], "draft");
    assert_eq!(value["branch_name"], "fix/rounding");
}

#[test]
fn test_walk_to_merged() {
    let env = env_with_pr();
    env.td_json(&["pr", "transition", "PR-0001", "open"]);
    env.td_json(&["pr", "transition", "PR-0001", "review"]);
    let value = env.td_json(&["pr", "transition", "PR-0001", "approved"]);
    // No reviewers assigned: approved with a warning
    assert!(!value["warnings"].as_array().unwrap().is_empty());

    let value = env.td_json(&["pr", "transition", "PR-0001", "merged"]);
    assert_eq!(value["pr_status"], "merged");
}

#[test]
fn test_invalid_transition_is_rejected() {
    let env = env_with_pr();
    env.td()
        .args(["pr", "transition", "PR-0001", "merged"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("draft -> merged"));

    // Nothing was written
    let value = env.td_json(&["show", "PR-0001"]);
    assert_eq!(value["pr_status"], "draft");
}

#[test]
fn test_merged_is_terminal() {
    let env = env_with_pr();
    for to in ["open", "approved", "merged"] {
        env.td_json(&["pr", "transition", "PR-0001", to]);
    }
    env.td()
        .args(["pr", "transition", "PR-0001", "open"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("merged -> open"));
}

#[test]
fn test_blocked_pr_cannot_merge_without_force() {
    let env = env_with_pr();
    env.td_json(&["create", "issue", "Blocker", "--epic", "EP-0001"]);
    // Block the PR on the other issue by editing the record
    let file = env.path().join("tasks/prs");
    let pr_file = std::fs::read_dir(&file)
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    let text = std::fs::read_to_string(&pr_file).unwrap();
    let patched = text.replace("blocked_by: []", "blocked_by:\n- ISS-0002");
    assert_ne!(text, patched);
    std::fs::write(&pr_file, patched).unwrap();

    env.td_json(&["pr", "transition", "PR-0001", "open"]);
    env.td_json(&["pr", "transition", "PR-0001", "approved"]);
    env.td()
        .args(["pr", "transition", "PR-0001", "merged"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("blocked"));

    // --force bypasses the business rule, not the structure
    let value = env.td_json(&["pr", "transition", "PR-0001", "merged", "--force"]);
    assert_eq!(value["pr_status"], "merged");
}

#[test]
fn test_closing_approved_pr_warns() {
    let env = env_with_pr();
    env.td_json(&["pr", "transition", "PR-0001", "open"]);
    env.td_json(&["pr", "transition", "PR-0001", "approved"]);
    let value = env.td_json(&["pr", "transition", "PR-0001", "closed"]);
    assert_eq!(value["pr_status"], "closed");
    let warnings = value["warnings"].as_array().unwrap();
    assert!(warnings.iter().any(|w| w.as_str().unwrap().contains("merge")));
}

#[test]
fn test_closed_pr_is_reopenable() {
    let env = env_with_pr();
    env.td_json(&["pr", "transition", "PR-0001", "closed"]);
    let value = env.td_json(&["pr", "transition", "PR-0001", "draft"]);
    assert_eq!(value["pr_status"], "draft");
}
