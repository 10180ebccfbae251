//! Common test utilities for trackdown integration tests.
//!
//! Provides `TestEnv` for isolated project directories so tests never
//! touch the user's real records.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with an isolated project directory.
///
/// The `td()` method returns a `Command` running inside the temp project
/// with `TRACKDOWN_TASKS_ROOT` scrubbed, making tests parallel-safe and
/// independent of the invoking shell.
pub struct TestEnv {
    pub project_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with an empty project directory.
    pub fn new() -> Self {
        Self {
            project_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and initialize a project in it.
    pub fn init() -> Self {
        let env = Self::new();
        env.td().arg("init").assert().success();
        env
    }

    /// Get a Command for the td binary scoped to this project.
    pub fn td(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_td"));
        cmd.current_dir(self.project_dir.path());
        cmd.env_remove("TRACKDOWN_TASKS_ROOT");
        cmd
    }

    /// Get the path to the project directory.
    pub fn path(&self) -> &std::path::Path {
        self.project_dir.path()
    }

    /// Run a td command and parse its stdout as JSON.
    pub fn td_json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.td().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "td {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
