//! Trackdown - a file-based hierarchical work-tracking store.
//!
//! This library provides the core functionality for the `td` CLI tool:
//! epics, issues, tasks, and pull-request records persisted as individual
//! frontmatter-plus-body text files, with a rebuildable index on top so
//! queries don't re-parse every file on every invocation.

pub mod cli;
pub mod codec;
pub mod commands;
pub mod config;
pub mod index;
pub mod models;
pub mod query;
pub mod scanner;
pub mod store;


/// Library-level error type for trackdown operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not initialized: run `td init` first")]
    NotInitialized,

    #[error("Malformed record {path}: {reason}")]
    MalformedRecord { path: String, reason: String },

    #[error("Unrecognized record type in {0}: no entity id field present")]
    UnknownRecordType(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Dangling reference: {from} refers to missing {to}")]
    DanglingReference { from: String, to: String },

    #[error("Invalid PR transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Transition blocked: {0}")]
    TransitionRejected(String),

    #[error("Index inconsistent: {0}")]
    IndexInconsistent(String),

    #[error("Ambiguous directory layout: {0}")]
    AmbiguousLayout(String),

    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for trackdown operations.
pub type Result<T> = std::result::Result<T, Error>;
