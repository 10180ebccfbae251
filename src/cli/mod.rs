//! CLI argument definitions for trackdown.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Trackdown - file-based epic/issue/task/PR tracking for AI agents and humans.
///
/// Records live as frontmatter-plus-body text files under the tasks root;
/// start with `td init`, then `td create epic "..."`.
#[derive(Parser, Debug)]
#[command(name = "td")]
#[command(author, version, about = "Track epics, issues, tasks, and PRs as plain files", long_about = None)]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ", env!("TD_GIT_COMMIT"),
    "\nbuilt: ", env!("TD_BUILD_TIMESTAMP"),
))]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if td was started in <path> instead of the current directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<PathBuf>,

    /// Tasks-root directory name for this invocation only.
    /// Overrides TRACKDOWN_TASKS_ROOT and the project config.
    #[arg(long = "tasks-root", global = true)]
    pub tasks_root: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a trackdown project (config, category directories, index)
    Init {
        /// Persist a non-default tasks-root directory name in the config
        #[arg(long)]
        root: Option<String>,
    },

    /// Create a record
    Create {
        #[command(subcommand)]
        command: CreateCommands,
    },

    /// Show any record by id (type detected from the prefix)
    Show {
        /// Record id (e.g., EP-0001, ISS-0002)
        id: String,
    },

    /// List records with optional filters and sorting
    List {
        /// Restrict to one kind: epic, issue, task, or pr
        #[arg(long)]
        kind: Option<String>,

        /// Status filter, repeatable (planning|active|completed|archived)
        #[arg(long)]
        status: Vec<String>,

        /// Priority filter, repeatable (low|medium|high|critical)
        #[arg(long)]
        priority: Vec<String>,

        /// Exact assignee match
        #[arg(long)]
        assignee: Option<String>,

        /// Tag filter, repeatable; any match qualifies
        #[arg(long)]
        tag: Vec<String>,

        /// Case-insensitive text search over title, description, and body
        #[arg(long)]
        search: Option<String>,

        /// Sort key: created, updated, title, priority, or status
        #[arg(long)]
        sort: Option<String>,

        /// Reverse the sort order
        #[arg(long)]
        reverse: bool,
    },

    /// Update fields of a record
    Update {
        /// Record id
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// New status (planning|active|completed|archived)
        #[arg(long)]
        status: Option<String>,

        /// New priority (low|medium|high|critical)
        #[arg(long)]
        priority: Option<String>,

        /// New assignee
        #[arg(long)]
        assignee: Option<String>,

        /// Replace the tag list, repeatable
        #[arg(long)]
        tag: Vec<String>,

        /// Estimated token budget
        #[arg(long)]
        estimate: Option<u64>,

        /// Actual tokens consumed
        #[arg(long)]
        actual: Option<u64>,
    },

    /// Delete a record and scrub it from its parent's lists
    Delete {
        /// Record id
        id: String,
    },

    /// Show an issue with its epic, tasks, and PRs
    Hierarchy {
        /// Issue id
        issue_id: String,
    },

    /// Pull-request workflow commands
    Pr {
        #[command(subcommand)]
        command: PrCommands,
    },

    /// Index maintenance commands
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },

    /// Referential-integrity and index health report
    Doctor,

    /// Show resolved directories and where each value came from
    Paths,
}

/// Create subcommands
#[derive(Subcommand, Debug)]
pub enum CreateCommands {
    /// Create an epic
    Epic {
        /// Epic title
        title: String,

        #[command(flatten)]
        common: CreateArgs,
    },

    /// Create an issue under an epic
    Issue {
        /// Issue title
        title: String,

        /// Owning epic id
        #[arg(long)]
        epic: String,

        #[command(flatten)]
        common: CreateArgs,
    },

    /// Create a task under an issue
    Task {
        /// Task title
        title: String,

        /// Owning issue id
        #[arg(long)]
        issue: String,

        /// Parent task id for subtasks
        #[arg(long)]
        parent: Option<String>,

        #[command(flatten)]
        common: CreateArgs,
    },

    /// Create a PR record under an issue
    Pr {
        /// PR title
        title: String,

        /// Owning issue id
        #[arg(long)]
        issue: String,

        /// Source branch name
        #[arg(long)]
        branch: Option<String>,

        #[command(flatten)]
        common: CreateArgs,
    },
}

/// Creation attributes shared by every record kind.
#[derive(clap::Args, Debug, Default)]
pub struct CreateArgs {
    /// Description text
    #[arg(long)]
    pub description: Option<String>,

    /// Priority (low|medium|high|critical)
    #[arg(long)]
    pub priority: Option<String>,

    /// Assignee
    #[arg(long)]
    pub assignee: Option<String>,

    /// Tag, repeatable
    #[arg(long)]
    pub tag: Vec<String>,

    /// Estimated token budget
    #[arg(long)]
    pub estimate: Option<u64>,
}

/// PR subcommands
#[derive(Subcommand, Debug)]
pub enum PrCommands {
    /// Transition a PR to a new review status
    Transition {
        /// PR id
        id: String,

        /// Target status (draft|open|review|approved|merged|closed)
        to: String,

        /// Bypass business rules (reviewer counts, blocked merges).
        /// Structural transitions are still enforced.
        #[arg(long)]
        force: bool,
    },
}

/// Index subcommands
#[derive(Subcommand, Debug)]
pub enum IndexCommands {
    /// Rebuild the index from a full directory scan
    Rebuild,

    /// Check the index against the record directories
    Validate,
}
