//! Data models for trackdown entities.
//!
//! This module defines the core data structures:
//! - `Epic` - Top-level container owning issues
//! - `Issue` - Work item owned by exactly one epic
//! - `Task` - Unit of work owned by exactly one issue
//! - `PullRequest` - Review record owned by exactly one issue
//! - `Record` - Discriminated union over the four entity types
//!
//! Parent references are one-directional: a child knows its parent id.
//! The `related_*` lists on parents are persisted as a convenience cache
//! and recomputed from the children on read.

pub mod workflow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle status shared by all entity types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Planning,
    Active,
    Completed,
    Archived,
}

impl Status {
    /// Rank for status sorts: active > planning > completed > archived.
    pub fn sort_rank(&self) -> u8 {
        match self {
            Status::Active => 0,
            Status::Planning => 1,
            Status::Completed => 2,
            Status::Archived => 3,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Planning => "planning",
            Status::Active => "active",
            Status::Completed => "completed",
            Status::Archived => "archived",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Status::Planning),
            "active" => Ok(Status::Active),
            "completed" => Ok(Status::Completed),
            "archived" => Ok(Status::Archived),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// Priority level shared by all entity types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Rank for priority sorts: critical > high > medium > low.
    pub fn sort_rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Marker tracking whether a record has been pushed to a remote mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Local,
    Synced,
    Conflict,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Local => "local",
            SyncStatus::Synced => "synced",
            SyncStatus::Conflict => "conflict",
        };
        write!(f, "{}", s)
    }
}

/// Pull-request review status. Transitions are constrained; see [`workflow`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrStatus {
    #[default]
    Draft,
    Open,
    Review,
    Approved,
    Merged,
    Closed,
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrStatus::Draft => "draft",
            PrStatus::Open => "open",
            PrStatus::Review => "review",
            PrStatus::Approved => "approved",
            PrStatus::Merged => "merged",
            PrStatus::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for PrStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PrStatus::Draft),
            "open" => Ok(PrStatus::Open),
            "review" => Ok(PrStatus::Review),
            "approved" => Ok(PrStatus::Approved),
            "merged" => Ok(PrStatus::Merged),
            "closed" => Ok(PrStatus::Closed),
            _ => Err(format!("Unknown PR status: {}", s)),
        }
    }
}

/// Entity category. Determines directory, id prefix, and decoding schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Epic,
    Issue,
    Task,
    PullRequest,
}

impl EntityKind {
    /// All kinds in decoding priority order: Epic -> Issue -> Task -> PR.
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::Epic,
            EntityKind::Issue,
            EntityKind::Task,
            EntityKind::PullRequest,
        ]
    }

    /// Frontmatter field holding this kind's own id.
    pub fn id_field(&self) -> &'static str {
        match self {
            EntityKind::Epic => "epic_id",
            EntityKind::Issue => "issue_id",
            EntityKind::Task => "task_id",
            EntityKind::PullRequest => "pr_id",
        }
    }

    /// Parent-id fields this kind must carry.
    pub fn parent_fields(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Epic => &[],
            EntityKind::Issue => &["epic_id"],
            EntityKind::Task => &["issue_id", "epic_id"],
            EntityKind::PullRequest => &["issue_id"],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Epic => "epic",
            EntityKind::Issue => "issue",
            EntityKind::Task => "task",
            EntityKind::PullRequest => "pr",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "epic" => Ok(EntityKind::Epic),
            "issue" => Ok(EntityKind::Issue),
            "task" => Ok(EntityKind::Task),
            "pr" => Ok(EntityKind::PullRequest),
            _ => Err(format!("Unknown entity kind: {}", s)),
        }
    }
}

fn default_assignee() -> String {
    "unassigned".to_string()
}

/// A top-level container owning zero or more issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    /// Unique identifier (e.g., "EP-0001")
    pub epic_id: String,

    /// Epic title
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Current lifecycle status
    #[serde(default)]
    pub status: Status,

    /// Priority level
    #[serde(default)]
    pub priority: Priority,

    /// Assigned user or agent
    #[serde(default = "default_assignee")]
    pub assignee: String,

    /// Creation timestamp
    pub created_date: DateTime<Utc>,

    /// Last update timestamp, rewritten on every mutation
    pub updated_date: DateTime<Utc>,

    /// Estimated token budget
    #[serde(default)]
    pub estimated_tokens: u64,

    /// Tokens actually consumed
    #[serde(default)]
    pub actual_tokens: u64,

    /// Ordered AI-context tags
    #[serde(default)]
    pub ai_context: Vec<String>,

    /// Remote-mirror sync marker
    #[serde(default)]
    pub sync_status: SyncStatus,

    /// Tags for categorization
    #[serde(default)]
    pub tags: Vec<String>,

    /// Ids this epic depends on
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Ids blocking this epic
    #[serde(default)]
    pub blocked_by: Vec<String>,

    /// Ids this epic blocks
    #[serde(default)]
    pub blocks: Vec<String>,

    /// Child issue ids (cache; children are authoritative)
    #[serde(default)]
    pub related_issues: Vec<String>,

    /// Absolute file path, set at parse time and never persisted
    #[serde(skip)]
    pub file_path: PathBuf,

    /// Free-form body following the frontmatter, stored verbatim
    #[serde(skip)]
    pub body: String,
}

impl Epic {
    /// Create a new epic with the given id and title.
    pub fn new(epic_id: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            epic_id,
            title,
            description: String::new(),
            status: Status::default(),
            priority: Priority::default(),
            assignee: default_assignee(),
            created_date: now,
            updated_date: now,
            estimated_tokens: 0,
            actual_tokens: 0,
            ai_context: Vec::new(),
            sync_status: SyncStatus::default(),
            tags: Vec::new(),
            dependencies: Vec::new(),
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            related_issues: Vec::new(),
            file_path: PathBuf::new(),
            body: String::new(),
        }
    }
}

/// A work item owned by exactly one epic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Unique identifier (e.g., "ISS-0001")
    pub issue_id: String,

    /// Owning epic id (mandatory)
    pub epic_id: String,

    /// Issue title
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Current lifecycle status
    #[serde(default)]
    pub status: Status,

    /// Priority level
    #[serde(default)]
    pub priority: Priority,

    /// Assigned user or agent
    #[serde(default = "default_assignee")]
    pub assignee: String,

    /// Creation timestamp
    pub created_date: DateTime<Utc>,

    /// Last update timestamp, rewritten on every mutation
    pub updated_date: DateTime<Utc>,

    /// Estimated token budget
    #[serde(default)]
    pub estimated_tokens: u64,

    /// Tokens actually consumed
    #[serde(default)]
    pub actual_tokens: u64,

    /// Ordered AI-context tags
    #[serde(default)]
    pub ai_context: Vec<String>,

    /// Remote-mirror sync marker
    #[serde(default)]
    pub sync_status: SyncStatus,

    /// Tags for categorization
    #[serde(default)]
    pub tags: Vec<String>,

    /// Ids this issue depends on
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Ids blocking this issue
    #[serde(default)]
    pub blocked_by: Vec<String>,

    /// Ids this issue blocks
    #[serde(default)]
    pub blocks: Vec<String>,

    /// Child task ids (cache; children are authoritative)
    #[serde(default)]
    pub related_tasks: Vec<String>,

    /// Child PR ids (cache; children are authoritative)
    #[serde(default)]
    pub related_prs: Vec<String>,

    /// Absolute file path, set at parse time and never persisted
    #[serde(skip)]
    pub file_path: PathBuf,

    /// Free-form body following the frontmatter, stored verbatim
    #[serde(skip)]
    pub body: String,
}

impl Issue {
    /// Create a new issue owned by the given epic.
    pub fn new(issue_id: String, title: String, epic_id: String) -> Self {
        let now = Utc::now();
        Self {
            issue_id,
            epic_id,
            title,
            description: String::new(),
            status: Status::default(),
            priority: Priority::default(),
            assignee: default_assignee(),
            created_date: now,
            updated_date: now,
            estimated_tokens: 0,
            actual_tokens: 0,
            ai_context: Vec::new(),
            sync_status: SyncStatus::default(),
            tags: Vec::new(),
            dependencies: Vec::new(),
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            related_tasks: Vec::new(),
            related_prs: Vec::new(),
            file_path: PathBuf::new(),
            body: String::new(),
        }
    }
}

/// A unit of work owned by exactly one issue.
///
/// `epic_id` is denormalized from the owning issue for fast filtering;
/// the doctor checks it against the parent issue's `epic_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (e.g., "TSK-0001")
    pub task_id: String,

    /// Owning issue id (mandatory)
    pub issue_id: String,

    /// Owning epic id (mandatory, denormalized)
    pub epic_id: String,

    /// Task title
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Current lifecycle status
    #[serde(default)]
    pub status: Status,

    /// Priority level
    #[serde(default)]
    pub priority: Priority,

    /// Assigned user or agent
    #[serde(default = "default_assignee")]
    pub assignee: String,

    /// Creation timestamp
    pub created_date: DateTime<Utc>,

    /// Last update timestamp, rewritten on every mutation
    pub updated_date: DateTime<Utc>,

    /// Estimated token budget
    #[serde(default)]
    pub estimated_tokens: u64,

    /// Tokens actually consumed
    #[serde(default)]
    pub actual_tokens: u64,

    /// Ordered AI-context tags
    #[serde(default)]
    pub ai_context: Vec<String>,

    /// Remote-mirror sync marker
    #[serde(default)]
    pub sync_status: SyncStatus,

    /// Tags for categorization
    #[serde(default)]
    pub tags: Vec<String>,

    /// Ids this task depends on
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Ids blocking this task
    #[serde(default)]
    pub blocked_by: Vec<String>,

    /// Ids this task blocks
    #[serde(default)]
    pub blocks: Vec<String>,

    /// Parent task id when this task is a subtask (tree, not DAG)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task: Option<String>,

    /// Subtask ids (cache; children are authoritative)
    #[serde(default)]
    pub subtasks: Vec<String>,

    /// Absolute file path, set at parse time and never persisted
    #[serde(skip)]
    pub file_path: PathBuf,

    /// Free-form body following the frontmatter, stored verbatim
    #[serde(skip)]
    pub body: String,
}

impl Task {
    /// Create a new task owned by the given issue and epic.
    pub fn new(task_id: String, title: String, issue_id: String, epic_id: String) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            issue_id,
            epic_id,
            title,
            description: String::new(),
            status: Status::default(),
            priority: Priority::default(),
            assignee: default_assignee(),
            created_date: now,
            updated_date: now,
            estimated_tokens: 0,
            actual_tokens: 0,
            ai_context: Vec::new(),
            sync_status: SyncStatus::default(),
            tags: Vec::new(),
            dependencies: Vec::new(),
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            parent_task: None,
            subtasks: Vec::new(),
            file_path: PathBuf::new(),
            body: String::new(),
        }
    }
}

/// A pull-request record owned by exactly one issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// Unique identifier (e.g., "PR-0001")
    pub pr_id: String,

    /// Owning issue id (mandatory)
    pub issue_id: String,

    /// PR title
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Current lifecycle status
    #[serde(default)]
    pub status: Status,

    /// Review status; transitions constrained by [`workflow`]
    #[serde(default)]
    pub pr_status: PrStatus,

    /// Priority level
    #[serde(default)]
    pub priority: Priority,

    /// Assigned user or agent
    #[serde(default = "default_assignee")]
    pub assignee: String,

    /// Creation timestamp
    pub created_date: DateTime<Utc>,

    /// Last update timestamp, rewritten on every mutation
    pub updated_date: DateTime<Utc>,

    /// Estimated token budget
    #[serde(default)]
    pub estimated_tokens: u64,

    /// Tokens actually consumed
    #[serde(default)]
    pub actual_tokens: u64,

    /// Ordered AI-context tags
    #[serde(default)]
    pub ai_context: Vec<String>,

    /// Remote-mirror sync marker
    #[serde(default)]
    pub sync_status: SyncStatus,

    /// Tags for categorization
    #[serde(default)]
    pub tags: Vec<String>,

    /// Ids this PR depends on
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Ids blocking this PR; a non-empty list hard-rejects merging
    #[serde(default)]
    pub blocked_by: Vec<String>,

    /// Ids this PR blocks
    #[serde(default)]
    pub blocks: Vec<String>,

    /// Source branch name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,

    /// Requested reviewers
    #[serde(default)]
    pub reviewers: Vec<String>,

    /// Reviewers who approved
    #[serde(default)]
    pub approvals: Vec<String>,

    /// Absolute file path, set at parse time and never persisted
    #[serde(skip)]
    pub file_path: PathBuf,

    /// Free-form body following the frontmatter, stored verbatim
    #[serde(skip)]
    pub body: String,
}

impl PullRequest {
    /// Create a new PR record owned by the given issue.
    pub fn new(pr_id: String, title: String, issue_id: String) -> Self {
        let now = Utc::now();
        Self {
            pr_id,
            issue_id,
            title,
            description: String::new(),
            status: Status::default(),
            pr_status: PrStatus::default(),
            priority: Priority::default(),
            assignee: default_assignee(),
            created_date: now,
            updated_date: now,
            estimated_tokens: 0,
            actual_tokens: 0,
            ai_context: Vec::new(),
            sync_status: SyncStatus::default(),
            tags: Vec::new(),
            dependencies: Vec::new(),
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            branch_name: None,
            reviewers: Vec::new(),
            approvals: Vec::new(),
            file_path: PathBuf::new(),
            body: String::new(),
        }
    }
}

/// A decoded record of any entity type.
///
/// This is the discriminated result of decoding: callers match on the
/// variant instead of probing optional fields. Serializes untagged (the
/// inner entity's fields directly) for JSON output.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Record {
    Epic(Epic),
    Issue(Issue),
    Task(Task),
    PullRequest(PullRequest),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Epic(_) => EntityKind::Epic,
            Record::Issue(_) => EntityKind::Issue,
            Record::Task(_) => EntityKind::Task,
            Record::PullRequest(_) => EntityKind::PullRequest,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Epic(e) => &e.epic_id,
            Record::Issue(i) => &i.issue_id,
            Record::Task(t) => &t.task_id,
            Record::PullRequest(p) => &p.pr_id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Record::Epic(e) => &e.title,
            Record::Issue(i) => &i.title,
            Record::Task(t) => &t.title,
            Record::PullRequest(p) => &p.title,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Record::Epic(e) => &e.description,
            Record::Issue(i) => &i.description,
            Record::Task(t) => &t.description,
            Record::PullRequest(p) => &p.description,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Record::Epic(e) => e.status,
            Record::Issue(i) => i.status,
            Record::Task(t) => t.status,
            Record::PullRequest(p) => p.status,
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            Record::Epic(e) => e.priority,
            Record::Issue(i) => i.priority,
            Record::Task(t) => t.priority,
            Record::PullRequest(p) => p.priority,
        }
    }

    pub fn assignee(&self) -> &str {
        match self {
            Record::Epic(e) => &e.assignee,
            Record::Issue(i) => &i.assignee,
            Record::Task(t) => &t.assignee,
            Record::PullRequest(p) => &p.assignee,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Record::Epic(e) => &e.tags,
            Record::Issue(i) => &i.tags,
            Record::Task(t) => &t.tags,
            Record::PullRequest(p) => &p.tags,
        }
    }

    pub fn created_date(&self) -> DateTime<Utc> {
        match self {
            Record::Epic(e) => e.created_date,
            Record::Issue(i) => i.created_date,
            Record::Task(t) => t.created_date,
            Record::PullRequest(p) => p.created_date,
        }
    }

    pub fn updated_date(&self) -> DateTime<Utc> {
        match self {
            Record::Epic(e) => e.updated_date,
            Record::Issue(i) => i.updated_date,
            Record::Task(t) => t.updated_date,
            Record::PullRequest(p) => p.updated_date,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Record::Epic(e) => &e.body,
            Record::Issue(i) => &i.body,
            Record::Task(t) => &t.body,
            Record::PullRequest(p) => &p.body,
        }
    }

    pub fn file_path(&self) -> &Path {
        match self {
            Record::Epic(e) => &e.file_path,
            Record::Issue(i) => &i.file_path,
            Record::Task(t) => &t.file_path,
            Record::PullRequest(p) => &p.file_path,
        }
    }

    pub fn set_file_path(&mut self, path: PathBuf) {
        match self {
            Record::Epic(e) => e.file_path = path,
            Record::Issue(i) => i.file_path = path,
            Record::Task(t) => t.file_path = path,
            Record::PullRequest(p) => p.file_path = path,
        }
    }

    /// Parent references as (field name, referenced id) pairs.
    pub fn parent_refs(&self) -> Vec<(&'static str, &str)> {
        match self {
            Record::Epic(_) => Vec::new(),
            Record::Issue(i) => vec![("epic_id", i.epic_id.as_str())],
            Record::Task(t) => vec![
                ("issue_id", t.issue_id.as_str()),
                ("epic_id", t.epic_id.as_str()),
            ],
            Record::PullRequest(p) => vec![("issue_id", p.issue_id.as_str())],
        }
    }

    /// Cross-link ids grouped as (field name, ids) pairs.
    pub fn cross_links(&self) -> [(&'static str, &[String]); 3] {
        match self {
            Record::Epic(e) => [
                ("dependencies", e.dependencies.as_slice()),
                ("blocked_by", e.blocked_by.as_slice()),
                ("blocks", e.blocks.as_slice()),
            ],
            Record::Issue(i) => [
                ("dependencies", i.dependencies.as_slice()),
                ("blocked_by", i.blocked_by.as_slice()),
                ("blocks", i.blocks.as_slice()),
            ],
            Record::Task(t) => [
                ("dependencies", t.dependencies.as_slice()),
                ("blocked_by", t.blocked_by.as_slice()),
                ("blocks", t.blocks.as_slice()),
            ],
            Record::PullRequest(p) => [
                ("dependencies", p.dependencies.as_slice()),
                ("blocked_by", p.blocked_by.as_slice()),
                ("blocks", p.blocks.as_slice()),
            ],
        }
    }
}
