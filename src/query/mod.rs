//! Relationship resolver: filtered queries, hierarchy assembly, and bulk
//! referential-integrity validation over a set of decoded records.
//!
//! Hierarchy lookups are a point lookup plus two linear filters, not a
//! graph traversal: Task -> Issue -> Epic is a strict tree by construction,
//! so there is no cycle risk. Parent-side `related_*` lists are treated as
//! caches; children are always recomputed from the child records' parent
//! ids.

use serde::Serialize;

use crate::models::{Epic, Issue, Priority, PullRequest, Record, Status, Task};
use crate::{Error, Result};

/// Search filters. Every field is optional; present fields are ANDed.
/// A multi-value field matches when any of its values match (OR within
/// the field).
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Lifecycle status, any-of
    pub status: Vec<Status>,
    /// Priority, any-of
    pub priority: Vec<Priority>,
    /// Exact assignee match
    pub assignee: Option<String>,
    /// Tags, any-of
    pub tags: Vec<String>,
    /// Case-insensitive substring over title, description, and body
    pub text: Option<String>,
}

impl SearchFilters {
    /// Whether a record passes every present filter.
    pub fn matches(&self, record: &Record) -> bool {
        if !self.status.is_empty() && !self.status.contains(&record.status()) {
            return false;
        }
        if !self.priority.is_empty() && !self.priority.contains(&record.priority()) {
            return false;
        }
        if let Some(assignee) = &self.assignee {
            if record.assignee() != assignee {
                return false;
            }
        }
        if !self.tags.is_empty() {
            let tags = record.tags();
            if !self.tags.iter().any(|t| tags.contains(t)) {
                return false;
            }
        }
        if let Some(needle) = &self.text {
            let needle = needle.to_lowercase();
            let hit = record.title().to_lowercase().contains(&needle)
                || record.description().to_lowercase().contains(&needle)
                || record.body().to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }

    /// Whether an index summary passes every present filter. Text filters
    /// always miss: bodies are not indexed, so text search is answered
    /// from the record files instead.
    pub fn matches_summary(&self, entry: &crate::index::IndexEntry) -> bool {
        if self.text.is_some() {
            return false;
        }
        if !self.status.is_empty() && !self.status.contains(&entry.status) {
            return false;
        }
        if !self.priority.is_empty() && !self.priority.contains(&entry.priority) {
            return false;
        }
        if let Some(assignee) = &self.assignee {
            if &entry.assignee != assignee {
                return false;
            }
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| entry.tags.contains(t)) {
            return false;
        }
        true
    }
}

/// Filter and sort index summaries; the fast path for listings that don't
/// need record bodies.
pub fn search_summaries(
    entries: Vec<crate::index::IndexEntry>,
    filters: &SearchFilters,
    sort: Option<(SortKey, SortOrder)>,
) -> (Vec<crate::index::IndexEntry>, usize) {
    let mut items: Vec<_> = entries
        .into_iter()
        .filter(|e| filters.matches_summary(e))
        .collect();

    if let Some((key, order)) = sort {
        items.sort_by(|a, b| {
            let ordering = match key {
                SortKey::CreatedDate => a.created_date.cmp(&b.created_date),
                SortKey::UpdatedDate => a.updated_date.cmp(&b.updated_date),
                SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
                SortKey::Priority => a.priority.sort_rank().cmp(&b.priority.sort_rank()),
                SortKey::Status => a.status.sort_rank().cmp(&b.status.sort_rank()),
            };
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
    }

    let total = items.len();
    (items, total)
}

/// Sort key for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreatedDate,
    UpdatedDate,
    /// Case-insensitive
    Title,
    /// critical > high > medium > low
    Priority,
    /// active > planning > completed > archived
    Status,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "created" => Ok(SortKey::CreatedDate),
            "updated" => Ok(SortKey::UpdatedDate),
            "title" => Ok(SortKey::Title),
            "priority" => Ok(SortKey::Priority),
            "status" => Ok(SortKey::Status),
            _ => Err(format!("Unknown sort key: {}", s)),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Matched records plus the match count.
#[derive(Debug)]
pub struct SearchResults {
    pub items: Vec<Record>,
    pub total_count: usize,
}

/// Filter and optionally sort a record set.
///
/// Sorting is stable: ties keep their input order. Descending order
/// reverses the key comparison, not the resulting slice, so equal keys
/// still keep input order.
pub fn search(
    records: Vec<Record>,
    filters: &SearchFilters,
    sort: Option<(SortKey, SortOrder)>,
) -> SearchResults {
    let mut items: Vec<Record> = records.into_iter().filter(|r| filters.matches(r)).collect();

    if let Some((key, order)) = sort {
        items.sort_by(|a, b| {
            let ordering = match key {
                SortKey::CreatedDate => a.created_date().cmp(&b.created_date()),
                SortKey::UpdatedDate => a.updated_date().cmp(&b.updated_date()),
                SortKey::Title => a
                    .title()
                    .to_lowercase()
                    .cmp(&b.title().to_lowercase()),
                SortKey::Priority => a.priority().sort_rank().cmp(&b.priority().sort_rank()),
                SortKey::Status => a.status().sort_rank().cmp(&b.status().sort_rank()),
            };
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
    }

    let total_count = items.len();
    SearchResults { items, total_count }
}

/// An issue with its owning epic and owned tasks and PRs.
#[derive(Debug, Serialize)]
pub struct IssueHierarchy {
    pub epic: Epic,
    pub issue: Issue,
    pub tasks: Vec<Task>,
    pub prs: Vec<PullRequest>,
}

/// Resolve the hierarchy around one issue: its epic, its tasks, its PRs.
///
/// `NotFound` when the issue id doesn't resolve; `DanglingReference` when
/// its `epic_id` doesn't.
pub fn issue_hierarchy(records: &[Record], issue_id: &str) -> Result<IssueHierarchy> {
    let issue = records
        .iter()
        .find_map(|r| match r {
            Record::Issue(i) if i.issue_id == issue_id => Some(i.clone()),
            _ => None,
        })
        .ok_or_else(|| Error::NotFound(issue_id.to_string()))?;

    let epic = records
        .iter()
        .find_map(|r| match r {
            Record::Epic(e) if e.epic_id == issue.epic_id => Some(e.clone()),
            _ => None,
        })
        .ok_or_else(|| Error::DanglingReference {
            from: issue.issue_id.clone(),
            to: issue.epic_id.clone(),
        })?;

    let tasks: Vec<Task> = records
        .iter()
        .filter_map(|r| match r {
            Record::Task(t) if t.issue_id == issue_id => Some(t.clone()),
            _ => None,
        })
        .collect();

    let prs: Vec<PullRequest> = records
        .iter()
        .filter_map(|r| match r {
            Record::PullRequest(p) if p.issue_id == issue_id => Some(p.clone()),
            _ => None,
        })
        .collect();

    Ok(IssueHierarchy {
        epic,
        issue,
        tasks,
        prs,
    })
}

/// One referential-integrity violation found during bulk validation.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityViolation {
    /// Entity carrying the bad reference
    pub entity_id: String,
    /// Field holding the reference
    pub field: String,
    /// The id that failed to resolve (or mismatched)
    pub reference: String,
    /// Human-readable description
    pub message: String,
}

/// Validate referential integrity across a full record set.
///
/// Violations are collected and returned, never thrown at the first hit:
/// callers want the complete picture for a health report.
pub fn validate_references(records: &[Record]) -> Vec<IntegrityViolation> {
    let epic_ids: std::collections::HashSet<&str> = records
        .iter()
        .filter_map(|r| match r {
            Record::Epic(e) => Some(e.epic_id.as_str()),
            _ => None,
        })
        .collect();
    let issues: std::collections::HashMap<&str, &Issue> = records
        .iter()
        .filter_map(|r| match r {
            Record::Issue(i) => Some((i.issue_id.as_str(), i)),
            _ => None,
        })
        .collect();
    let task_ids: std::collections::HashSet<&str> = records
        .iter()
        .filter_map(|r| match r {
            Record::Task(t) => Some(t.task_id.as_str()),
            _ => None,
        })
        .collect();
    let all_ids: std::collections::HashSet<&str> = records.iter().map(|r| r.id()).collect();

    fn dangling(
        violations: &mut Vec<IntegrityViolation>,
        entity_id: &str,
        field: &str,
        reference: &str,
    ) {
        violations.push(IntegrityViolation {
            entity_id: entity_id.to_string(),
            field: field.to_string(),
            reference: reference.to_string(),
            message: format!("{entity_id}.{field} refers to missing {reference}"),
        });
    }

    let mut violations = Vec::new();
    for record in records {
        match record {
            Record::Epic(_) => {}
            Record::Issue(issue) => {
                if !epic_ids.contains(issue.epic_id.as_str()) {
                    dangling(&mut violations, &issue.issue_id, "epic_id", &issue.epic_id);
                }
            }
            Record::Task(task) => {
                match issues.get(task.issue_id.as_str()) {
                    None => dangling(&mut violations, &task.task_id, "issue_id", &task.issue_id),
                    Some(parent) => {
                        // Denormalization consistency: the task's epic must
                        // be its parent issue's epic.
                        if parent.epic_id != task.epic_id {
                            violations.push(IntegrityViolation {
                                entity_id: task.task_id.clone(),
                                field: "epic_id".to_string(),
                                reference: task.epic_id.clone(),
                                message: format!(
                                    "{}.epic_id is {} but parent issue {} belongs to {}",
                                    task.task_id, task.epic_id, parent.issue_id, parent.epic_id
                                ),
                            });
                        }
                    }
                }
                if !epic_ids.contains(task.epic_id.as_str()) {
                    dangling(&mut violations, &task.task_id, "epic_id", &task.epic_id);
                }
                if let Some(parent_task) = &task.parent_task {
                    if !task_ids.contains(parent_task.as_str()) {
                        dangling(&mut violations, &task.task_id, "parent_task", parent_task);
                    }
                }
            }
            Record::PullRequest(pr) => {
                if !issues.contains_key(pr.issue_id.as_str()) {
                    dangling(&mut violations, &pr.pr_id, "issue_id", &pr.issue_id);
                }
            }
        }

        for (field, ids) in record.cross_links() {
            for id in ids {
                if !all_ids.contains(id.as_str()) {
                    dangling(&mut violations, record.id(), field, id);
                }
            }
        }

        if record.updated_date() < record.created_date() {
            violations.push(IntegrityViolation {
                entity_id: record.id().to_string(),
                field: "updated_date".to_string(),
                reference: String::new(),
                message: format!("{}.updated_date precedes created_date", record.id()),
            });
        }
    }

    violations
}
