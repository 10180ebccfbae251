//! Command implementations for the trackdown CLI.
//!
//! Each handler returns a JSON value; `main` renders it as JSON (the
//! default) or a human-readable form. Handlers never print.

use serde_json::{Value, json};

use crate::codec::RecordPatch;
use crate::config::{ProjectConfig, ResolveContext, resolve_paths, validate_structure};
use crate::models::{EntityKind, PrStatus, Priority, Status};
use crate::query::{self, SearchFilters, SortKey, SortOrder};
use crate::store::{CreateOptions, Store};
use crate::{Error, Result};

/// Arguments to the `list` command, parsed from CLI strings here so the
/// CLI layer stays declarative.
#[derive(Debug, Default)]
pub struct ListArgs {
    pub kind: Option<String>,
    pub status: Vec<String>,
    pub priority: Vec<String>,
    pub assignee: Option<String>,
    pub tags: Vec<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub reverse: bool,
}

/// Field updates for the `update` command.
#[derive(Debug, Default)]
pub struct UpdateArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub tags: Vec<String>,
    pub estimate: Option<u64>,
    pub actual: Option<u64>,
}

fn parse<T: std::str::FromStr<Err = String>>(value: &str) -> Result<T> {
    value.parse().map_err(Error::InvalidInput)
}

/// Initialize a project, optionally persisting a non-default tasks root.
pub fn init(ctx: ResolveContext, root: Option<String>) -> Result<Value> {
    let mut config = ProjectConfig::default();
    config.tasks_root = root;
    let store = Store::init(ctx, config)?;
    let paths = store.paths();
    Ok(json!({
        "initialized": true,
        "tasks_root": paths.tasks_root,
        "categories": paths
            .record_dirs()
            .iter()
            .map(|(kind, dir)| json!({ "kind": kind.to_string(), "dir": dir }))
            .collect::<Vec<_>>(),
    }))
}

/// Create an epic.
pub fn create_epic(store: &Store, title: &str, opts: &CreateOptions) -> Result<Value> {
    let epic = store.create_epic(title, opts)?;
    Ok(json!({ "created": epic.epic_id, "path": epic.file_path }))
}

/// Create an issue under an epic.
pub fn create_issue(
    store: &Store,
    title: &str,
    epic_id: &str,
    opts: &CreateOptions,
) -> Result<Value> {
    let issue = store.create_issue(title, epic_id, opts)?;
    Ok(json!({ "created": issue.issue_id, "epic_id": issue.epic_id, "path": issue.file_path }))
}

/// Create a task under an issue.
pub fn create_task(
    store: &Store,
    title: &str,
    issue_id: &str,
    parent_task: Option<&str>,
    opts: &CreateOptions,
) -> Result<Value> {
    let task = store.create_task(title, issue_id, parent_task, opts)?;
    Ok(json!({
        "created": task.task_id,
        "issue_id": task.issue_id,
        "epic_id": task.epic_id,
        "path": task.file_path,
    }))
}

/// Create a PR record under an issue.
pub fn create_pr(
    store: &Store,
    title: &str,
    issue_id: &str,
    branch: Option<String>,
    opts: &CreateOptions,
) -> Result<Value> {
    let pr = store.create_pr(title, issue_id, branch, opts)?;
    Ok(json!({
        "created": pr.pr_id,
        "issue_id": pr.issue_id,
        "pr_status": pr.pr_status.to_string(),
        "path": pr.file_path,
    }))
}

/// Parse CLI create attributes into store options.
pub fn create_options(
    description: Option<String>,
    priority: Option<String>,
    assignee: Option<String>,
    tags: Vec<String>,
    estimate: Option<u64>,
) -> Result<CreateOptions> {
    let priority = priority.as_deref().map(parse::<Priority>).transpose()?;
    Ok(CreateOptions {
        description,
        priority,
        assignee,
        tags,
        estimated_tokens: estimate,
    })
}

/// Show one record, body included.
pub fn show(store: &Store, id: &str) -> Result<Value> {
    let record = store.get(id)?;
    let mut value = serde_json::to_value(&record)?;
    if let Value::Object(map) = &mut value {
        map.insert("kind".to_string(), json!(record.kind().to_string()));
        map.insert("body".to_string(), json!(record.body()));
        map.insert("path".to_string(), json!(record.file_path()));
    }
    Ok(value)
}

/// List records. Listings without a text filter are answered from the
/// index; text search reads the record files since bodies are not indexed.
pub fn list(store: &Store, args: ListArgs) -> Result<Value> {
    let kind = args.kind.as_deref().map(parse::<EntityKind>).transpose()?;
    let filters = SearchFilters {
        status: args
            .status
            .iter()
            .map(|s| parse::<Status>(s))
            .collect::<Result<_>>()?,
        priority: args
            .priority
            .iter()
            .map(|p| parse::<Priority>(p))
            .collect::<Result<_>>()?,
        assignee: args.assignee,
        tags: args.tags,
        text: args.search,
    };
    let sort = match args.sort.as_deref() {
        Some(key) => Some((
            parse::<SortKey>(key)?,
            if args.reverse {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            },
        )),
        None => None,
    };

    if filters.text.is_some() {
        let mut outcome = store.load_all()?;
        if let Some(kind) = kind {
            outcome.records.retain(|r| r.kind() == kind);
        }
        let results = query::search(outcome.records, &filters, sort);
        let items: Vec<Value> = results
            .items
            .iter()
            .map(|r| {
                json!({
                    "id": r.id(),
                    "kind": r.kind().to_string(),
                    "title": r.title(),
                    "status": r.status(),
                    "priority": r.priority(),
                    "assignee": r.assignee(),
                    "tags": r.tags(),
                    "path": r.file_path(),
                })
            })
            .collect();
        Ok(json!({
            "items": items,
            "total_count": results.total_count,
            "warnings": outcome.warnings,
        }))
    } else {
        let mut entries = store.summaries()?;
        if let Some(kind) = kind {
            entries.retain(|e| e.kind == kind);
        }
        let (items, total_count) = query::search_summaries(entries, &filters, sort);
        Ok(json!({ "items": items, "total_count": total_count }))
    }
}

/// Update fields of a record.
pub fn update(store: &Store, id: &str, args: UpdateArgs) -> Result<Value> {
    let mut patch = RecordPatch::new();
    if let Some(title) = args.title {
        patch = patch.set("title", title)?;
    }
    if let Some(description) = args.description {
        patch = patch.set("description", description)?;
    }
    if let Some(status) = args.status {
        patch = patch.set("status", parse::<Status>(&status)?)?;
    }
    if let Some(priority) = args.priority {
        patch = patch.set("priority", parse::<Priority>(&priority)?)?;
    }
    if let Some(assignee) = args.assignee {
        patch = patch.set("assignee", assignee)?;
    }
    if !args.tags.is_empty() {
        patch = patch.set("tags", args.tags)?;
    }
    if let Some(estimate) = args.estimate {
        patch = patch.set("estimated_tokens", estimate)?;
    }
    if let Some(actual) = args.actual {
        patch = patch.set("actual_tokens", actual)?;
    }
    if patch.is_empty() {
        return Err(Error::InvalidInput("no fields to update".to_string()));
    }

    let updated = store.update(id, &patch)?;
    Ok(json!({
        "updated": updated.id(),
        "status": updated.status(),
        "updated_date": updated.updated_date(),
    }))
}

/// Delete a record.
pub fn delete(store: &Store, id: &str) -> Result<Value> {
    store.delete(id)?;
    Ok(json!({ "deleted": id }))
}

/// Resolve an issue's hierarchy: epic, issue, tasks, PRs.
pub fn hierarchy(store: &Store, issue_id: &str) -> Result<Value> {
    let outcome = store.load_all()?;
    let hierarchy = query::issue_hierarchy(&outcome.records, issue_id)?;
    let mut value = serde_json::to_value(&hierarchy)?;
    if let Value::Object(map) = &mut value {
        if !outcome.warnings.is_empty() {
            map.insert("warnings".to_string(), serde_json::to_value(&outcome.warnings)?);
        }
    }
    Ok(value)
}

/// Transition a PR's review status.
pub fn pr_transition(store: &Store, id: &str, to: &str, force: bool) -> Result<Value> {
    let to = parse::<PrStatus>(to)?;
    let (pr, warnings) = store.transition_pr(id, to, force)?;
    Ok(json!({
        "id": pr.pr_id,
        "pr_status": pr.pr_status.to_string(),
        "warnings": warnings,
    }))
}

/// Rebuild the index from a full scan.
pub fn index_rebuild(store: &Store) -> Result<Value> {
    let report = store.index().rebuild()?;
    Ok(json!({ "indexed": report.indexed, "warnings": report.warnings }))
}

/// Validate the index against the record directories.
pub fn index_validate(store: &Store) -> Result<Value> {
    let health = store.index().validate()?;
    Ok(serde_json::to_value(&health)?)
}

/// Full health report: referential integrity, scan warnings, index
/// health, and directory structure. `healthy` is false when anything is
/// off; violations are collected, never thrown one at a time.
pub fn doctor(store: &Store) -> Result<Value> {
    let outcome = store.load_all()?;
    let violations = query::validate_references(&outcome.records);
    let index_health = store.index().validate()?;
    let structure = validate_structure(store.paths());

    let healthy = violations.is_empty()
        && outcome.warnings.is_empty()
        && index_health.healthy
        && structure.valid;

    Ok(json!({
        "healthy": healthy,
        "records": outcome.records.len(),
        "scan_warnings": outcome.warnings,
        "violations": violations,
        "index": index_health,
        "structure": structure,
    }))
}

/// Show the resolved directory layout and each value's source. Works
/// whether or not the project is initialized.
pub fn paths(ctx: ResolveContext) -> Result<Value> {
    let config = ProjectConfig::load(ctx.project_root())?;
    let paths = resolve_paths(&ctx, &config);
    let structure = validate_structure(&paths);

    Ok(json!({
        "project_root": paths.project_root,
        "tasks_root": paths.tasks_root,
        "tasks_root_source": paths.root_name.source.to_string(),
        "categories": paths
            .record_dirs()
            .iter()
            .map(|(kind, dir)| json!({ "kind": kind.to_string(), "dir": dir }))
            .collect::<Vec<_>>(),
        "templates_dir": paths.templates_dir,
        "structure": structure,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;

    fn seeded() -> (TestEnv, Store) {
        let env = TestEnv::new();
        let store = env.init_store();
        let opts = CreateOptions::default();
        let epic = store.create_epic("Checkout", &opts).unwrap();
        let issue = store.create_issue("Rounding", &epic.epic_id, &opts).unwrap();
        store
            .create_task("Fix it", &issue.issue_id, None, &opts)
            .unwrap();
        (env, store)
    }

    #[test]
    fn test_list_uses_index_without_text_filter() {
        let (_env, store) = seeded();
        let value = list(&store, ListArgs::default()).unwrap();
        assert_eq!(value["total_count"], 3);
        // Index-backed listings carry mtime stamps
        assert!(value["items"][0]["mtime_secs"].is_i64());
    }

    #[test]
    fn test_list_kind_and_status_filters() {
        let (_env, store) = seeded();
        let args = ListArgs {
            kind: Some("issue".to_string()),
            ..Default::default()
        };
        let value = list(&store, args).unwrap();
        assert_eq!(value["total_count"], 1);
        assert_eq!(value["items"][0]["id"], "ISS-0001");

        let args = ListArgs {
            status: vec!["completed".to_string()],
            ..Default::default()
        };
        let value = list(&store, args).unwrap();
        assert_eq!(value["total_count"], 0);
    }

    #[test]
    fn test_list_rejects_unknown_status() {
        let (_env, store) = seeded();
        let args = ListArgs {
            status: vec!["done".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            list(&store, args).unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[test]
    fn test_text_search_reads_files() {
        let (_env, store) = seeded();
        let args = ListArgs {
            search: Some("rounding".to_string()),
            ..Default::default()
        };
        let value = list(&store, args).unwrap();
        assert_eq!(value["total_count"], 1);
        assert_eq!(value["items"][0]["id"], "ISS-0001");
    }

    #[test]
    fn test_show_includes_body_and_kind() {
        let (_env, store) = seeded();
        let value = show(&store, "EP-0001").unwrap();
        assert_eq!(value["kind"], "epic");
        assert_eq!(value["epic_id"], "EP-0001");
        assert!(value["body"].as_str().unwrap().contains("## Overview"));
    }

    #[test]
    fn test_hierarchy_scenario() {
        let (_env, store) = seeded();
        let value = hierarchy(&store, "ISS-0001").unwrap();
        assert_eq!(value["epic"]["epic_id"], "EP-0001");
        assert_eq!(value["issue"]["issue_id"], "ISS-0001");
        assert_eq!(value["tasks"][0]["task_id"], "TSK-0001");
        assert_eq!(value["prs"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_doctor_healthy_then_broken() {
        let (_env, store) = seeded();
        let value = doctor(&store).unwrap();
        assert_eq!(value["healthy"], true);

        // Break a reference behind the store's back
        let record = store.get("TSK-0001").unwrap();
        let text = std::fs::read_to_string(record.file_path()).unwrap();
        std::fs::write(
            record.file_path(),
            text.replace("issue_id: ISS-0001", "issue_id: ISS-0404"),
        )
        .unwrap();

        let value = doctor(&store).unwrap();
        assert_eq!(value["healthy"], false);
        assert!(!value["violations"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_update_command_builds_patch() {
        let (_env, store) = seeded();
        let args = UpdateArgs {
            status: Some("active".to_string()),
            estimate: Some(900),
            ..Default::default()
        };
        let value = update(&store, "ISS-0001", args).unwrap();
        assert_eq!(value["updated"], "ISS-0001");
        assert_eq!(value["status"], "active");

        let shown = show(&store, "ISS-0001").unwrap();
        assert_eq!(shown["estimated_tokens"], 900);
    }

    #[test]
    fn test_update_with_no_fields_is_rejected() {
        let (_env, store) = seeded();
        assert!(matches!(
            update(&store, "ISS-0001", UpdateArgs::default()).unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[test]
    fn test_paths_reports_sources() {
        let env = TestEnv::new();
        let value = paths(env.context_with_override("work")).unwrap();
        assert_eq!(value["tasks_root_source"], "override");
        assert!(value["tasks_root"].as_str().unwrap().ends_with("work"));

        let value = paths(env.context()).unwrap();
        assert_eq!(value["tasks_root_source"], "default");
    }
}
