//! Store: record lifecycle on top of the codec, paths, and index.
//!
//! The directory tree is the database: each record occupies one file slot
//! addressed by its id, and the index is a derived, rebuildable view.
//! Multi-step mutations ("create task, append to the parent's list") are
//! two independent single-file writes, each safe to retry, with an index
//! rebuild as the consistency backstop. Nothing here assumes atomic
//! multi-file operations.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codec::{self, RecordPatch};
use crate::config::{
    ProjectConfig, ResolveContext, ResolvedPaths, PROJECT_DIR, resolve_paths, validate_structure,
};
use crate::index::{IndexEntry, IndexManager, IndexState};
use crate::models::{
    EntityKind, Epic, Issue, PrStatus, Priority, PullRequest, Record, Task, workflow,
};
use crate::scanner::{self, ScanOutcome};
use crate::{Error, Result};

/// Fallback body skeleton when no template file is present.
const DEFAULT_BODY: &str = "\n## Overview\n\n## Notes\n";

/// Optional attributes applied at record creation.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub assignee: Option<String>,
    pub tags: Vec<String>,
    pub estimated_tokens: Option<u64>,
}

/// A store bound to one project's resolved layout.
#[derive(Debug)]
pub struct Store {
    paths: ResolvedPaths,
    index: IndexManager,
}

impl Store {
    /// Initialize a project: persist the config, create the category
    /// directories, and write a fresh (empty) index.
    pub fn init(ctx: ResolveContext, config: ProjectConfig) -> Result<Self> {
        config.save(ctx.project_root())?;
        let paths = resolve_paths(&ctx, &config);

        for (_, dir) in paths.record_dirs() {
            fs::create_dir_all(dir)?;
        }
        fs::create_dir_all(&paths.templates_dir)?;

        let index = IndexManager::new(paths.clone());
        index.rebuild()?;

        debug!(root = %paths.tasks_root.display(), "initialized store");
        Ok(Self { paths, index })
    }

    /// Open an initialized project. The config dot-directory must exist;
    /// an ambiguous directory layout (legacy structure alongside the
    /// resolved one) is an error, never guessed around.
    pub fn open(ctx: ResolveContext) -> Result<Self> {
        let store = Self::open_unchecked(ctx)?;
        validate_structure(&store.paths).ensure_unambiguous()?;
        Ok(store)
    }

    /// Open without the ambiguity guard. For diagnostic commands that must
    /// be able to report a broken layout instead of refusing to start.
    pub fn open_unchecked(ctx: ResolveContext) -> Result<Self> {
        if !ctx.project_root().join(PROJECT_DIR).is_dir() {
            return Err(Error::NotInitialized);
        }
        let config = ProjectConfig::load(ctx.project_root())?;
        let paths = resolve_paths(&ctx, &config);
        let index = IndexManager::new(paths.clone());
        Ok(Self { paths, index })
    }

    /// Whether a project is initialized under the context's root.
    pub fn exists(ctx: &ResolveContext) -> bool {
        ctx.project_root().join(PROJECT_DIR).is_dir()
    }

    pub fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    pub fn index(&self) -> &IndexManager {
        &self.index
    }

    // ==================== Creation ====================

    /// Create an epic.
    pub fn create_epic(&self, title: &str, opts: &CreateOptions) -> Result<Epic> {
        let id = self.next_id(EntityKind::Epic)?;
        let mut epic = Epic::new(id, title.to_string());
        set_common(
            &mut epic.description,
            &mut epic.priority,
            &mut epic.assignee,
            &mut epic.tags,
            &mut epic.estimated_tokens,
            opts,
        );
        epic.body = self.body_for(EntityKind::Epic);

        let record = Record::Epic(epic);
        let record = self.write_new(record)?;
        match record {
            Record::Epic(e) => Ok(e),
            _ => unreachable!(),
        }
    }

    /// Create an issue owned by an existing epic. Appends the new id to
    /// the epic's `related_issues` cache as a second, independent write.
    pub fn create_issue(&self, title: &str, epic_id: &str, opts: &CreateOptions) -> Result<Issue> {
        let parent = self.get(epic_id)?;
        let Record::Epic(parent_epic) = parent else {
            return Err(Error::InvalidInput(format!(
                "{epic_id} is not an epic"
            )));
        };

        let id = self.next_id(EntityKind::Issue)?;
        let mut issue = Issue::new(id, title.to_string(), epic_id.to_string());
        set_common(
            &mut issue.description,
            &mut issue.priority,
            &mut issue.assignee,
            &mut issue.tags,
            &mut issue.estimated_tokens,
            opts,
        );
        issue.body = self.body_for(EntityKind::Issue);

        let record = self.write_new(Record::Issue(issue))?;
        self.append_to_list(&parent_epic.file_path, "related_issues", record.id())?;
        match record {
            Record::Issue(i) => Ok(i),
            _ => unreachable!(),
        }
    }

    /// Create a task owned by an existing issue. The denormalized
    /// `epic_id` is taken from the parent issue, never from the caller.
    pub fn create_task(
        &self,
        title: &str,
        issue_id: &str,
        parent_task: Option<&str>,
        opts: &CreateOptions,
    ) -> Result<Task> {
        let parent = self.get(issue_id)?;
        let Record::Issue(parent_issue) = parent else {
            return Err(Error::InvalidInput(format!("{issue_id} is not an issue")));
        };

        let parent_task_path = match parent_task {
            None => None,
            Some(pt_id) => {
                let Record::Task(pt) = self.get(pt_id)? else {
                    return Err(Error::InvalidInput(format!("{pt_id} is not a task")));
                };
                if pt.issue_id != issue_id {
                    return Err(Error::InvalidInput(format!(
                        "parent task {pt_id} belongs to {}, not {issue_id}",
                        pt.issue_id
                    )));
                }
                Some(pt.file_path)
            }
        };

        let id = self.next_id(EntityKind::Task)?;
        let mut task = Task::new(
            id,
            title.to_string(),
            issue_id.to_string(),
            parent_issue.epic_id.clone(),
        );
        task.parent_task = parent_task.map(String::from);
        set_common(
            &mut task.description,
            &mut task.priority,
            &mut task.assignee,
            &mut task.tags,
            &mut task.estimated_tokens,
            opts,
        );
        task.body = self.body_for(EntityKind::Task);

        let record = self.write_new(Record::Task(task))?;
        self.append_to_list(&parent_issue.file_path, "related_tasks", record.id())?;
        if let Some(path) = parent_task_path {
            self.append_to_list(&path, "subtasks", record.id())?;
        }
        match record {
            Record::Task(t) => Ok(t),
            _ => unreachable!(),
        }
    }

    /// Create a PR record owned by an existing issue.
    pub fn create_pr(
        &self,
        title: &str,
        issue_id: &str,
        branch_name: Option<String>,
        opts: &CreateOptions,
    ) -> Result<PullRequest> {
        let parent = self.get(issue_id)?;
        let Record::Issue(parent_issue) = parent else {
            return Err(Error::InvalidInput(format!("{issue_id} is not an issue")));
        };

        let id = self.next_id(EntityKind::PullRequest)?;
        let mut pr = PullRequest::new(id, title.to_string(), issue_id.to_string());
        pr.branch_name = branch_name;
        set_common(
            &mut pr.description,
            &mut pr.priority,
            &mut pr.assignee,
            &mut pr.tags,
            &mut pr.estimated_tokens,
            opts,
        );
        pr.body = self.body_for(EntityKind::PullRequest);

        let record = self.write_new(Record::PullRequest(pr))?;
        self.append_to_list(&parent_issue.file_path, "related_prs", record.id())?;
        match record {
            Record::PullRequest(p) => Ok(p),
            _ => unreachable!(),
        }
    }

    // ==================== Lookup ====================

    /// Look up a record by id. The kind comes from the id prefix; the
    /// index supplies the path but the file always wins.
    pub fn get(&self, id: &str) -> Result<Record> {
        let kind = self.kind_of_id(id)?;

        if let IndexState::Ready(index) = self.index.load()? {
            if let Some(entry) = index.get(kind, id) {
                match codec::decode_file(&entry.path, Some(kind)) {
                    Ok(record) if record.id() == id => return Ok(record),
                    Ok(_) | Err(_) => {
                        // Entry points at a missing or repurposed file;
                        // fall back to the directory and schedule a rebuild.
                        warn!(id, "stale index entry; rebuilding");
                        self.index.rebuild()?;
                    }
                }
            }
        }

        let path = self
            .locate(kind, id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        codec::decode_file(&path, Some(kind))
    }

    /// All records, decoded from the files (the source of truth), plus
    /// any scan warnings.
    pub fn load_all(&self) -> Result<ScanOutcome> {
        scanner::scan_all(&self.paths)
    }

    /// Record summaries from the index fast path. A failed health probe
    /// triggers a rebuild before answering, so stale data is never
    /// returned silently.
    pub fn summaries(&self) -> Result<Vec<IndexEntry>> {
        let health = self.index.validate()?;
        if !health.healthy {
            warn!(issues = ?health.issues, "index out of date; rebuilding");
            self.index.rebuild()?;
        }
        let index = self.index.load_or_rebuild()?;
        Ok(index
            .entries
            .values()
            .flat_map(|m| m.values().cloned())
            .collect())
    }

    // ==================== Mutation ====================

    /// Apply a partial update to a record and refresh its index entry.
    pub fn update(&self, id: &str, patch: &RecordPatch) -> Result<Record> {
        let current = self.get(id)?;
        let updated = codec::update(current.file_path(), patch)?;
        self.index.upsert_record(&updated)?;
        Ok(updated)
    }

    /// Delete a record: remove the file, drop the index entry, and scrub
    /// the id from its parent's cache list.
    pub fn delete(&self, id: &str) -> Result<()> {
        let record = self.get(id)?;
        fs::remove_file(record.file_path())?;
        self.index.remove_item(record.kind(), id)?;

        let parent_cleanup: Option<(&str, &str)> = match &record {
            Record::Epic(_) => None,
            Record::Issue(i) => Some((i.epic_id.as_str(), "related_issues")),
            Record::Task(t) => Some((t.issue_id.as_str(), "related_tasks")),
            Record::PullRequest(p) => Some((p.issue_id.as_str(), "related_prs")),
        };
        if let Some((parent_id, field)) = parent_cleanup {
            // The parent may itself be gone; a dangling cache entry is
            // what the doctor is for.
            if let Ok(parent) = self.get(parent_id) {
                self.remove_from_list(parent.file_path(), field, id)?;
            }
        }
        if let Record::Task(t) = &record {
            if let Some(parent_task) = &t.parent_task {
                if let Ok(parent) = self.get(parent_task) {
                    self.remove_from_list(parent.file_path(), "subtasks", id)?;
                }
            }
        }
        Ok(())
    }

    /// Transition a PR's review status, returning the updated record and
    /// any business-rule warnings. Nothing is written when the check
    /// fails.
    pub fn transition_pr(
        &self,
        id: &str,
        to: PrStatus,
        bypass_rules: bool,
    ) -> Result<(PullRequest, Vec<String>)> {
        let Record::PullRequest(pr) = self.get(id)? else {
            return Err(Error::InvalidInput(format!("{id} is not a PR")));
        };

        let check = workflow::check_transition(&pr, to, bypass_rules)?;
        let patch = RecordPatch::new().set("pr_status", to)?;
        let updated = codec::update(&pr.file_path, &patch)?;
        self.index.upsert_record(&updated)?;

        match updated {
            Record::PullRequest(p) => Ok((p, check.warnings)),
            _ => unreachable!(),
        }
    }

    // ==================== Id allocation ====================

    /// Next id for a kind: max existing sequence + 1, read from the file
    /// names in the category directory (files win over the index).
    pub fn next_id(&self, kind: EntityKind) -> Result<String> {
        let dir = self.paths.category_dir(kind);
        let prefix = format!("{}-", self.paths.config.id_prefix(kind));
        let mut max_seq = 0u64;

        if dir.is_dir() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let name = entry.file_name();
                let Some(stem) = name.to_str() else { continue };
                if let Some(rest) = stem.strip_prefix(&prefix) {
                    if let Some(seq) = rest.split('-').next().and_then(|s| s.parse().ok()) {
                        max_seq = max_seq.max(seq);
                    }
                }
            }
        }

        Ok(self.paths.config.format_id(kind, max_seq + 1))
    }

    /// The entity kind an id belongs to, by configured prefix. When
    /// prefixes nest (e.g. "EP" and "EPIC"), the longest match wins.
    pub fn kind_of_id(&self, id: &str) -> Result<EntityKind> {
        EntityKind::all()
            .iter()
            .filter(|&&kind| self.paths.config.parse_seq(kind, id).is_some())
            .max_by_key(|&&kind| self.paths.config.id_prefix(kind).len())
            .copied()
            .ok_or_else(|| Error::InvalidId(id.to_string()))
    }

    // ==================== Internals ====================

    /// Write a brand-new record file and register it in the index.
    fn write_new(&self, mut record: Record) -> Result<Record> {
        let dir = self.paths.category_dir(record.kind());
        fs::create_dir_all(&dir)?;
        let file_name = format!(
            "{}-{}.{}",
            record.id(),
            slugify(record.title()),
            self.paths.config.file_extension
        );
        record.set_file_path(dir.join(file_name));

        fs::write(record.file_path(), codec::encode(&record)?)?;
        self.index.upsert_record(&record)?;
        Ok(record)
    }

    /// Body skeleton for a new record: `templates/<kind>.md` when present,
    /// a minimal default otherwise.
    fn body_for(&self, kind: EntityKind) -> String {
        let template = self
            .paths
            .templates_dir
            .join(format!("{kind}.{}", self.paths.config.file_extension));
        match fs::read_to_string(&template) {
            Ok(body) => body,
            Err(_) => DEFAULT_BODY.to_string(),
        }
    }

    /// Find a record file by the `<ID>-<slug>.<ext>` naming convention.
    fn locate(&self, kind: EntityKind, id: &str) -> Result<Option<PathBuf>> {
        let dir = self.paths.category_dir(kind);
        if !dir.is_dir() {
            return Ok(None);
        }
        let prefix = format!("{id}-");
        let suffix = format!(".{}", self.paths.config.file_extension);
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(&suffix) {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    fn append_to_list(&self, path: &Path, field: &str, id: &str) -> Result<()> {
        let record = codec::decode_file(path, None)?;
        let mut list = list_field(&record, field);
        if list.iter().any(|existing| existing == id) {
            return Ok(());
        }
        list.push(id.to_string());
        let patch = RecordPatch::new().set(field, list)?;
        let updated = codec::update(path, &patch)?;
        self.index.upsert_record(&updated)
    }

    fn remove_from_list(&self, path: &Path, field: &str, id: &str) -> Result<()> {
        let record = codec::decode_file(path, None)?;
        let mut list = list_field(&record, field);
        let before = list.len();
        list.retain(|existing| existing != id);
        if list.len() == before {
            return Ok(());
        }
        let patch = RecordPatch::new().set(field, list)?;
        let updated = codec::update(path, &patch)?;
        self.index.upsert_record(&updated)
    }
}

fn list_field(record: &Record, field: &str) -> Vec<String> {
    match (record, field) {
        (Record::Epic(e), "related_issues") => e.related_issues.clone(),
        (Record::Issue(i), "related_tasks") => i.related_tasks.clone(),
        (Record::Issue(i), "related_prs") => i.related_prs.clone(),
        (Record::Task(t), "subtasks") => t.subtasks.clone(),
        _ => Vec::new(),
    }
}

fn set_common(
    description: &mut String,
    priority: &mut Priority,
    assignee: &mut String,
    tags: &mut Vec<String>,
    estimated_tokens: &mut u64,
    opts: &CreateOptions,
) {
    if let Some(d) = &opts.description {
        *description = d.clone();
    }
    if let Some(p) = opts.priority {
        *priority = p;
    }
    if let Some(a) = &opts.assignee {
        *assignee = a.clone();
    }
    if !opts.tags.is_empty() {
        *tags = opts.tags.clone();
    }
    if let Some(t) = opts.estimated_tokens {
        *estimated_tokens = t;
    }
}

/// Lowercased ASCII slug of a title for file names: alphanumerics kept,
/// everything else collapsed to single dashes, capped at 40 chars.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= 40 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}
