//! Index/cache manager.
//!
//! The index is a denormalized snapshot mapping `(kind, id)` to summary
//! fields and the record's file path, kept at `.trackdown/index.json` so
//! queries don't re-parse every record file. It is a performance cache,
//! not the source of truth: the record files always win, and any detected
//! discrepancy is answered by rebuilding from a full scan. An absent,
//! corrupt, or version-skewed index is a recoverable "needs rebuild"
//! condition, never a fatal error.
//!
//! Rebuilds write to a temporary file and atomically rename it into place,
//! so an interrupted rebuild leaves the previous index intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::{PROJECT_DIR, ResolvedPaths};
use crate::models::{EntityKind, Priority, Record, Status};
use crate::scanner::{self, ScanWarning};
use crate::{Error, Result};

/// Index file name inside the project dot-directory.
pub const INDEX_FILE: &str = "index.json";

/// Current index schema version. Anything else on disk means rebuild.
pub const SCHEMA_VERSION: u32 = 1;

/// Summary of one record, enough for filtered listings without opening
/// the underlying file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub kind: EntityKind,
    pub path: PathBuf,
    pub title: String,
    pub status: Status,
    pub priority: Priority,
    pub assignee: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Owning epic id (issues and tasks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<String>,
    /// Owning issue id (tasks and PRs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
    /// File mtime in unix seconds at indexing time
    pub mtime_secs: i64,
}

impl IndexEntry {
    /// Build an entry from a decoded record, stamping the file mtime.
    pub fn from_record(record: &Record) -> Self {
        let mtime_secs = fs::metadata(record.file_path())
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let (epic_id, issue_id) = match record {
            Record::Epic(_) => (None, None),
            Record::Issue(i) => (Some(i.epic_id.clone()), None),
            Record::Task(t) => (Some(t.epic_id.clone()), Some(t.issue_id.clone())),
            Record::PullRequest(p) => (None, Some(p.issue_id.clone())),
        };

        Self {
            id: record.id().to_string(),
            kind: record.kind(),
            path: record.file_path().to_path_buf(),
            title: record.title().to_string(),
            status: record.status(),
            priority: record.priority(),
            assignee: record.assignee().to_string(),
            tags: record.tags().to_vec(),
            epic_id,
            issue_id,
            created_date: record.created_date(),
            updated_date: record.updated_date(),
            mtime_secs,
        }
    }
}

/// The serialized index artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub entries: BTreeMap<EntityKind, BTreeMap<String, IndexEntry>>,
}

impl IndexFile {
    fn empty() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }

    /// All entries of one kind, if any.
    pub fn kind_entries(&self, kind: EntityKind) -> Option<&BTreeMap<String, IndexEntry>> {
        self.entries.get(&kind)
    }

    /// Look up a single entry.
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&IndexEntry> {
        self.entries.get(&kind).and_then(|m| m.get(id))
    }

    /// Total entry count across all kinds.
    pub fn len(&self) -> usize {
        self.entries.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of loading the index from disk.
#[derive(Debug)]
pub enum IndexState {
    /// Usable index
    Ready(IndexFile),
    /// Absent, corrupt, or version-skewed; carry the reason
    NeedsRebuild(String),
}

/// Outcome of a full rebuild.
#[derive(Debug)]
pub struct RebuildReport {
    /// Entries written to the fresh index
    pub indexed: usize,
    /// Per-file decode failures encountered during the scan
    pub warnings: Vec<ScanWarning>,
}

/// Health-check result for the index.
#[derive(Debug, Serialize)]
pub struct IndexHealth {
    pub healthy: bool,
    /// Human-readable findings; empty when healthy
    pub issues: Vec<String>,
}

/// Manages the index artifact for one project.
#[derive(Debug)]
pub struct IndexManager {
    paths: ResolvedPaths,
}

impl IndexManager {
    pub fn new(paths: ResolvedPaths) -> Self {
        Self { paths }
    }

    /// Path of the index artifact.
    pub fn index_path(&self) -> PathBuf {
        self.paths.project_root.join(PROJECT_DIR).join(INDEX_FILE)
    }

    /// Load the index. Every failure mode short of an I/O error on an
    /// existing, readable file is reported as `NeedsRebuild`.
    pub fn load(&self) -> Result<IndexState> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(IndexState::NeedsRebuild("index file missing".to_string()));
        }
        let text = fs::read_to_string(&path)?;
        let index: IndexFile = match serde_json::from_str(&text) {
            Ok(index) => index,
            Err(e) => {
                return Ok(IndexState::NeedsRebuild(format!("index unparsable: {e}")));
            }
        };
        if index.schema_version != SCHEMA_VERSION {
            return Ok(IndexState::NeedsRebuild(format!(
                "unrecognized index schema version {}",
                index.schema_version
            )));
        }
        Ok(IndexState::Ready(index))
    }

    /// Load a usable index, rebuilding first when the on-disk one is
    /// absent, corrupt, or version-skewed.
    pub fn load_or_rebuild(&self) -> Result<IndexFile> {
        match self.load()? {
            IndexState::Ready(index) => Ok(index),
            IndexState::NeedsRebuild(reason) => {
                debug!(reason, "rebuilding index");
                self.rebuild()?;
                match self.load()? {
                    IndexState::Ready(index) => Ok(index),
                    IndexState::NeedsRebuild(reason) => Err(Error::IndexInconsistent(format!(
                        "rebuild did not produce a loadable index: {reason}"
                    ))),
                }
            }
        }
    }

    /// Re-decode one record file and upsert its entry. Idempotent: with no
    /// intervening file change, a second call writes an identical entry.
    pub fn update_item(&self, kind: EntityKind, id: &str) -> Result<()> {
        let mut index = self.load_or_rebuild()?;

        let path = match index.get(kind, id) {
            Some(entry) => entry.path.clone(),
            None => self
                .locate_record_file(kind, id)?
                .ok_or_else(|| Error::NotFound(id.to_string()))?,
        };

        let record = crate::codec::decode_file(&path, Some(kind))?;
        self.upsert_into(&mut index, &record);
        self.write_atomic(&index)
    }

    /// Upsert an already-decoded record. Used by the store after writes so
    /// the file isn't parsed twice.
    pub fn upsert_record(&self, record: &Record) -> Result<()> {
        let mut index = self.load_or_rebuild()?;
        self.upsert_into(&mut index, record);
        self.write_atomic(&index)
    }

    /// Drop an entry without touching the underlying file (which is
    /// expected to be already gone).
    pub fn remove_item(&self, kind: EntityKind, id: &str) -> Result<()> {
        let mut index = match self.load()? {
            IndexState::Ready(index) => index,
            // Nothing to remove from; the next rebuild won't see the file.
            IndexState::NeedsRebuild(_) => return Ok(()),
        };
        if let Some(entries) = index.entries.get_mut(&kind) {
            entries.remove(id);
        }
        self.write_atomic(&index)
    }

    /// Full rebuild: scan every category and atomically replace the index.
    pub fn rebuild(&self) -> Result<RebuildReport> {
        let mut index = IndexFile::empty();
        let mut warnings = Vec::new();

        for (kind, dir) in self.paths.record_dirs() {
            let outcome = scanner::scan(&dir, kind, &self.paths.config.file_extension)?;
            warnings.extend(outcome.warnings);
            let entries = index.entries.entry(kind).or_default();
            for record in &outcome.records {
                entries.insert(record.id().to_string(), IndexEntry::from_record(record));
            }
        }

        let indexed = index.len();
        self.write_atomic(&index)?;
        debug!(indexed, "index rebuilt");
        Ok(RebuildReport { indexed, warnings })
    }

    /// Lightweight health check: the index exists, parses, and its entry
    /// count per category matches a cheap file-count probe. A mismatch is
    /// reported for a caller-driven rebuild, never patched in place.
    pub fn validate(&self) -> Result<IndexHealth> {
        let index = match self.load()? {
            IndexState::Ready(index) => index,
            IndexState::NeedsRebuild(reason) => {
                return Ok(IndexHealth {
                    healthy: false,
                    issues: vec![reason],
                });
            }
        };

        let mut issues = Vec::new();
        for (kind, dir) in self.paths.record_dirs() {
            let on_disk = scanner::count_files(&dir, &self.paths.config.file_extension)?;
            let indexed = index.kind_entries(kind).map(|m| m.len()).unwrap_or(0);
            if on_disk != indexed {
                issues.push(format!(
                    "{kind}: {indexed} indexed, {on_disk} file(s) on disk"
                ));
            }
        }

        Ok(IndexHealth {
            healthy: issues.is_empty(),
            issues,
        })
    }

    fn upsert_into(&self, index: &mut IndexFile, record: &Record) {
        index
            .entries
            .entry(record.kind())
            .or_default()
            .insert(record.id().to_string(), IndexEntry::from_record(record));
    }

    /// Find a record file by id using the `<ID>-<slug>.<ext>` naming
    /// convention, without decoding anything.
    fn locate_record_file(&self, kind: EntityKind, id: &str) -> Result<Option<PathBuf>> {
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

    /// Serialize and atomically swap the index into place.
    fn write_atomic(&self, index: &IndexFile) -> Result<()> {
        let path = self.index_path();
        let dir = path
            .parent()
            .ok_or_else(|| Error::IndexInconsistent("index path has no parent".to_string()))?;
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, index)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&path).map_err(|e| {
            warn!(error = %e, "failed to swap index into place");
            Error::Io(e.error)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::config::{ProjectConfig, ResolveContext, resolve_paths};
    use crate::models::{Epic, Issue};
    use tempfile::TempDir;

    fn setup() -> (TempDir, IndexManager) {
        let dir = TempDir::new().unwrap();
        let ctx = ResolveContext::new(dir.path().to_path_buf(), None, None);
        let paths = resolve_paths(&ctx, &ProjectConfig::default());
        for (_, d) in paths.record_dirs() {
            fs::create_dir_all(d).unwrap();
        }
        (dir, IndexManager::new(paths))
    }

    fn write_epic(manager: &IndexManager, seq: u32) -> PathBuf {
        let epic = Epic::new(format!("EP-{seq:04}"), format!("Epic {seq}"));
        let path = manager
            .paths
            .category_dir(EntityKind::Epic)
            .join(format!("EP-{seq:04}-epic-{seq}.md"));
        fs::write(&path, encode(&Record::Epic(epic)).unwrap()).unwrap();
        path
    }

    fn write_issue(manager: &IndexManager, seq: u32) -> PathBuf {
        let issue = Issue::new(
            format!("ISS-{seq:04}"),
            format!("Issue {seq}"),
            "EP-0001".to_string(),
        );
        let path = manager
            .paths
            .category_dir(EntityKind::Issue)
            .join(format!("ISS-{seq:04}-issue-{seq}.md"));
        fs::write(&path, encode(&Record::Issue(issue)).unwrap()).unwrap();
        path
    }

    // ==================== Load states ====================

    #[test]
    fn test_missing_index_needs_rebuild() {
        let (_dir, manager) = setup();
        assert!(matches!(
            manager.load().unwrap(),
            IndexState::NeedsRebuild(_)
        ));
    }

    #[test]
    fn test_corrupt_index_needs_rebuild_not_error() {
        let (_dir, manager) = setup();
        fs::create_dir_all(manager.index_path().parent().unwrap()).unwrap();
        fs::write(manager.index_path(), "{not json").unwrap();
        match manager.load().unwrap() {
            IndexState::NeedsRebuild(reason) => assert!(reason.contains("unparsable")),
            other => panic!("expected NeedsRebuild, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_schema_version_needs_rebuild() {
        let (_dir, manager) = setup();
        manager.rebuild().unwrap();

        let text = fs::read_to_string(manager.index_path()).unwrap();
        let bumped = text.replace(
            &format!("\"schema_version\": {SCHEMA_VERSION}"),
            "\"schema_version\": 999",
        );
        assert_ne!(text, bumped);
        fs::write(manager.index_path(), bumped).unwrap();

        match manager.load().unwrap() {
            IndexState::NeedsRebuild(reason) => assert!(reason.contains("999")),
            other => panic!("expected NeedsRebuild, got {other:?}"),
        }
    }

    // ==================== Rebuild + validate ====================

    #[test]
    fn test_rebuild_then_validate_is_healthy() {
        let (_dir, manager) = setup();
        write_epic(&manager, 1);
        write_issue(&manager, 1);
        write_issue(&manager, 2);

        let report = manager.rebuild().unwrap();
        assert_eq!(report.indexed, 3);
        assert!(report.warnings.is_empty());

        let health = manager.validate().unwrap();
        assert!(health.healthy, "issues: {:?}", health.issues);
    }

    #[test]
    fn test_rebuild_records_scan_warnings() {
        let (_dir, manager) = setup();
        write_issue(&manager, 1);
        fs::write(
            manager
                .paths
                .category_dir(EntityKind::Issue)
                .join("ISS-0009-broken.md"),
            "no frontmatter here",
        )
        .unwrap();

        let report = manager.rebuild().unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_validate_detects_count_drift() {
        let (_dir, manager) = setup();
        write_issue(&manager, 1);
        manager.rebuild().unwrap();

        // A record created behind the index's back
        write_issue(&manager, 2);

        let health = manager.validate().unwrap();
        assert!(!health.healthy);
        assert_eq!(health.issues.len(), 1);
        assert!(health.issues[0].contains("issue"));
    }

    // ==================== Incremental updates ====================

    #[test]
    fn test_update_item_is_idempotent() {
        let (_dir, manager) = setup();
        write_issue(&manager, 1);
        manager.rebuild().unwrap();

        manager.update_item(EntityKind::Issue, "ISS-0001").unwrap();
        let first = match manager.load().unwrap() {
            IndexState::Ready(index) => index.get(EntityKind::Issue, "ISS-0001").cloned(),
            _ => panic!("index should be ready"),
        };

        manager.update_item(EntityKind::Issue, "ISS-0001").unwrap();
        let second = match manager.load().unwrap() {
            IndexState::Ready(index) => index.get(EntityKind::Issue, "ISS-0001").cloned(),
            _ => panic!("index should be ready"),
        };

        assert_eq!(first, second);
    }

    #[test]
    fn test_update_item_picks_up_new_file() {
        let (_dir, manager) = setup();
        manager.rebuild().unwrap();

        // File created after the rebuild; update_item locates it by name.
        write_issue(&manager, 7);
        manager.update_item(EntityKind::Issue, "ISS-0007").unwrap();

        match manager.load().unwrap() {
            IndexState::Ready(index) => {
                assert!(index.get(EntityKind::Issue, "ISS-0007").is_some())
            }
            _ => panic!("index should be ready"),
        }
    }

    #[test]
    fn test_update_item_unknown_id_is_not_found() {
        let (_dir, manager) = setup();
        manager.rebuild().unwrap();
        let err = manager
            .update_item(EntityKind::Issue, "ISS-9999")
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_remove_item_leaves_file_alone() {
        let (_dir, manager) = setup();
        let path = write_issue(&manager, 1);
        manager.rebuild().unwrap();

        manager.remove_item(EntityKind::Issue, "ISS-0001").unwrap();
        match manager.load().unwrap() {
            IndexState::Ready(index) => {
                assert!(index.get(EntityKind::Issue, "ISS-0001").is_none())
            }
            _ => panic!("index should be ready"),
        }
        // remove_item never touches the record file
        assert!(path.exists());
    }

    #[test]
    fn test_load_or_rebuild_recovers_from_corruption() {
        let (_dir, manager) = setup();
        write_issue(&manager, 1);
        fs::create_dir_all(manager.index_path().parent().unwrap()).unwrap();
        fs::write(manager.index_path(), "garbage").unwrap();

        let index = manager.load_or_rebuild().unwrap();
        assert_eq!(index.len(), 1);
    }
}
