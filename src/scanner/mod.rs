//! Directory scanner: bulk decoding with per-file fault tolerance.
//!
//! A scan attempts to decode every record file in a category directory.
//! Failures are collected as warnings keyed by file path; a single
//! malformed file never aborts the scan. Result ordering is whatever the
//! filesystem yields; callers needing a stable order sort explicitly.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::codec;
use crate::config::ResolvedPaths;
use crate::models::{EntityKind, Record};
use crate::Result;

/// A per-file decode failure recorded during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanWarning {
    /// The file that failed to decode
    pub path: PathBuf,
    /// Why it failed
    pub error: String,
}

/// Successfully decoded records plus the warnings accumulated on the way.
/// Partial success is a first-class outcome.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub records: Vec<Record>,
    pub warnings: Vec<ScanWarning>,
}

impl ScanOutcome {
    /// Fold another outcome into this one.
    pub fn extend(&mut self, other: ScanOutcome) {
        self.records.extend(other.records);
        self.warnings.extend(other.warnings);
    }
}

/// Scan one category directory for records of the given kind.
///
/// A missing directory yields an empty outcome; only the directory listing
/// itself failing is an error.
pub fn scan(dir: &Path, kind: EntityKind, extension: &str) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome::default();
    if !dir.is_dir() {
        return Ok(outcome);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !is_record_file(&path, extension) {
            continue;
        }

        match codec::decode_file(&path, Some(kind)) {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping malformed record");
                outcome.warnings.push(ScanWarning {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(outcome)
}

/// Scan all four record categories.
pub fn scan_all(paths: &ResolvedPaths) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome::default();
    for (kind, dir) in paths.record_dirs() {
        outcome.extend(scan(&dir, kind, &paths.config.file_extension)?);
    }
    Ok(outcome)
}

/// Count candidate record files in a directory without parsing them.
/// Used as the cheap probe for index validation.
pub fn count_files(dir: &Path, extension: &str) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if is_record_file(&entry.path(), extension) {
            count += 1;
        }
    }
    Ok(count)
}

fn is_record_file(path: &Path, extension: &str) -> bool {
    path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension)
}
