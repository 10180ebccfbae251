//! Record codec: one entity per frontmatter-plus-body text file.
//!
//! File layout is a YAML mapping bounded by `---` marker lines, followed by
//! a free-form body stored verbatim:
//!
//! ```text
//! ---
//! issue_id: ISS-0001
//! epic_id: EP-0001
//! title: Cart total rounding
//! ...
//! ---
//! ## Overview
//! ...
//! ```
//!
//! Decoding is strict about mandatory fields (the type's own id plus its
//! parent ids) and has no opinion about which optional fields are present.
//! Mandatory-field problems are reported per file and field; they are never
//! silently defaulted.

use std::fs;
use std::path::Path;

use chrono::Utc;
use serde_yaml::{Mapping, Value};

use crate::models::{EntityKind, Epic, Issue, PullRequest, Record, Task};
use crate::{Error, Result};

/// Marker line opening and closing the metadata block.
pub const FRONTMATTER_MARKER: &str = "---";

/// A partial update applied to a record file.
///
/// Frontmatter fields merge last-write-wins per field; the body is replaced
/// only when explicitly patched.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    /// Frontmatter fields to overwrite
    pub fields: Mapping,
    /// Replacement body, when the body itself is being updated
    pub body: Option<String>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a frontmatter field from any serializable value.
    pub fn set<T: serde::Serialize>(mut self, field: &str, value: T) -> Result<Self> {
        let value = serde_yaml::to_value(value)
            .map_err(|e| Error::InvalidInput(format!("unserializable value for {field}: {e}")))?;
        self.fields.insert(Value::String(field.to_string()), value);
        Ok(self)
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.body.is_none()
    }
}

/// Serialize a record to file text. The body round-trips byte-for-byte.
pub fn encode(record: &Record) -> Result<String> {
    let yaml = match record {
        Record::Epic(e) => to_yaml(e, &e.file_path)?,
        Record::Issue(i) => to_yaml(i, &i.file_path)?,
        Record::Task(t) => to_yaml(t, &t.file_path)?,
        Record::PullRequest(p) => to_yaml(p, &p.file_path)?,
    };
    Ok(assemble(&yaml, record.body()))
}

fn to_yaml<T: serde::Serialize>(entity: &T, path: &Path) -> Result<String> {
    serde_yaml::to_string(entity).map_err(|e| Error::MalformedRecord {
        path: path.display().to_string(),
        reason: format!("serialization failed: {e}"),
    })
}

fn assemble(yaml: &str, body: &str) -> String {
    let mut text = String::with_capacity(yaml.len() + body.len() + 16);
    text.push_str(FRONTMATTER_MARKER);
    text.push('\n');
    text.push_str(yaml);
    if !yaml.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(FRONTMATTER_MARKER);
    text.push('\n');
    text.push_str(body);
    text
}

/// Decode file text into a typed record.
///
/// With `expected` set (the normal case when scanning a category directory)
/// the file must satisfy that kind's mandatory-field schema. Without it,
/// the kind is inferred by trying each schema in Epic -> Issue -> Task ->
/// PullRequest priority order; the first full match wins.
pub fn decode(text: &str, path: &Path, expected: Option<EntityKind>) -> Result<Record> {
    let (yaml, body) = split_frontmatter(text, path)?;

    let mapping: Mapping = serde_yaml::from_str(yaml).map_err(|e| Error::MalformedRecord {
        path: path.display().to_string(),
        reason: format!("invalid metadata block: {e}"),
    })?;

    let kind = match expected {
        Some(kind) => kind,
        None => infer_kind(&mapping)
            .ok_or_else(|| Error::UnknownRecordType(path.display().to_string()))?,
    };

    check_mandatory_fields(&mapping, kind, path)?;

    let value = Value::Mapping(mapping);
    let mut record = match kind {
        EntityKind::Epic => Record::Epic(from_yaml::<Epic>(value, path)?),
        EntityKind::Issue => Record::Issue(from_yaml::<Issue>(value, path)?),
        EntityKind::Task => Record::Task(from_yaml::<Task>(value, path)?),
        EntityKind::PullRequest => Record::PullRequest(from_yaml::<PullRequest>(value, path)?),
    };

    record.set_file_path(path.to_path_buf());
    set_body(&mut record, body.to_string());
    Ok(record)
}

/// Read and decode a record file.
pub fn decode_file(path: &Path, expected: Option<EntityKind>) -> Result<Record> {
    let text = fs::read_to_string(path)?;
    decode(&text, path, expected)
}

/// Apply a partial update to a record file and rewrite it in place.
///
/// The current frontmatter is merged with the patch last-write-wins per
/// field, `updated_date` is forced to now, and the result is re-validated
/// through the typed decoder before anything is written. The body is
/// preserved byte-for-byte unless the patch replaces it. Unknown
/// frontmatter fields already in the file survive untouched.
pub fn update(path: &Path, patch: &RecordPatch) -> Result<Record> {
    let text = fs::read_to_string(path)?;
    let (yaml, body) = split_frontmatter(&text, path)?;

    let mut mapping: Mapping = serde_yaml::from_str(yaml).map_err(|e| Error::MalformedRecord {
        path: path.display().to_string(),
        reason: format!("invalid metadata block: {e}"),
    })?;

    for (key, value) in &patch.fields {
        mapping.insert(key.clone(), value.clone());
    }
    mapping.insert(
        Value::String("updated_date".to_string()),
        Value::String(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
    );

    let body = patch.body.as_deref().unwrap_or(body);

    // Re-validate before touching the file: a bad patch must not land.
    let merged_yaml = serde_yaml::to_string(&mapping).map_err(|e| Error::MalformedRecord {
        path: path.display().to_string(),
        reason: format!("serialization failed: {e}"),
    })?;
    let new_text = assemble(&merged_yaml, body);
    let record = decode(&new_text, path, None)?;

    fs::write(path, new_text)?;
    Ok(record)
}

/// Split file text into (yaml block, body). The body is everything after
/// the closing marker line, verbatim.
fn split_frontmatter<'a>(text: &'a str, path: &Path) -> Result<(&'a str, &'a str)> {
    let malformed = |reason: &str| Error::MalformedRecord {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    let rest = text
        .strip_prefix(FRONTMATTER_MARKER)
        .and_then(|r| r.strip_prefix('\n').or_else(|| r.strip_prefix("\r\n")))
        .ok_or_else(|| malformed("missing opening metadata marker"))?;

    // Closing marker must sit on its own line.
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == FRONTMATTER_MARKER {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((yaml, body));
        }
        offset += line.len();
    }
    Err(malformed("missing closing metadata marker"))
}

/// Infer the entity kind from the mandatory-field schemas, in Epic ->
/// Issue -> Task -> PullRequest priority order.
///
/// A parent reference reuses its ancestor's field name (`epic_id` on an
/// Issue is a reference), so a full match requires the kind's own-id field
/// with no more specific kind's own-id present.
fn infer_kind(mapping: &Mapping) -> Option<EntityKind> {
    let has = |field: &str| mapping.contains_key(Value::String(field.to_string()));

    let kinds = EntityKind::all();
    for (i, kind) in kinds.iter().enumerate() {
        if !has(kind.id_field()) {
            continue;
        }
        let shadowed = kinds[i + 1..].iter().any(|k| has(k.id_field()));
        if !shadowed {
            return Some(*kind);
        }
    }
    None
}

/// Reject a record missing its own id or any mandatory parent id, naming
/// every missing field.
fn check_mandatory_fields(mapping: &Mapping, kind: EntityKind, path: &Path) -> Result<()> {
    let has = |field: &str| mapping.contains_key(Value::String(field.to_string()));

    let mut missing: Vec<&str> = Vec::new();
    if !has(kind.id_field()) {
        missing.push(kind.id_field());
    }
    for field in kind.parent_fields() {
        if !has(field) {
            missing.push(field);
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MalformedRecord {
            path: path.display().to_string(),
            reason: format!("missing mandatory field(s): {}", missing.join(", ")),
        })
    }
}

fn from_yaml<T: serde::de::DeserializeOwned>(value: Value, path: &Path) -> Result<T> {
    serde_yaml::from_value(value).map_err(|e| Error::MalformedRecord {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn set_body(record: &mut Record, body: String) {
    match record {
        Record::Epic(e) => e.body = body,
        Record::Issue(i) => i.body = body,
        Record::Task(t) => t.body = body,
        Record::PullRequest(p) => p.body = body,
    }
}
