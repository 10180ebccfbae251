//! Persisted project configuration schema.
//!
//! One TOML file per project at `.trackdown/config.toml`, holding the
//! tasks-root directory name, the category subdirectory names, the id
//! prefix conventions per type, and the record file extension. Every field
//! has a documented default so an empty file is a valid configuration;
//! unknown keys are rejected so typos surface instead of silently falling
//! back to defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::EntityKind;
use crate::{Error, Result};

/// Dot-directory at the project root holding config and index.
pub const PROJECT_DIR: &str = ".trackdown";

/// Config file name inside [`PROJECT_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Hard-coded tasks-root name used when no other source provides one.
pub const DEFAULT_TASKS_ROOT: &str = "tasks";

/// Category subdirectory names under the tasks root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DirNames {
    pub epics: String,
    pub issues: String,
    pub tasks: String,
    pub prs: String,
    pub templates: String,
}

impl Default for DirNames {
    fn default() -> Self {
        Self {
            epics: "epics".to_string(),
            issues: "issues".to_string(),
            tasks: "tasks".to_string(),
            prs: "prs".to_string(),
            templates: "templates".to_string(),
        }
    }
}

/// Id prefix conventions per entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct IdPrefixes {
    pub epic: String,
    pub issue: String,
    pub task: String,
    pub pr: String,
}

impl Default for IdPrefixes {
    fn default() -> Self {
        Self {
            epic: "EP".to_string(),
            issue: "ISS".to_string(),
            task: "TSK".to_string(),
            pr: "PR".to_string(),
        }
    }
}

/// Project configuration persisted at `.trackdown/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProjectConfig {
    /// Tasks-root directory name; `None` defers to the resolver default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_root: Option<String>,

    /// Category subdirectory names
    pub dir_names: DirNames,

    /// Id prefixes per entity type
    pub id_prefixes: IdPrefixes,

    /// Zero-padding width for id sequence numbers
    pub id_padding: usize,

    /// Record file extension (no leading dot)
    pub file_extension: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            tasks_root: None,
            dir_names: DirNames::default(),
            id_prefixes: IdPrefixes::default(),
            id_padding: 4,
            file_extension: "md".to_string(),
        }
    }
}

impl ProjectConfig {
    /// Path of the config file for a project root.
    pub fn path_for(project_root: &Path) -> PathBuf {
        project_root.join(PROJECT_DIR).join(CONFIG_FILE)
    }

    /// Load the config file, falling back to defaults when absent.
    /// A present-but-unparsable file is an error, not a silent default.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = Self::path_for(project_root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        toml::from_str(&text).map_err(|e| {
            Error::InvalidInput(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Write the config file, creating the dot-directory as needed.
    pub fn save(&self, project_root: &Path) -> Result<()> {
        let path = Self::path_for(project_root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidInput(format!("unserializable config: {e}")))?;
        fs::write(&path, text)?;
        Ok(())
    }

    /// Category directory name for an entity kind.
    pub fn dir_name(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Epic => &self.dir_names.epics,
            EntityKind::Issue => &self.dir_names.issues,
            EntityKind::Task => &self.dir_names.tasks,
            EntityKind::PullRequest => &self.dir_names.prs,
        }
    }

    /// Id prefix for an entity kind.
    pub fn id_prefix(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Epic => &self.id_prefixes.epic,
            EntityKind::Issue => &self.id_prefixes.issue,
            EntityKind::Task => &self.id_prefixes.task,
            EntityKind::PullRequest => &self.id_prefixes.pr,
        }
    }

    /// Format an id from a kind and sequence number, e.g. `EP-0001`.
    pub fn format_id(&self, kind: EntityKind, seq: u64) -> String {
        format!(
            "{}-{:0width$}",
            self.id_prefix(kind),
            seq,
            width = self.id_padding
        )
    }

    /// Parse the sequence number out of an id carrying this kind's prefix.
    pub fn parse_seq(&self, kind: EntityKind, id: &str) -> Option<u64> {
        let rest = id.strip_prefix(self.id_prefix(kind))?.strip_prefix('-')?;
        rest.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ProjectConfig::default();
        assert_eq!(config.tasks_root, None);
        assert_eq!(config.dir_name(EntityKind::Epic), "epics");
        assert_eq!(config.dir_name(EntityKind::PullRequest), "prs");
        assert_eq!(config.id_prefix(EntityKind::Issue), "ISS");
        assert_eq!(config.id_padding, 4);
        assert_eq!(config.file_extension, "md");
    }

    #[test]
    fn test_format_and_parse_id() {
        let config = ProjectConfig::default();
        assert_eq!(config.format_id(EntityKind::Epic, 1), "EP-0001");
        assert_eq!(config.format_id(EntityKind::Task, 123), "TSK-0123");
        assert_eq!(config.parse_seq(EntityKind::Epic, "EP-0001"), Some(1));
        assert_eq!(config.parse_seq(EntityKind::Epic, "ISS-0001"), None);
        assert_eq!(config.parse_seq(EntityKind::Epic, "EP-x"), None);
        // Overflow beyond the padding width still parses
        assert_eq!(config.parse_seq(EntityKind::Task, "TSK-10000"), Some(10000));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut config = ProjectConfig::default();
        config.tasks_root = Some("work".to_string());
        config.id_prefixes.epic = "EPIC".to_string();
        config.save(dir.path()).unwrap();

        let loaded = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join(CONFIG_FILE), "tasks_rot = \"work\"\n").unwrap();

        assert!(ProjectConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join(CONFIG_FILE), "tasks_root = \"work\"\n").unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.tasks_root.as_deref(), Some("work"));
        assert_eq!(config.id_padding, 4);
    }
}
