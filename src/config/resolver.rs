//! Tasks-root resolution with layered precedence.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Explicit per-invocation override (e.g. a `--tasks-root` flag)
//! 2. `TRACKDOWN_TASKS_ROOT` environment variable
//! 3. `tasks_root` in the persisted project config
//! 4. Built-in default (`"tasks"`)
//!
//! Resolution is a pure function of a [`ResolveContext`] and a
//! [`ProjectConfig`]: the environment variable is captured once when the
//! context is constructed, never read ambiently mid-call, so re-resolving
//! with the same inputs always yields the same directory.

use std::path::{Path, PathBuf};

use crate::config::schema::{DEFAULT_TASKS_ROOT, ProjectConfig};
use crate::models::EntityKind;
use crate::{Error, Result};

/// Environment variable overriding the tasks-root directory name.
pub const TASKS_ROOT_ENV: &str = "TRACKDOWN_TASKS_ROOT";

/// Directory name of the old single-directory layout, reported as legacy.
pub const LEGACY_SINGLE_DIR: &str = "trackdown";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Explicit per-invocation override
    Override,
    /// Value from environment variable
    EnvVar(String),
    /// Value from the persisted project config
    ProjectConfig,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Override => write!(f, "override"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ProjectConfig => write!(f, "config"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Immutable inputs to path resolution, passed explicitly through call
/// chains instead of living in ambient process state.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    project_root: PathBuf,
    override_root: Option<String>,
    env_root: Option<String>,
}

impl ResolveContext {
    /// Build a context from explicit parts. `env_root` stands in for the
    /// environment variable; tests pass it directly.
    pub fn new(
        project_root: PathBuf,
        override_root: Option<String>,
        env_root: Option<String>,
    ) -> Self {
        Self {
            project_root,
            override_root: override_root.filter(|s| !s.is_empty()),
            env_root: env_root.filter(|s| !s.is_empty()),
        }
    }

    /// Build a context capturing `TRACKDOWN_TASKS_ROOT` from the process
    /// environment exactly once.
    pub fn from_process_env(project_root: PathBuf, override_root: Option<String>) -> Self {
        let env_root = std::env::var(TASKS_ROOT_ENV).ok();
        Self::new(project_root, override_root, env_root)
    }

    /// The project root this context resolves under.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}

/// Fully resolved directory layout for a project.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    /// Project root the layout hangs off
    pub project_root: PathBuf,
    /// Tasks-root directory name with its source
    pub root_name: Resolved<String>,
    /// Absolute tasks-root directory
    pub tasks_root: PathBuf,
    /// Absolute template directory
    pub templates_dir: PathBuf,
    /// Project configuration used for the resolution
    pub config: ProjectConfig,
}

impl ResolvedPaths {
    /// Absolute category directory for an entity kind.
    pub fn category_dir(&self, kind: EntityKind) -> PathBuf {
        self.tasks_root.join(self.config.dir_name(kind))
    }

    /// All record category directories as (kind, path) pairs.
    pub fn record_dirs(&self) -> Vec<(EntityKind, PathBuf)> {
        EntityKind::all()
            .iter()
            .map(|&kind| (kind, self.category_dir(kind)))
            .collect()
    }
}

/// Resolve the tasks root and category directories.
pub fn resolve_paths(ctx: &ResolveContext, config: &ProjectConfig) -> ResolvedPaths {
    let root_name = if let Some(name) = &ctx.override_root {
        Resolved::new(name.clone(), ValueSource::Override)
    } else if let Some(name) = &ctx.env_root {
        Resolved::new(name.clone(), ValueSource::EnvVar(TASKS_ROOT_ENV.to_string()))
    } else if let Some(name) = &config.tasks_root {
        Resolved::new(name.clone(), ValueSource::ProjectConfig)
    } else {
        Resolved::new(DEFAULT_TASKS_ROOT.to_string(), ValueSource::Default)
    };

    let tasks_root = ctx.project_root.join(&root_name.value);
    let templates_dir = tasks_root.join(&config.dir_names.templates);

    ResolvedPaths {
        project_root: ctx.project_root.clone(),
        root_name,
        tasks_root,
        templates_dir,
        config: config.clone(),
    }
}

/// A legacy directory layout found at the project root, with a suggested
/// remediation. Advisory only; nothing is moved automatically.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LegacyLayout {
    /// The offending directory
    pub path: PathBuf,
    /// Suggested manual fix
    pub suggestion: String,
}

/// Detect category directories sitting directly under the project root,
/// or the old single-directory convention.
pub fn detect_legacy(paths: &ResolvedPaths) -> Vec<LegacyLayout> {
    let mut found = Vec::new();

    let category_names = [
        paths.config.dir_names.epics.as_str(),
        paths.config.dir_names.issues.as_str(),
        paths.config.dir_names.tasks.as_str(),
        paths.config.dir_names.prs.as_str(),
        paths.config.dir_names.templates.as_str(),
    ];
    for name in category_names {
        let candidate = paths.project_root.join(name);
        // The resolved tasks root may legitimately share a category name
        // (e.g. "tasks"); that is not a legacy layout.
        if candidate == paths.tasks_root {
            continue;
        }
        if candidate.is_dir() {
            found.push(LegacyLayout {
                path: candidate,
                suggestion: format!(
                    "move `{}/` under `{}/{}`",
                    name,
                    paths.root_name.value,
                    name
                ),
            });
        }
    }

    let single = paths.project_root.join(LEGACY_SINGLE_DIR);
    if single.is_dir() && single != paths.tasks_root {
        found.push(LegacyLayout {
            path: single,
            suggestion: format!(
                "split `{}/` into category directories under `{}/`",
                LEGACY_SINGLE_DIR, paths.root_name.value
            ),
        });
    }

    found
}

/// Per-category existence status.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CategoryStatus {
    /// Category directory name
    pub name: String,
    /// Absolute directory path
    pub dir: PathBuf,
    /// Whether the directory exists
    pub exists: bool,
}

/// Result of validating the on-disk directory structure.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StructureReport {
    /// One entry per required category, templates included
    pub categories: Vec<CategoryStatus>,
    /// Legacy layouts found alongside (or instead of) the resolved root
    pub legacy: Vec<LegacyLayout>,
    /// True when every category exists and no legacy layout is present
    pub valid: bool,
}

impl StructureReport {
    /// Missing category directory names.
    pub fn missing(&self) -> Vec<&str> {
        self.categories
            .iter()
            .filter(|c| !c.exists)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Error out on an ambiguous root: legacy directories concurrently
    /// present with the resolved structure are never guessed around.
    pub fn ensure_unambiguous(&self) -> Result<()> {
        if self.legacy.is_empty() {
            return Ok(());
        }
        let dirs: Vec<String> = self
            .legacy
            .iter()
            .map(|l| l.path.display().to_string())
            .collect();
        Err(Error::AmbiguousLayout(format!(
            "legacy directories present: {}",
            dirs.join(", ")
        )))
    }
}

/// Validate that every required category directory exists, reporting
/// legacy layouts distinctly from missing directories.
pub fn validate_structure(paths: &ResolvedPaths) -> StructureReport {
    let mut categories = Vec::new();
    for (kind, dir) in paths.record_dirs() {
        categories.push(CategoryStatus {
            name: paths.config.dir_name(kind).to_string(),
            exists: dir.is_dir(),
            dir,
        });
    }
    categories.push(CategoryStatus {
        name: paths.config.dir_names.templates.clone(),
        exists: paths.templates_dir.is_dir(),
        dir: paths.templates_dir.clone(),
    });

    let legacy = detect_legacy(paths);
    let valid = categories.iter().all(|c| c.exists) && legacy.is_empty();

    StructureReport {
        categories,
        legacy,
        valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn ctx(dir: &TempDir, override_root: Option<&str>, env_root: Option<&str>) -> ResolveContext {
        ResolveContext::new(
            dir.path().to_path_buf(),
            override_root.map(String::from),
            env_root.map(String::from),
        )
    }

    // ==================== Precedence ====================

    #[test]
    fn test_default_when_nothing_set() {
        let dir = TempDir::new().unwrap();
        let paths = resolve_paths(&ctx(&dir, None, None), &ProjectConfig::default());
        assert_eq!(paths.root_name.value, "tasks");
        assert_eq!(paths.root_name.source, ValueSource::Default);
        assert_eq!(paths.tasks_root, dir.path().join("tasks"));
    }

    #[test]
    fn test_override_wins_over_config() {
        let dir = TempDir::new().unwrap();
        let mut config = ProjectConfig::default();
        config.tasks_root = Some("tasks".to_string());

        let paths = resolve_paths(&ctx(&dir, Some("work"), None), &config);
        assert_eq!(paths.root_name.value, "work");
        assert_eq!(paths.root_name.source, ValueSource::Override);

        // Clearing the override falls back to the config value.
        let paths = resolve_paths(&ctx(&dir, None, None), &config);
        assert_eq!(paths.root_name.value, "tasks");
        assert_eq!(paths.root_name.source, ValueSource::ProjectConfig);
    }

    #[test]
    fn test_env_wins_over_config_loses_to_override() {
        let dir = TempDir::new().unwrap();
        let mut config = ProjectConfig::default();
        config.tasks_root = Some("from-config".to_string());

        let paths = resolve_paths(&ctx(&dir, None, Some("from-env")), &config);
        assert_eq!(paths.root_name.value, "from-env");
        assert_eq!(
            paths.root_name.source,
            ValueSource::EnvVar(TASKS_ROOT_ENV.to_string())
        );

        let paths = resolve_paths(&ctx(&dir, Some("from-flag"), Some("from-env")), &config);
        assert_eq!(paths.root_name.value, "from-flag");
        assert_eq!(paths.root_name.source, ValueSource::Override);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::default();
        let context = ctx(&dir, Some("work"), Some("env-root"));

        let first = resolve_paths(&context, &config);
        let second = resolve_paths(&context, &config);
        assert_eq!(first.tasks_root, second.tasks_root);
        assert_eq!(first.root_name.value, second.root_name.value);
        assert_eq!(first.root_name.source, second.root_name.source);
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let dir = TempDir::new().unwrap();
        let paths = resolve_paths(&ctx(&dir, Some(""), None), &ProjectConfig::default());
        assert_eq!(paths.root_name.source, ValueSource::Default);
    }

    #[test]
    fn test_category_dirs_hang_off_tasks_root() {
        let dir = TempDir::new().unwrap();
        let paths = resolve_paths(&ctx(&dir, None, None), &ProjectConfig::default());
        assert_eq!(
            paths.category_dir(crate::models::EntityKind::Epic),
            dir.path().join("tasks").join("epics")
        );
        assert_eq!(paths.templates_dir, dir.path().join("tasks").join("templates"));
    }

    // ==================== Legacy detection ====================

    #[test]
    fn test_legacy_category_at_project_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("epics")).unwrap();

        let paths = resolve_paths(&ctx(&dir, None, None), &ProjectConfig::default());
        let legacy = detect_legacy(&paths);
        assert_eq!(legacy.len(), 1);
        assert!(legacy[0].suggestion.contains("tasks/epics"));
    }

    #[test]
    fn test_legacy_single_directory_convention() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("trackdown")).unwrap();

        let paths = resolve_paths(&ctx(&dir, None, None), &ProjectConfig::default());
        let legacy = detect_legacy(&paths);
        assert_eq!(legacy.len(), 1);
        assert_eq!(legacy[0].path, dir.path().join("trackdown"));
    }

    #[test]
    fn test_tasks_root_itself_is_not_legacy() {
        // The resolved root shares the name of the "tasks" category.
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("tasks")).unwrap();

        let paths = resolve_paths(&ctx(&dir, None, None), &ProjectConfig::default());
        assert!(detect_legacy(&paths).is_empty());
    }

    // ==================== Structure validation ====================

    fn create_all_categories(paths: &ResolvedPaths) {
        for (_, dir) in paths.record_dirs() {
            fs::create_dir_all(dir).unwrap();
        }
        fs::create_dir_all(&paths.templates_dir).unwrap();
    }

    #[test]
    fn test_validate_missing_directories() {
        let dir = TempDir::new().unwrap();
        let paths = resolve_paths(&ctx(&dir, None, None), &ProjectConfig::default());

        let report = validate_structure(&paths);
        assert!(!report.valid);
        assert_eq!(report.missing().len(), 5);
        assert!(report.legacy.is_empty());
        // Missing directories are not an ambiguity
        assert!(report.ensure_unambiguous().is_ok());
    }

    #[test]
    fn test_validate_complete_structure() {
        let dir = TempDir::new().unwrap();
        let paths = resolve_paths(&ctx(&dir, None, None), &ProjectConfig::default());
        create_all_categories(&paths);

        let report = validate_structure(&paths);
        assert!(report.valid);
        assert!(report.missing().is_empty());
    }

    #[test]
    fn test_concurrent_legacy_invalidates_structure() {
        let dir = TempDir::new().unwrap();
        let paths = resolve_paths(&ctx(&dir, None, None), &ProjectConfig::default());
        create_all_categories(&paths);
        fs::create_dir_all(dir.path().join("issues")).unwrap();

        let report = validate_structure(&paths);
        assert!(!report.valid);
        assert_eq!(report.legacy.len(), 1);
        assert!(matches!(
            report.ensure_unambiguous(),
            Err(Error::AmbiguousLayout(_))
        ));
    }

    // ==================== Context construction ====================

    #[test]
    #[serial_test::serial]
    fn test_from_process_env_captures_once() {
        let dir = TempDir::new().unwrap();

        // SAFETY: serialized test; no concurrent env access.
        unsafe { std::env::set_var(TASKS_ROOT_ENV, "env-root") };
        let context = ResolveContext::from_process_env(dir.path().to_path_buf(), None);
        unsafe { std::env::remove_var(TASKS_ROOT_ENV) };

        // The captured value survives the variable being unset.
        let paths = resolve_paths(&context, &ProjectConfig::default());
        assert_eq!(paths.root_name.value, "env-root");
    }

    #[test]
    #[serial_test::serial]
    fn test_from_process_env_without_variable() {
        let dir = TempDir::new().unwrap();
        unsafe { std::env::remove_var(TASKS_ROOT_ENV) };
        let context = ResolveContext::from_process_env(dir.path().to_path_buf(), None);
        let paths = resolve_paths(&context, &ProjectConfig::default());
        assert_eq!(paths.root_name.source, ValueSource::Default);
    }
}
