//! Configuration and path resolution for trackdown.
//!
//! Two concerns live here:
//!
//! ## `config.toml` - persisted project configuration
//!
//! Located at `<projectRoot>/.trackdown/config.toml`. Holds the tasks-root
//! directory name, category subdirectory names, id prefix conventions, and
//! the record file extension.
//!
//! ## Tasks-root resolution
//!
//! The tasks root is resolved through four sources, highest first:
//! per-invocation override > `TRACKDOWN_TASKS_ROOT` > project config >
//! built-in default. Use the [`resolver`] module; every resolved value
//! carries its [`ValueSource`] so commands can explain where a directory
//! came from.

pub mod resolver;
pub mod schema;

pub use resolver::{
    CategoryStatus, LegacyLayout, Resolved, ResolveContext, ResolvedPaths, StructureReport,
    TASKS_ROOT_ENV, ValueSource, detect_legacy, resolve_paths, validate_structure,
};
pub use schema::{CONFIG_FILE, DEFAULT_TASKS_ROOT, DirNames, IdPrefixes, PROJECT_DIR, ProjectConfig};
