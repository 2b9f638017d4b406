//! Run directory allocation.
//!
//! A run lives at `<root>/<run-name>/` with three fixed subdirectories
//! (`models/`, `plots/`, `logs/`). The run name is the caller's tag, the tag
//! with a timestamp suffix when the tag is already taken, or a
//! timestamp-derived default when no tag is given.
//!
//! Timestamp disambiguation has second-level resolution. Two allocations with
//! the same tag inside the same second resolve to the same name; the run
//! directory is created with an exclusive `create_dir`, so the loser of that
//! race gets [`RunError::RunDirExists`] instead of silently sharing the
//! directory. Callers that need strict concurrency safety must serialize
//! allocation.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::RunError;
use crate::run::context::RunContext;

/// Default root for run directories, relative to the working directory.
pub const DEFAULT_ROOT: &str = "runs";
/// Subdirectory holding serialized models and their parameters.
pub const MODELS_DIR: &str = "models";
/// Subdirectory reserved for plots.
pub const PLOTS_DIR: &str = "plots";
/// Subdirectory receiving the run's log file.
pub const LOGS_DIR: &str = "logs";
/// `strftime` pattern used for timestamp-derived names and suffixes.
pub const TIMESTAMP_FORMAT: &str = "%d_%m_%Y-%H:%M:%S";
/// Prefix of run names derived from the timestamp alone.
pub const DEFAULT_RUN_PREFIX: &str = "pipeline";

/// Source of the current local time used for run names.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

impl<F> Clock for F
where
    F: Fn() -> NaiveDateTime + Send + Sync,
{
    fn now(&self) -> NaiveDateTime {
        self()
    }
}

/// Creates run directories.
pub struct PathAllocator {
    clock: Box<dyn Clock>,
}

impl Default for PathAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PathAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathAllocator").finish_non_exhaustive()
    }
}

impl PathAllocator {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
        }
    }

    /// Allocate a fresh run directory under `root`.
    ///
    /// `root` and any missing ancestors are created first. The run directory
    /// itself must not exist when it is created; the three fixed
    /// subdirectories are created afterwards and tolerated if present.
    pub fn allocate_run(&self, root: &Path, tag: &str) -> Result<RunContext, RunError> {
        validate_tag(tag)?;

        if !root.exists() {
            tracing::info!(root = %root.display(), "Creating root dir");
        }
        std::fs::create_dir_all(root).map_err(|source| RunError::RootCreation {
            path: root.to_path_buf(),
            source,
        })?;
        let root = root
            .canonicalize()
            .map_err(|source| RunError::RootCreation {
                path: root.to_path_buf(),
                source,
            })?;

        let now = self.clock.now();
        let run_name = resolve_run_name(&root, tag, now);
        let run_path = root.join(&run_name);

        tracing::info!(run_dir = %run_path.display(), "Creating run directory");
        match std::fs::create_dir(&run_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RunError::RunDirExists { path: run_path });
            }
            Err(source) => {
                return Err(RunError::RunDirCreation {
                    path: run_path,
                    source,
                });
            }
        }

        let context = RunContext::new(tag, &run_name, root, run_path, now);
        create_subdirs(&context)?;
        Ok(context)
    }

    /// Re-create the fixed subdirectories of an existing run directory.
    ///
    /// Used by recovery paths that reuse a run directory; subdirectories that
    /// already exist are left as they are.
    pub fn ensure_layout(&self, run_path: &Path) -> Result<RunContext, RunError> {
        if !run_path.is_dir() {
            return Err(RunError::MissingRunDir {
                path: run_path.to_path_buf(),
            });
        }
        let run_path = run_path
            .canonicalize()
            .map_err(|source| RunError::RunDirCreation {
                path: run_path.to_path_buf(),
                source,
            })?;
        let run_name = run_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let root = run_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| run_path.clone());

        let context = RunContext::new(&run_name, &run_name, root, run_path, self.clock.now());
        create_subdirs(&context)?;
        Ok(context)
    }
}

/// Resolve the directory name for a run under `root`.
///
/// An empty tag yields `pipeline_<timestamp>` without checking for an
/// existing directory. A tag that is already taken yields
/// `<tag>_<timestamp>`.
pub fn resolve_run_name(root: &Path, tag: &str, now: NaiveDateTime) -> String {
    let stamp = now.format(TIMESTAMP_FORMAT);
    if tag.is_empty() {
        return format!("{DEFAULT_RUN_PREFIX}_{stamp}");
    }
    if root.join(tag).exists() {
        format!("{tag}_{stamp}")
    } else {
        tag.to_string()
    }
}

fn validate_tag(tag: &str) -> Result<(), RunError> {
    if tag.is_empty() {
        return Ok(());
    }
    let mut components = Path::new(tag).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(RunError::InvalidTag {
            tag: tag.to_string(),
            reason: "must be a single directory name".to_string(),
        }),
    }
}

fn create_subdirs(context: &RunContext) -> Result<(), RunError> {
    for dir in context.subdirs() {
        create_dir_tolerant(dir)?;
    }
    Ok(())
}

fn create_dir_tolerant(path: &Path) -> Result<(), RunError> {
    match std::fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => {
            tracing::debug!(path = %path.display(), "Subdirectory already present");
            Ok(())
        }
        Err(source) => Err(RunError::SubdirCreation {
            path: PathBuf::from(path),
            source,
        }),
    }
}
