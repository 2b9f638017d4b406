//! The resolved paths of a single run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::LoggingError;
use crate::logging::{LogSink, LogSinkRegistry};
use crate::run::allocator::{LOGS_DIR, MODELS_DIR, PLOTS_DIR};

/// Everything a run needs to know about where it writes.
///
/// Produced by [`PathAllocator`](crate::run::PathAllocator). After creation
/// only files are appended under its subdirectories; the directories persist
/// as the run's permanent record.
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    pub tag: String,
    pub run_name: String,
    pub root_path: PathBuf,
    pub run_path: PathBuf,
    pub model_dir: PathBuf,
    pub plot_dir: PathBuf,
    pub log_dir: PathBuf,
    pub created_at: NaiveDateTime,
    /// Log file inside `log_dir`, once a sink has been rebound to it.
    pub log_file: Option<PathBuf>,
    #[serde(skip)]
    log_sink: Option<Arc<LogSink>>,
}

impl RunContext {
    pub(crate) fn new(
        tag: &str,
        run_name: &str,
        root_path: PathBuf,
        run_path: PathBuf,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            tag: tag.to_string(),
            run_name: run_name.to_string(),
            model_dir: run_path.join(MODELS_DIR),
            plot_dir: run_path.join(PLOTS_DIR),
            log_dir: run_path.join(LOGS_DIR),
            root_path,
            run_path,
            created_at,
            log_file: None,
            log_sink: None,
        }
    }

    /// The three fixed subdirectories, in creation order.
    pub fn subdirs(&self) -> [&Path; 3] {
        [&self.model_dir, &self.plot_dir, &self.log_dir]
    }

    /// Route the named sink into `<log_dir>/<file_name>`.
    ///
    /// A sink that is not configured is skipped with a warning and the
    /// context is returned unchanged; a failure to open the new file is an
    /// error and leaves the sink on its previous target.
    pub fn bind_log_sink(
        mut self,
        registry: &LogSinkRegistry,
        sink_name: &str,
        file_name: &str,
    ) -> Result<Self, LoggingError> {
        let Some(sink) = registry.find(sink_name) else {
            tracing::warn!(sink = sink_name, "No such log sink configured, skipping rebind");
            return Ok(self);
        };

        let log_file = self.log_dir.join(file_name);
        registry.rebind_file_target(sink_name, &log_file)?;
        tracing::info!(sink = sink_name, path = %log_file.display(), "Run log bound");

        self.log_file = Some(log_file);
        self.log_sink = Some(sink);
        Ok(self)
    }

    /// Handle to the sink rebound into this run, if any.
    pub fn log_sink(&self) -> Option<&Arc<LogSink>> {
        self.log_sink.as_ref()
    }

    /// Path of a file inside `model_dir`.
    pub fn model_file(&self, file_name: &str) -> PathBuf {
        self.model_dir.join(file_name)
    }
}
