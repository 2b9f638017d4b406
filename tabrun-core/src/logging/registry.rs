//! Registry of named log sinks and the rebind operation.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::LoggingError;
use crate::logging::config::{LoggingConfig, SinkRotation};
use crate::logging::sink::{LogSink, SinkTarget};

/// Named sinks configured for this process.
///
/// The set of sinks is fixed at construction; what changes is the target a
/// sink writes to. The registry is shared by `Arc` with everything that needs
/// to rebind or flush sinks, and with the subscriber layers that write to them.
#[derive(Debug)]
pub struct LogSinkRegistry {
    sinks: Vec<Arc<LogSink>>,
    rebind_lock: Mutex<()>,
}

impl LogSinkRegistry {
    /// Build a registry from already constructed sinks.
    pub fn new(sinks: Vec<LogSink>) -> Result<Self, LoggingError> {
        let mut registered: Vec<Arc<LogSink>> = Vec::with_capacity(sinks.len());
        for sink in sinks {
            if registered.iter().any(|s| s.name() == sink.name()) {
                return Err(LoggingError::DuplicateSink {
                    name: sink.name().to_string(),
                });
            }
            registered.push(Arc::new(sink));
        }
        Ok(Self {
            sinks: registered,
            rebind_lock: Mutex::new(()),
        })
    }

    /// Open every configured sink.
    pub fn from_config(config: &LoggingConfig) -> Result<Self, LoggingError> {
        let sinks = config
            .sinks
            .iter()
            .map(LogSink::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(sinks)
    }

    /// Look a sink up by name. `None` means no such sink is configured.
    pub fn find(&self, name: &str) -> Option<Arc<LogSink>> {
        self.sinks.iter().find(|s| s.name() == name).cloned()
    }

    pub fn sinks(&self) -> &[Arc<LogSink>] {
        &self.sinks
    }

    /// Point the named sink at a new file.
    ///
    /// The new file is opened first; if that fails the sink keeps writing to
    /// its previous target. Once opened, the target is swapped under the
    /// sink's write lock: records finished before the swap are in the old
    /// target, records started after it go to the new one. Records emitted
    /// concurrently with this call may land on either side. The previous
    /// target is flushed and released after the swap; a flush failure is
    /// reported as a warning only.
    ///
    /// The new target never rotates, so records land in `new_path` itself
    /// whatever rotation the sink was configured with.
    pub fn rebind_file_target(&self, name: &str, new_path: &Path) -> Result<(), LoggingError> {
        let _rebind = self
            .rebind_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let sink = self.find(name).ok_or_else(|| LoggingError::SinkNotFound {
            name: name.to_string(),
        })?;

        let replacement = SinkTarget::open_file(new_path, SinkRotation::Never)?;
        let mut previous = sink.replace_target(replacement);

        let previous_path = previous.path().map(Path::to_path_buf);
        if let Err(e) = previous.flush() {
            tracing::warn!(sink = name, error = %e, "Failed to flush previous log target");
        }
        drop(previous);

        tracing::debug!(
            sink = name,
            from = ?previous_path,
            to = %new_path.display(),
            "Log sink rebound"
        );
        Ok(())
    }

    /// Flush every sink, logging failures.
    pub fn flush_all(&self) {
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                tracing::warn!(sink = sink.name(), error = %e, "Failed to flush log sink");
            }
        }
    }
}
