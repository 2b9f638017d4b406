//! Named log sinks with a swappable target.
//!
//! A [`LogSink`] keeps its name, level, format and rotation for its whole
//! life; only the target it writes to can change. Rotation applies to the
//! target opened from configuration; rebound targets do not rotate. Every formatted record is
//! written while holding the target lock, so a record lands entirely in one
//! target.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;

use crate::error::LoggingError;
use crate::logging::config::{SinkConfig, SinkFormat, SinkKind, SinkRotation};

/// Physical destination of a sink.
pub enum SinkTarget {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    File {
        path: PathBuf,
        appender: RollingFileAppender,
    },
}

impl SinkTarget {
    /// Open (or create and append to) a log file, creating parent directories.
    pub fn open_file(path: &Path, rotation: SinkRotation) -> Result<Self, LoggingError> {
        let open_failed = |message: String| LoggingError::OpenFailed {
            path: path.to_path_buf(),
            message,
        };

        let file_name = path
            .file_name()
            .ok_or_else(|| open_failed("path has no file name".to_string()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| open_failed(e.to_string()))?;

        let appender = RollingFileAppender::builder()
            .rotation(rotation.into())
            .filename_prefix(file_name.to_string_lossy())
            .build(dir)
            .map_err(|e| open_failed(e.to_string()))?;

        Ok(Self::File {
            path: path.to_path_buf(),
            appender,
        })
    }

    /// File path of the target; `None` for console targets.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Stdout(_) => "stdout".to_string(),
            Self::Stderr(_) => "stderr".to_string(),
            Self::File { path, .. } => path.display().to_string(),
        }
    }
}

impl Write for SinkTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(out) => out.write(buf),
            Self::Stderr(err) => err.write(buf),
            Self::File { appender, .. } => appender.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(out) => out.flush(),
            Self::Stderr(err) => err.flush(),
            Self::File { appender, .. } => appender.flush(),
        }
    }
}

/// A registered sink.
pub struct LogSink {
    name: String,
    level: LevelFilter,
    format: SinkFormat,
    rotation: SinkRotation,
    target: Mutex<SinkTarget>,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("format", &self.format)
            .field("target", &self.lock_target().describe())
            .finish()
    }
}

impl LogSink {
    pub fn new(
        name: &str,
        level: LevelFilter,
        format: SinkFormat,
        rotation: SinkRotation,
        target: SinkTarget,
    ) -> Self {
        Self {
            name: name.to_string(),
            level,
            format,
            rotation,
            target: Mutex::new(target),
        }
    }

    /// Build a sink from its configuration, opening file targets.
    pub fn from_config(config: &SinkConfig) -> Result<Self, LoggingError> {
        let target = match config.kind {
            SinkKind::Stdout => SinkTarget::Stdout(io::stdout()),
            SinkKind::Stderr => SinkTarget::Stderr(io::stderr()),
            SinkKind::File => {
                let path = config
                    .path
                    .as_deref()
                    .ok_or_else(|| LoggingError::MissingPath {
                        name: config.name.clone(),
                    })?;
                SinkTarget::open_file(path, config.rotation)?
            }
        };
        Ok(Self::new(
            &config.name,
            config.level.into(),
            config.format,
            config.rotation,
            target,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn format(&self) -> SinkFormat {
        self.format
    }

    pub fn rotation(&self) -> SinkRotation {
        self.rotation
    }

    /// Path of the file currently written to, if the target is a file.
    /// For a rotating target this is the prefix of the dated file names.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.lock_target().path().map(Path::to_path_buf)
    }

    /// Swap in a new target and hand back the previous one.
    pub(crate) fn replace_target(&self, target: SinkTarget) -> SinkTarget {
        std::mem::replace(&mut *self.lock_target(), target)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.lock_target().flush()
    }

    fn lock_target(&self) -> MutexGuard<'_, SinkTarget> {
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `MakeWriter` handing out locked access to a sink's current target.
#[derive(Debug, Clone)]
pub struct SinkWriter {
    sink: Arc<LogSink>,
}

impl SinkWriter {
    pub fn new(sink: Arc<LogSink>) -> Self {
        Self { sink }
    }
}

impl<'a> MakeWriter<'a> for SinkWriter {
    type Writer = SinkGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SinkGuard {
            target: self.sink.lock_target(),
        }
    }
}

/// Exclusive access to a sink target for the duration of one record.
pub struct SinkGuard<'a> {
    target: MutexGuard<'a, SinkTarget>,
}

impl Write for SinkGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.target.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.target.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.target.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("run.log");
        let target = SinkTarget::open_file(&path, SinkRotation::Never).unwrap();
        assert_eq!(target.path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn test_open_file_rejects_directory_path() {
        let err = SinkTarget::open_file(Path::new("/"), SinkRotation::Never);
        assert!(matches!(err, Err(LoggingError::OpenFailed { .. })));
    }

    #[test]
    fn test_writer_writes_to_current_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sink.log");
        let sink = Arc::new(
            LogSink::from_config(&SinkConfig::file("file", &path)).unwrap(),
        );
        let writer = SinkWriter::new(Arc::clone(&sink));

        writer.make_writer().write_all(b"hello\n").unwrap();
        sink.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
        assert_eq!(sink.current_path(), Some(path));
    }

    #[test]
    fn test_replace_target_returns_previous() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::from_config(&SinkConfig::stdout("console")).unwrap();
        assert_eq!(sink.current_path(), None);

        let next = SinkTarget::open_file(&dir.path().join("n.log"), SinkRotation::Never).unwrap();
        let previous = sink.replace_target(next);
        assert!(matches!(previous, SinkTarget::Stdout(_)));
        assert!(sink.current_path().is_some());
        assert_eq!(sink.name(), "console");
        assert_eq!(sink.level(), LevelFilter::INFO);
    }
}
