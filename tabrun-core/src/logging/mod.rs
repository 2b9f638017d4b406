//! Logging: named sinks wired into a `tracing` subscriber.
//!
//! Every configured sink becomes one `tracing-subscriber` fmt layer with its
//! own level filter and format. The layers write through [`SinkWriter`], so
//! rebinding a sink in the [`LogSinkRegistry`] redirects its layer without
//! rebuilding the subscriber.

pub mod config;
pub mod format;
pub mod registry;
pub mod sink;

pub use config::{
    LoggingConfig, SinkConfig, SinkFormat, SinkKind, SinkLevel, SinkRotation,
    DEFAULT_CONSOLE_SINK, DEFAULT_FILE_SINK,
};
pub use format::SimpleFormat;
pub use registry::LogSinkRegistry;
pub use sink::{LogSink, SinkTarget, SinkWriter};

use std::sync::Arc;

use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, Registry};

use crate::error::LoggingError;

/// Build a subscriber for `config` without installing it.
///
/// Returns the subscriber together with the registry its layers write to.
pub fn build_subscriber(
    config: &LoggingConfig,
) -> Result<(impl Subscriber + Send + Sync + 'static, Arc<LogSinkRegistry>), LoggingError> {
    let registry = Arc::new(LogSinkRegistry::from_config(config)?);
    let layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = registry
        .sinks()
        .iter()
        .map(|sink| sink_layer(Arc::clone(sink)))
        .collect();
    let subscriber = tracing_subscriber::registry().with(layers);
    Ok((subscriber, registry))
}

/// Build the subscriber for `config` and install it as the global default.
pub fn init_logging(config: &LoggingConfig) -> Result<Arc<LogSinkRegistry>, LoggingError> {
    let (subscriber, registry) = build_subscriber(config)?;
    tracing::subscriber::set_global_default(subscriber).map_err(|e| {
        LoggingError::InitFailed {
            message: e.to_string(),
        }
    })?;
    Ok(registry)
}

fn sink_layer<S>(sink: Arc<LogSink>) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let level = sink.level();
    let format = sink.format();
    let writer = SinkWriter::new(sink);
    let base = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer);

    match format {
        SinkFormat::Simple => base.event_format(SimpleFormat).with_filter(level).boxed(),
        SinkFormat::Compact => base.compact().with_filter(level).boxed(),
        SinkFormat::Full => base.with_filter(level).boxed(),
        SinkFormat::Json => base.json().with_filter(level).boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(path: &std::path::Path) -> String {
        std::fs::read_to_string(path).unwrap_or_default()
    }

    #[test]
    fn test_simple_format_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("simple.log");
        let config = LoggingConfig {
            sinks: vec![SinkConfig::file("file", &path).with_format(SinkFormat::Simple)],
        };
        let (subscriber, _registry) = build_subscriber(&config).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(rows = 3, "Loading data");
        });

        let content = read(&path);
        assert!(content.starts_with("INFO: Loading data"));
        assert!(content.contains("rows=3"));
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_level_filter_per_sink() {
        let dir = TempDir::new().unwrap();
        let warn_path = dir.path().join("warn.log");
        let debug_path = dir.path().join("debug.log");
        let config = LoggingConfig {
            sinks: vec![
                SinkConfig::file("warn", &warn_path).with_level(SinkLevel::Warn),
                SinkConfig::file("debug", &debug_path).with_level(SinkLevel::Debug),
            ],
        };
        let (subscriber, _registry) = build_subscriber(&config).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("detail");
            tracing::warn!("careful");
        });

        let warn = read(&warn_path);
        let debug = read(&debug_path);
        assert!(!warn.contains("detail"));
        assert!(warn.contains("careful"));
        assert!(debug.contains("detail"));
        assert!(debug.contains("careful"));
    }

    #[test]
    fn test_json_format_is_one_object_per_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("json.log");
        let config = LoggingConfig {
            sinks: vec![SinkConfig::file("file", &path).with_format(SinkFormat::Json)],
        };
        let (subscriber, _registry) = build_subscriber(&config).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(score = 0.5, "trial done");
        });

        let content = read(&path);
        let line = content.lines().next().unwrap();
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["fields"]["message"], "trial done");
        assert_eq!(value["level"], "INFO");
    }

    #[test]
    fn test_rebind_redirects_layer() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("old.log");
        let new = dir.path().join("logs").join("run.log");
        let config = LoggingConfig {
            sinks: vec![SinkConfig::file("file", &old).with_format(SinkFormat::Simple)],
        };
        let (subscriber, registry) = build_subscriber(&config).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("before");
            registry.rebind_file_target("file", &new).unwrap();
            tracing::info!("after");
        });

        let old_content = read(&old);
        let new_content = read(&new);
        assert!(old_content.contains("before"));
        assert!(!old_content.contains("after"));
        assert!(new_content.contains("after"));
        assert!(!new_content.contains("before"));
    }
}
