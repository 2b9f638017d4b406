//! Declarative description of the log sinks.
//!
//! Loaded once at process start from a JSON or TOML file and never
//! re-parsed. Each sink has a unique name that the run lifecycle uses to
//! look it up and rebind it.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Format, Json, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

use crate::error::ConfigError;

/// Name of the file sink in the default configuration.
pub const DEFAULT_FILE_SINK: &str = "file";
/// Name of the console sink in the default configuration.
pub const DEFAULT_CONSOLE_SINK: &str = "console";

/// Severity threshold of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl From<SinkLevel> for LevelFilter {
    fn from(level: SinkLevel) -> Self {
        match level {
            SinkLevel::Trace => LevelFilter::TRACE,
            SinkLevel::Debug => LevelFilter::DEBUG,
            SinkLevel::Info => LevelFilter::INFO,
            SinkLevel::Warn => LevelFilter::WARN,
            SinkLevel::Error => LevelFilter::ERROR,
            SinkLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Where a sink writes when first opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Stdout,
    Stderr,
    File,
}

/// How a sink renders records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    /// `LEVEL: message key=value`
    #[default]
    Simple,
    Compact,
    Full,
    Json,
}

/// Rotation policy of file targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

impl From<SinkRotation> for tracing_appender::rolling::Rotation {
    fn from(rotation: SinkRotation) -> Self {
        match rotation {
            SinkRotation::Never => Self::NEVER,
            SinkRotation::Hourly => Self::HOURLY,
            SinkRotation::Daily => Self::DAILY,
        }
    }
}

/// One named sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub name: String,
    pub kind: SinkKind,
    #[serde(default)]
    pub level: SinkLevel,
    #[serde(default)]
    pub format: SinkFormat,
    /// Destination of file sinks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub rotation: SinkRotation,
}

impl SinkConfig {
    pub fn stdout(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: SinkKind::Stdout,
            level: SinkLevel::Info,
            format: SinkFormat::Simple,
            path: None,
            rotation: SinkRotation::Never,
        }
    }

    pub fn file(name: &str, path: &Path) -> Self {
        Self {
            name: name.to_string(),
            kind: SinkKind::File,
            level: SinkLevel::Debug,
            format: SinkFormat::Full,
            path: Some(path.to_path_buf()),
            rotation: SinkRotation::Never,
        }
    }

    pub fn with_level(mut self, level: SinkLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: SinkFormat) -> Self {
        self.format = format;
        self
    }
}

/// The full set of sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            sinks: vec![
                SinkConfig::stdout(DEFAULT_CONSOLE_SINK),
                SinkConfig::file(DEFAULT_FILE_SINK, Path::new("tabrun.log")),
            ],
        }
    }
}

impl LoggingConfig {
    /// Load a logging configuration from a `.json` or `.toml` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Figment::new().merge(Json::file(path)),
            Some("toml") => Figment::new().merge(Toml::file(path)),
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.to_path_buf(),
                });
            }
        };
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject duplicate names and file sinks without a path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for sink in &self.sinks {
            if !seen.insert(sink.name.as_str()) {
                return Err(ConfigError::Invalid {
                    message: format!("duplicate log sink name '{}'", sink.name),
                });
            }
            if sink.kind == SinkKind::File && sink.path.is_none() {
                return Err(ConfigError::Invalid {
                    message: format!("file sink '{}' needs a path", sink.name),
                });
            }
        }
        Ok(())
    }
}
