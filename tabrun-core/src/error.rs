//! Error types for the tabrun core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering run allocation, log sinks and configuration.

use std::path::PathBuf;

/// Top-level error type for the tabrun core library.
#[derive(Debug, thiserror::Error)]
pub enum TabrunError {
    #[error("Run error: {0}")]
    Run(#[from] RunError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from run directory allocation.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Failed to create root directory {path}: {source}")]
    RootCreation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Run directory already exists: {path}")]
    RunDirExists { path: PathBuf },

    #[error("Failed to create run directory {path}: {source}")]
    RunDirCreation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create subdirectory {path}: {source}")]
    SubdirCreation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Run directory does not exist: {path}")]
    MissingRunDir { path: PathBuf },

    #[error("Invalid run tag '{tag}': {reason}")]
    InvalidTag { tag: String, reason: String },
}

/// Errors from the log sink registry.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Log sink not configured: {name}")]
    SinkNotFound { name: String },

    #[error("Duplicate log sink name: {name}")]
    DuplicateSink { name: String },

    #[error("File sink '{name}' has no path")]
    MissingPath { name: String },

    #[error("Failed to open log file {path}: {message}")]
    OpenFailed { path: PathBuf, message: String },

    #[error("Failed to install global subscriber: {message}")]
    InitFailed { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported configuration format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {0}")]
    Parse(#[from] Box<figment::Error>),
}
