//! # tabrun-core
//!
//! Run lifecycle plumbing for tabrun: collision-safe run directories, named
//! log sinks that can be rebound into a run at runtime, layered
//! configuration and staged file persistence.

pub mod config;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod run;

// Re-export commonly used types at the crate root.
pub use config::{load_layered, RunSettings};
pub use error::{ConfigError, LoggingError, RunError, TabrunError};
pub use logging::{build_subscriber, init_logging, LogSink, LogSinkRegistry, LoggingConfig};
pub use run::{PathAllocator, RunContext};
