//! # tabrun-ml
//!
//! Exhaustive cross-validated hyperparameter search over tabular regression
//! data, plus the estimators, metrics and artifact handling around it.

pub mod artifact;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod params;
pub mod pipeline;
pub mod search;
pub mod split;

pub use artifact::{load_model, persist, ModelArtifacts};
pub use config::{load_config, PipelineConfig};
pub use data::{CsvFormat, TabularDataset};
pub use error::{MlError, Result};
pub use metrics::{format_report, RegressionMetrics, Scoring};
pub use models::{Model, ModelKind, Regressor};
pub use params::{HyperparameterGrid, ParamSet};
pub use pipeline::{run_pipeline, PipelineReport, RunSummary};
pub use search::{cross_validate, run_search, SearchOutcome, SearchSettings, TrialResult};
