//! Pipeline configuration.
//!
//! Loaded through [`tabrun_core::load_layered`], so every field can come from
//! defaults, a TOML/JSON file, `TABRUN_*` environment variables
//! (`TABRUN_SEARCH__CV=10`) or command-line overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tabrun_core::RunSettings;

use crate::data::CsvFormat;
use crate::error::{MlError, Result};
use crate::models::ModelKind;
use crate::params::HyperparameterGrid;
use crate::search::SearchSettings;

/// Where the dataset lives and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub path: Option<PathBuf>,
    pub target_column: Option<String>,
    pub delimiter: char,
    pub decimal: char,
}

impl Default for DataSettings {
    fn default() -> Self {
        let format = CsvFormat::default();
        Self {
            path: None,
            target_column: None,
            delimiter: format.delimiter,
            decimal: format.decimal,
        }
    }
}

impl DataSettings {
    pub fn format(&self) -> CsvFormat {
        CsvFormat {
            delimiter: self.delimiter,
            decimal: self.decimal,
        }
    }
}

/// Which estimator to search and over what grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub kind: ModelKind,
    /// `None` searches the estimator's built-in grid. An explicitly empty
    /// grid is rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<HyperparameterGrid>,
}

impl ModelSettings {
    pub fn resolved_grid(&self) -> HyperparameterGrid {
        self.grid
            .clone()
            .unwrap_or_else(|| self.kind.default_grid())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub run: RunSettings,
    pub data: DataSettings,
    pub search: SearchSettings,
    pub model: ModelSettings,
    /// Sink definitions; the built-in console and file sinks when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging_config_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Check everything that can be checked before touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.data.path.is_none() {
            return Err(MlError::config("no dataset path given"));
        }
        match self.data.target_column.as_deref() {
            None | Some("") => return Err(MlError::config("no target column given")),
            Some(_) => {}
        }
        if self.run.log_file_name.is_empty() {
            return Err(MlError::config("run.log_file_name is empty"));
        }
        self.data.format().validate()?;
        self.search.validate()?;
        self.model.resolved_grid().validate()
    }

    pub fn data_path(&self) -> Result<&Path> {
        self.data
            .path
            .as_deref()
            .ok_or_else(|| MlError::config("no dataset path given"))
    }

    pub fn target_column(&self) -> Result<&str> {
        self.data
            .target_column
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MlError::config("no target column given"))
    }
}

/// Load the pipeline configuration from layered sources.
pub fn load_config(
    config_file: Option<&Path>,
    overrides: Option<&serde_json::Value>,
) -> Result<PipelineConfig> {
    Ok(tabrun_core::load_layered(config_file, overrides)?)
}
