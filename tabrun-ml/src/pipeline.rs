//! One complete experiment: allocate a run, bind its log, search, report,
//! cross-validate the winner and persist everything into the run directory.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tabrun_core::persistence::atomic_write_json;
use tabrun_core::{LogSinkRegistry, PathAllocator, RunContext};
use tracing::info;

use crate::artifact::{persist, ModelArtifacts};
use crate::config::PipelineConfig;
use crate::data::TabularDataset;
use crate::error::Result;
use crate::metrics::{format_report, RegressionMetrics, Scoring};
use crate::models::{Model, ModelKind};
use crate::params::{describe, ParamSet};
use crate::search::{cross_validate, run_search, CrossValidationResult, TrialResult};

/// File name of the summary written into the run directory.
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Metrics reported for the winner over the full dataset.
pub const FINAL_CV_SCORING: [Scoring; 2] = [Scoring::R2, Scoring::NegMaxError];

/// Everything a finished run recorded, serialized to [`SUMMARY_FILE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub tag: String,
    pub run_name: String,
    pub run_path: PathBuf,
    pub log_file: Option<PathBuf>,
    pub dataset: PathBuf,
    pub target: String,
    pub features: Vec<String>,
    pub model: ModelKind,
    pub scoring: Scoring,
    pub best_index: usize,
    pub best_parameters: ParamSet,
    pub best_score: f64,
    pub held_out: RegressionMetrics,
    pub cross_validation: BTreeMap<String, CrossValidationResult>,
    pub trials: Vec<TrialResult>,
    pub artifacts: ModelArtifacts,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub context: RunContext,
    pub summary: RunSummary,
    pub summary_path: PathBuf,
}

/// Run the experiment described by `config`.
pub fn run_pipeline(
    config: &PipelineConfig,
    registry: &LogSinkRegistry,
    allocator: &PathAllocator,
) -> Result<PipelineReport> {
    config.validate()?;
    let data_path = config.data_path()?;
    let target_column = config.target_column()?;
    let started_at = Local::now().naive_local();

    let context = allocator
        .allocate_run(&config.run.root_dir, &config.run.tag)?
        .bind_log_sink(registry, &config.run.log_sink, &config.run.log_file_name)?;
    info!(
        run = %context.run_name,
        path = %context.run_path.display(),
        "Run directory ready"
    );

    let data = TabularDataset::load(data_path, config.data.format())?.split_target(target_column)?;
    info!(
        rows = data.features.nrows(),
        features = data.feature_names.len(),
        target = %data.target_name,
        "Training data prepared"
    );

    let kind = config.model.kind;
    let grid = config.model.resolved_grid();
    let outcome = run_search(
        &data.features,
        &data.target,
        &Model::new(kind),
        &grid,
        &config.search,
    )?;
    info!(
        "Best parameters: {} ({} = {})",
        describe(&outcome.best_parameters),
        outcome.scoring,
        outcome.best_score
    );

    let held_out = RegressionMetrics::compute(&outcome.held_out_truth, &outcome.held_out_predictions)?;
    info!(
        "{}",
        format_report(&outcome.held_out_truth, &outcome.held_out_predictions)?
    );

    let cross_validation = cross_validate(
        &outcome.best_estimator,
        &data.features,
        &data.target,
        config.search.cv,
        &FINAL_CV_SCORING,
    )?;
    for result in cross_validation.values() {
        info!(
            metric = %result.metric_name,
            mean = result.mean_score,
            std = result.std_score,
            folds = ?result.fold_scores,
            "Cross-validation of best configuration"
        );
    }

    let artifacts = persist(&outcome, &context, kind.name())?;

    let summary = RunSummary {
        tag: context.tag.clone(),
        run_name: context.run_name.clone(),
        run_path: context.run_path.clone(),
        log_file: context.log_file.clone(),
        dataset: data_path.to_path_buf(),
        target: data.target_name,
        features: data.feature_names,
        model: kind,
        scoring: outcome.scoring,
        best_index: outcome.best_index,
        best_parameters: outcome.best_parameters,
        best_score: outcome.best_score,
        held_out,
        cross_validation,
        trials: outcome.trials,
        artifacts,
        started_at,
        finished_at: Local::now().naive_local(),
    };
    let summary_path = context.run_path.join(SUMMARY_FILE);
    atomic_write_json(&summary_path, &summary)?;
    info!(path = %summary_path.display(), "Run summary written");

    registry.flush_all();
    Ok(PipelineReport {
        context,
        summary,
        summary_path,
    })
}
