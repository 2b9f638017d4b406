//! Exhaustive cross-validated hyperparameter search.
//!
//! The dataset is split once into a training and a held-out partition. Every
//! configuration of the grid is scored by K-fold cross-validation on the
//! training partition, the best one is refit on the whole training partition
//! and used to predict the held-out rows.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MlError, Result};
use crate::metrics::{mean_std, Scoring};
use crate::models::Regressor;
use crate::params::{describe, HyperparameterGrid, ParamSet};
use crate::split::{k_fold, take_rows, take_targets, train_test_split, Split};

/// Split, fold and scoring settings of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Fraction of rows held out from the search.
    pub test_size: f64,
    /// Seed of the train/held-out shuffle.
    pub random_state: u64,
    /// Number of cross-validation folds.
    pub cv: usize,
    /// Worker threads for trials; 0 uses every core.
    pub n_jobs: usize,
    pub scoring: Scoring,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            cv: 5,
            n_jobs: 0,
            scoring: Scoring::R2,
        }
    }
}

impl SearchSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(MlError::invalid_input(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.cv < 2 {
            return Err(MlError::invalid_input(format!(
                "cv must be at least 2, got {}",
                self.cv
            )));
        }
        Ok(())
    }
}

/// Cross-validation score of one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Position in grid enumeration order.
    pub index: usize,
    pub parameters: ParamSet,
    pub mean_score: f64,
    pub std_score: f64,
    pub per_fold_scores: Vec<f64>,
}

/// Result of a completed search.
#[derive(Debug, Clone)]
pub struct SearchOutcome<M> {
    /// Winning configuration refit on the full training partition.
    pub best_estimator: M,
    pub best_parameters: ParamSet,
    pub best_score: f64,
    pub best_index: usize,
    pub held_out_predictions: Array1<f64>,
    pub held_out_truth: Array1<f64>,
    pub trials: Vec<TrialResult>,
    pub scoring: Scoring,
}

/// Run the search. No estimator is fitted until the grid, the settings and
/// every candidate configuration have been validated.
pub fn run_search<M>(
    features: &Array2<f64>,
    target: &Array1<f64>,
    base_model: &M,
    grid: &HyperparameterGrid,
    settings: &SearchSettings,
) -> Result<SearchOutcome<M>>
where
    M: Regressor + Clone,
{
    grid.validate()?;
    settings.validate()?;
    if features.nrows() != target.len() {
        return Err(MlError::invalid_input(format!(
            "{} feature rows but {} targets",
            features.nrows(),
            target.len()
        )));
    }

    let split = train_test_split(features.nrows(), settings.test_size, settings.random_state)?;
    if split.train_indices.len() < settings.cv {
        return Err(MlError::invalid_input(format!(
            "{} training rows cannot fill {} folds",
            split.train_indices.len(),
            settings.cv
        )));
    }

    let candidates = grid.candidates();
    let prepared = candidates
        .iter()
        .map(|params| -> Result<M> {
            let mut model = base_model.clone();
            model.set_params(params)?;
            Ok(model)
        })
        .collect::<Result<Vec<M>>>()?;

    let x_train = take_rows(features, &split.train_indices);
    let y_train = take_targets(target, &split.train_indices);
    let x_test = take_rows(features, &split.test_indices);
    let y_test = take_targets(target, &split.test_indices);
    let folds = k_fold(x_train.nrows(), settings.cv)?;

    info!(
        model = base_model.name(),
        candidates = candidates.len(),
        folds = settings.cv,
        train_rows = x_train.nrows(),
        held_out_rows = x_test.nrows(),
        scoring = %settings.scoring,
        "Starting grid search"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.n_jobs)
        .build()
        .map_err(|e| MlError::training(format!("failed to start worker pool: {e}")))?;

    let trials = pool.install(|| {
        prepared
            .par_iter()
            .zip(candidates.par_iter())
            .enumerate()
            .map(|(index, (model, params))| -> Result<TrialResult> {
                let per_fold_scores =
                    score_folds(model, &x_train, &y_train, &folds, settings.scoring)?;
                let (mean_score, std_score) = mean_std(&per_fold_scores);
                debug!(
                    trial = index,
                    params = %describe(params),
                    mean = mean_score,
                    std = std_score,
                    folds = ?per_fold_scores,
                    "Trial scored"
                );
                Ok(TrialResult {
                    index,
                    parameters: params.clone(),
                    mean_score,
                    std_score,
                    per_fold_scores,
                })
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let best_index = select_best(&trials)
        .ok_or_else(|| MlError::training("search produced no trials"))?;
    let best = &trials[best_index];

    let mut best_estimator = prepared[best_index].clone();
    best_estimator.fit(&x_train, &y_train)?;
    let held_out_predictions = best_estimator.predict(&x_test)?;

    info!(
        best_index,
        best_score = best.mean_score,
        params = %describe(&best.parameters),
        "Grid search finished"
    );

    Ok(SearchOutcome {
        best_estimator,
        best_parameters: best.parameters.clone(),
        best_score: best.mean_score,
        best_index,
        held_out_predictions,
        held_out_truth: y_test,
        trials,
        scoring: settings.scoring,
    })
}

fn score_folds<M: Regressor + Clone>(
    model: &M,
    x: &Array2<f64>,
    y: &Array1<f64>,
    folds: &[Split],
    scoring: Scoring,
) -> Result<Vec<f64>> {
    folds
        .iter()
        .map(|fold| {
            let mut m = model.clone();
            m.fit(
                &take_rows(x, &fold.train_indices),
                &take_targets(y, &fold.train_indices),
            )?;
            let pred = m.predict(&take_rows(x, &fold.test_indices))?;
            scoring.score(&take_targets(y, &fold.test_indices), &pred)
        })
        .collect()
}

/// Index of the trial with the strictly highest mean score. Ties keep the
/// earliest trial; NaN ranks below every number.
pub fn select_best(trials: &[TrialResult]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, trial) in trials.iter().enumerate() {
        let score = trial.mean_score;
        let better = match best {
            None => true,
            Some((_, current)) => (current.is_nan() && !score.is_nan()) || score > current,
        };
        if better {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

/// Fold scores of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationResult {
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    pub metric_name: String,
}

impl CrossValidationResult {
    pub fn from_scores(scores: Vec<f64>, metric_name: &str) -> Self {
        let (mean_score, std_score) = mean_std(&scores);
        Self {
            fold_scores: scores,
            mean_score,
            std_score,
            metric_name: metric_name.to_string(),
        }
    }
}

/// Score a fixed configuration with unshuffled K-fold over the given rows,
/// once per metric. Each fold is fitted once and scored with every metric.
pub fn cross_validate<M: Regressor + Clone>(
    model: &M,
    features: &Array2<f64>,
    target: &Array1<f64>,
    cv: usize,
    scorings: &[Scoring],
) -> Result<BTreeMap<String, CrossValidationResult>> {
    if features.nrows() != target.len() {
        return Err(MlError::invalid_input(format!(
            "{} feature rows but {} targets",
            features.nrows(),
            target.len()
        )));
    }
    let folds = k_fold(features.nrows(), cv)?;
    let mut per_metric: Vec<Vec<f64>> = vec![Vec::with_capacity(cv); scorings.len()];

    for fold in &folds {
        let mut m = model.clone();
        m.fit(
            &take_rows(features, &fold.train_indices),
            &take_targets(target, &fold.train_indices),
        )?;
        let truth = take_targets(target, &fold.test_indices);
        let pred = m.predict(&take_rows(features, &fold.test_indices))?;
        for (scores, scoring) in per_metric.iter_mut().zip(scorings) {
            scores.push(scoring.score(&truth, &pred)?);
        }
    }

    Ok(scorings
        .iter()
        .zip(per_metric)
        .map(|(scoring, scores)| {
            (
                scoring.name().to_string(),
                CrossValidationResult::from_scores(scores, scoring.name()),
            )
        })
        .collect())
}
