//! Regression estimators.
//!
//! Every estimator implements [`Regressor`]. Hyperparameters travel as a
//! [`ParamSet`] so a grid can be applied to any estimator by name; fitted
//! state stays in plain Rust types so the [`Model`] wrapper round-trips
//! through bincode.

pub mod forest;
pub mod knn;
pub mod ridge;
pub mod tree;

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{MlError, Result};
use crate::params::{HyperparameterGrid, ParamSet};

pub use forest::RandomForestRegressor;
pub use knn::{KnnRegressor, KnnWeights};
pub use ridge::RidgeRegressor;
pub use tree::DecisionTreeRegressor;

/// A trainable regression estimator.
pub trait Regressor: Send + Sync {
    /// Identifier used in configuration and artifact names.
    fn name(&self) -> &'static str;

    /// Apply hyperparameters. Unknown names and ill-typed values are errors;
    /// parameters not mentioned keep their current value.
    fn set_params(&mut self, params: &ParamSet) -> Result<()>;

    /// Current value of every hyperparameter.
    fn params(&self) -> ParamSet;

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Estimator families selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Ridge,
    Knn,
    #[default]
    RandomForest,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Ridge, ModelKind::Knn, ModelKind::RandomForest];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ridge => "ridge",
            Self::Knn => "knn",
            Self::RandomForest => "random_forest",
        }
    }

    /// Grid searched when configuration supplies none.
    pub fn default_grid(&self) -> HyperparameterGrid {
        match self {
            Self::Ridge => HyperparameterGrid::new()
                .with_param("alpha", [0.01, 0.1, 1.0, 10.0, 100.0])
                .with_param("fit_intercept", [true]),
            Self::Knn => HyperparameterGrid::new()
                .with_param("n_neighbors", [3, 5, 7, 9])
                .with_param("weights", ["uniform", "distance"]),
            Self::RandomForest => HyperparameterGrid::new()
                .with_param("n_estimators", [100, 200, 300])
                .with_param("min_samples_split", [3, 4, 5])
                .with_param("min_samples_leaf", [1, 2, 3]),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| MlError::config(format!("unknown model '{s}'")))
    }
}

/// Any supported estimator, fitted or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Model {
    Ridge(RidgeRegressor),
    Knn(KnnRegressor),
    RandomForest(RandomForestRegressor),
}

impl Model {
    pub fn new(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Ridge => Self::Ridge(RidgeRegressor::default()),
            ModelKind::Knn => Self::Knn(KnnRegressor::default()),
            ModelKind::RandomForest => Self::RandomForest(RandomForestRegressor::default()),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Ridge(_) => ModelKind::Ridge,
            Self::Knn(_) => ModelKind::Knn,
            Self::RandomForest(_) => ModelKind::RandomForest,
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            Self::Ridge(m) => m,
            Self::Knn(m) => m,
            Self::RandomForest(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            Self::Ridge(m) => m,
            Self::Knn(m) => m,
            Self::RandomForest(m) => m,
        }
    }
}

impl Regressor for Model {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        self.inner_mut().set_params(params)
    }

    fn params(&self) -> ParamSet {
        self.inner().params()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }
}

/// Reject training data an estimator cannot fit.
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(MlError::training("cannot fit on zero rows"));
    }
    if x.nrows() != y.len() {
        return Err(MlError::training(format!(
            "{} feature rows but {} targets",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(MlError::training("features contain NaN or infinite values"));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(MlError::training("target contains NaN or infinite values"));
    }
    Ok(())
}

/// Reject prediction input that does not match the fitted shape.
pub(crate) fn check_predict_input(x: &Array2<f64>, n_features: Option<usize>) -> Result<()> {
    let expected = n_features.ok_or_else(|| MlError::model("model has not been fitted"))?;
    if x.ncols() != expected {
        return Err(MlError::model(format!(
            "model was fitted on {expected} features, got {}",
            x.ncols()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(MlError::model("features contain NaN or infinite values"));
    }
    Ok(())
}

/// Reject parameter names an estimator does not know.
pub(crate) fn unknown_parameter(model: &str, name: &str) -> MlError {
    MlError::invalid_parameter(name, format!("not a parameter of {model}"))
}

pub(crate) fn opt_usize_value(v: Option<usize>) -> serde_json::Value {
    v.map_or(serde_json::Value::Null, |n| json!(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_model_kind_names() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.name().parse::<ModelKind>().unwrap(), kind);
            assert_eq!(Model::new(kind).kind(), kind);
            assert_eq!(Model::new(kind).name(), kind.name());
        }
        assert!("svm".parse::<ModelKind>().unwrap_err().is_config());
    }

    #[test]
    fn test_default_grids_apply_to_their_model() {
        for kind in ModelKind::ALL {
            let grid = kind.default_grid();
            grid.validate().unwrap();
            for candidate in grid.candidates() {
                Model::new(kind).set_params(&candidate).unwrap();
            }
        }
    }

    #[test]
    fn test_random_forest_default_grid() {
        assert_eq!(ModelKind::RandomForest.default_grid().size(), 27);
    }

    #[test]
    fn test_check_fit_input_rejects_non_finite() {
        let x = Array2::from_shape_vec((2, 1), vec![1.0, f64::NAN]).unwrap();
        let y = Array1::from_vec(vec![1.0, 2.0]);
        assert!(matches!(check_fit_input(&x, &y), Err(MlError::Training(_))));

        let x = Array2::from_shape_vec((2, 1), vec![1.0, 2.0]).unwrap();
        let y = Array1::from_vec(vec![1.0, f64::INFINITY]);
        assert!(check_fit_input(&x, &y).is_err());
    }

    #[test]
    fn test_model_bincode_round_trip_keeps_params() {
        let mut model = Model::new(ModelKind::Knn);
        model
            .set_params(&[("n_neighbors".to_string(), json!(2))].into_iter().collect())
            .unwrap();
        let bytes = bincode::serialize(&model).unwrap();
        let restored: Model = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.params(), model.params());
    }
}
