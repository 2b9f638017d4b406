//! Bagged ensemble of regression trees.

use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::tree::DecisionTreeRegressor;
use super::{check_fit_input, check_predict_input, opt_usize_value, unknown_parameter, Regressor};
use crate::error::{MlError, Result};
use crate::params::{as_usize, ParamSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: Option<usize>,
    /// Tree `i` bootstraps with a ChaCha8 stream seeded by `random_state + i`.
    pub random_state: u64,
    trees: Vec<DecisionTreeRegressor>,
    n_features: Option<usize>,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: 0,
            trees: Vec::new(),
            n_features: None,
        }
    }
}

impl RandomForestRegressor {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn base_tree(&self) -> DecisionTreeRegressor {
        DecisionTreeRegressor::new(
            self.max_depth,
            self.min_samples_split,
            self.min_samples_leaf,
            self.max_features,
        )
    }
}

impl Regressor for RandomForestRegressor {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        let mut tree_params = ParamSet::new();
        for (name, value) in params {
            match name.as_str() {
                "n_estimators" => {
                    let n = as_usize(name, value)?;
                    if n == 0 {
                        return Err(MlError::invalid_parameter(name, "must be at least 1"));
                    }
                    self.n_estimators = n;
                }
                "random_state" => {
                    self.random_state = value.as_u64().ok_or_else(|| {
                        MlError::invalid_parameter(name, format!("expected a seed, got {value}"))
                    })?;
                }
                "max_depth" | "min_samples_split" | "min_samples_leaf" | "max_features" => {
                    tree_params.insert(name.clone(), value.clone());
                }
                _ => return Err(unknown_parameter(self.name(), name)),
            }
        }

        if !tree_params.is_empty() {
            let mut tree = self.base_tree();
            tree.set_params(&tree_params)?;
            self.max_depth = tree.max_depth;
            self.min_samples_split = tree.min_samples_split;
            self.min_samples_leaf = tree.min_samples_leaf;
            self.max_features = tree.max_features;
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        [
            ("max_depth".to_string(), opt_usize_value(self.max_depth)),
            ("max_features".to_string(), opt_usize_value(self.max_features)),
            ("min_samples_leaf".to_string(), json!(self.min_samples_leaf)),
            ("min_samples_split".to_string(), json!(self.min_samples_split)),
            ("n_estimators".to_string(), json!(self.n_estimators)),
            ("random_state".to_string(), json!(self.random_state)),
        ]
        .into_iter()
        .collect()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        let template = self.base_tree();
        let base_seed = self.random_state;

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| -> Result<DecisionTreeRegressor> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(i as u64));
                let sample: Vec<usize> = (0..n_samples)
                    .map(|_| rng.gen_range(0..n_samples))
                    .collect();
                let x_boot = x.select(Axis(0), &sample);
                let y_boot = y.select(Axis(0), &sample);

                let mut tree = template.clone();
                tree.fit_with_rng(&x_boot, &y_boot, &mut rng)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_predict_input(x, self.n_features)?;
        let mut sum = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            sum += &tree.predict(x)?;
        }
        Ok(sum / self.trees.len() as f64)
    }
}
