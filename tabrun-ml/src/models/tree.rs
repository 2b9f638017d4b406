//! CART regression tree, the base learner of the random forest.

use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{check_fit_input, check_predict_input, opt_usize_value, unknown_parameter, Regressor};
use crate::error::{MlError, Result};
use crate::params::{as_opt_usize, as_usize, ParamSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Squared-error regression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` examines all of them.
    pub max_features: Option<usize>,
    root: Option<TreeNode>,
    n_features: Option<usize>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new(None, 2, 1, None)
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    cost: f64,
}

impl DecisionTreeRegressor {
    /// Unfitted tree with the given growth limits.
    pub fn new(
        max_depth: Option<usize>,
        min_samples_split: usize,
        min_samples_leaf: usize,
        max_features: Option<usize>,
    ) -> Self {
        Self {
            max_depth,
            min_samples_split,
            min_samples_leaf,
            max_features,
            root: None,
            n_features: None,
        }
    }

    /// Fit with an explicit random source for feature subsampling.
    pub fn fit_with_rng<R: Rng>(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rng: &mut R,
    ) -> Result<()> {
        check_fit_input(x, y)?;
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.n_features = Some(x.ncols());
        self.root = Some(self.build(x, y, indices, 0, rng));
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    fn build<R: Rng>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut R,
    ) -> TreeNode {
        let n = indices.len();
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n as f64;
        let leaf = TreeNode::Leaf {
            value: mean,
            n_samples: n,
        };

        let pure = indices.iter().all(|&i| y[i] == y[indices[0]]);
        if pure
            || n < self.min_samples_split
            || n < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
        {
            return leaf;
        }

        let Some(best) = self.best_split(x, y, &indices, rng) else {
            return leaf;
        };
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, best.feature]] <= best.threshold);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(x, y, left, depth + 1, rng)),
            right: Box::new(self.build(x, y, right, depth + 1, rng)),
        }
    }

    /// Lowest total squared error over candidate features. Each feature is
    /// scanned once in sorted order with running sums.
    fn best_split<R: Rng>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        rng: &mut R,
    ) -> Option<BestSplit> {
        let n_features = x.ncols();
        let features: Vec<usize> = match self.max_features {
            Some(k) if k < n_features => {
                let mut picked = sample(rng, n_features, k.max(1)).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..n_features).collect(),
        };

        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_cost = total_sq - total_sum * total_sum / n as f64;

        let mut best: Option<BestSplit> = None;
        let mut order = indices.to_vec();
        for feature in features {
            order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..n - 1 {
                let yi = y[order[pos]];
                left_sum += yi;
                left_sq += yi * yi;

                let left_n = pos + 1;
                let right_n = n - left_n;
                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }
                let here = x[[order[pos], feature]];
                let next = x[[order[pos + 1], feature]];
                if here == next {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let cost = (left_sq - left_sum * left_sum / left_n as f64)
                    + (right_sq - right_sum * right_sum / right_n as f64);

                if cost < parent_cost - 1e-12 && best.as_ref().is_none_or(|b| cost < b.cost) {
                    // The midpoint of adjacent floats can round up to `next`.
                    let mid = here + (next - here) / 2.0;
                    best = Some(BestSplit {
                        feature,
                        threshold: if mid >= next { here } else { mid },
                        cost,
                    });
                }
            }
        }
        best
    }
}

impl Regressor for DecisionTreeRegressor {
    fn name(&self) -> &'static str {
        "decision_tree"
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params {
            match name.as_str() {
                "max_depth" => self.max_depth = as_opt_usize(name, value)?,
                "min_samples_split" => {
                    let v = as_usize(name, value)?;
                    if v < 2 {
                        return Err(MlError::invalid_parameter(name, "must be at least 2"));
                    }
                    self.min_samples_split = v;
                }
                "min_samples_leaf" => {
                    let v = as_usize(name, value)?;
                    if v < 1 {
                        return Err(MlError::invalid_parameter(name, "must be at least 1"));
                    }
                    self.min_samples_leaf = v;
                }
                "max_features" => self.max_features = as_opt_usize(name, value)?,
                _ => return Err(unknown_parameter(self.name(), name)),
            }
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        [
            ("max_depth".to_string(), opt_usize_value(self.max_depth)),
            ("max_features".to_string(), opt_usize_value(self.max_features)),
            ("min_samples_leaf".to_string(), json!(self.min_samples_leaf)),
            ("min_samples_split".to_string(), json!(self.min_samples_split)),
        ]
        .into_iter()
        .collect()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_with_rng(x, y, &mut ChaCha8Rng::seed_from_u64(0))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_predict_input(x, self.n_features)?;
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| MlError::model("tree has not been fitted"))?;
        Ok(x.rows()
            .into_iter()
            .map(|row| root.predict_row(&row.to_vec()))
            .collect())
    }
}
