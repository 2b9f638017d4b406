//! k-nearest-neighbours regression over Euclidean distance.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{check_fit_input, check_predict_input, unknown_parameter, Regressor};
use crate::error::{MlError, Result};
use crate::params::{as_str, as_usize, ParamSet};

/// How neighbour targets are averaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnnWeights {
    #[default]
    Uniform,
    /// Inverse distance. Exact matches take all the weight.
    Distance,
}

impl KnnWeights {
    fn name(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Distance => "distance",
        }
    }
}

impl fmt::Display for KnnWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KnnWeights {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uniform" => Ok(Self::Uniform),
            "distance" => Ok(Self::Distance),
            other => Err(MlError::invalid_parameter(
                "weights",
                format!("expected 'uniform' or 'distance', got '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnRegressor {
    pub n_neighbors: usize,
    pub weights: KnnWeights,
    /// Row-major training features.
    train_x: Vec<f64>,
    train_y: Vec<f64>,
    n_features: Option<usize>,
}

impl Default for KnnRegressor {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: KnnWeights::Uniform,
            train_x: Vec::new(),
            train_y: Vec::new(),
            n_features: None,
        }
    }
}

/// Max-heap entry; the farthest neighbour sits on top. Equal distances
/// prefer the earlier training row.
#[derive(Debug, PartialEq)]
struct Neighbour {
    dist: f64,
    index: usize,
}

impl Eq for Neighbour {}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbour {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then(self.index.cmp(&other.index))
    }
}

impl KnnRegressor {
    fn nearest(&self, point: &[f64], n_features: usize) -> Vec<Neighbour> {
        let k = self.n_neighbors;
        let mut heap = BinaryHeap::with_capacity(k + 1);
        for (index, row) in self.train_x.chunks_exact(n_features).enumerate() {
            let dist = row
                .iter()
                .zip(point)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            let candidate = Neighbour { dist, index };
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|top| candidate < *top) {
                heap.pop();
                heap.push(candidate);
            }
        }
        heap.into_vec()
    }

    fn aggregate(&self, neighbours: &[Neighbour]) -> f64 {
        match self.weights {
            KnnWeights::Uniform => {
                neighbours.iter().map(|n| self.train_y[n.index]).sum::<f64>()
                    / neighbours.len() as f64
            }
            KnnWeights::Distance => {
                let exact: Vec<f64> = neighbours
                    .iter()
                    .filter(|n| n.dist == 0.0)
                    .map(|n| self.train_y[n.index])
                    .collect();
                if !exact.is_empty() {
                    return exact.iter().sum::<f64>() / exact.len() as f64;
                }
                let (num, den) = neighbours.iter().fold((0.0, 0.0), |(num, den), n| {
                    let w = 1.0 / n.dist;
                    (num + w * self.train_y[n.index], den + w)
                });
                num / den
            }
        }
    }
}

impl Regressor for KnnRegressor {
    fn name(&self) -> &'static str {
        "knn"
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params {
            match name.as_str() {
                "n_neighbors" => {
                    let k = as_usize(name, value)?;
                    if k == 0 {
                        return Err(MlError::invalid_parameter(name, "must be at least 1"));
                    }
                    self.n_neighbors = k;
                }
                "weights" => self.weights = as_str(name, value)?.parse()?,
                _ => return Err(unknown_parameter(self.name(), name)),
            }
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        [
            ("n_neighbors".to_string(), json!(self.n_neighbors)),
            ("weights".to_string(), json!(self.weights.name())),
        ]
        .into_iter()
        .collect()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_neighbors > x.nrows() {
            return Err(MlError::training(format!(
                "n_neighbors = {} exceeds the {} training rows",
                self.n_neighbors,
                x.nrows()
            )));
        }
        self.train_x = x.iter().copied().collect();
        self.train_y = y.to_vec();
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_predict_input(x, self.n_features)?;
        let n_features = x.ncols();
        if n_features == 0 {
            return Err(MlError::model("knn needs at least one feature"));
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let point = row.to_vec();
                self.aggregate(&self.nearest(&point, n_features))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_uniform_average_of_neighbours() {
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let y = array![0.0, 1.0, 2.0, 10.0];
        let mut knn = KnnRegressor {
            n_neighbors: 2,
            ..Default::default()
        };
        knn.fit(&x, &y).unwrap();
        let pred = knn.predict(&array![[0.4], [9.0]]).unwrap();
        assert_eq!(pred.to_vec(), vec![0.5, 6.0]);
    }

    #[test]
    fn test_distance_weights_exact_match() {
        let x = array![[0.0], [4.0]];
        let y = array![1.0, 5.0];
        let mut knn = KnnRegressor {
            n_neighbors: 2,
            weights: KnnWeights::Distance,
            ..Default::default()
        };
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&array![[0.0]]).unwrap()[0], 1.0);
        // distances 1 and 3: (1*1 + 5/3) / (1 + 1/3) = 2
        assert!((knn.predict(&array![[1.0]]).unwrap()[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_too_many_neighbours() {
        let mut knn = KnnRegressor::default();
        let err = knn.fit(&array![[1.0], [2.0]], &array![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, MlError::Training(_)));
    }

    #[test]
    fn test_params() {
        let mut knn = KnnRegressor::default();
        let params: ParamSet = [
            ("n_neighbors".to_string(), json!(3)),
            ("weights".to_string(), json!("distance")),
        ]
        .into_iter()
        .collect();
        knn.set_params(&params).unwrap();
        assert_eq!(knn.params(), params);

        let bad: ParamSet = [("weights".to_string(), json!("gaussian"))]
            .into_iter()
            .collect();
        assert!(knn.set_params(&bad).unwrap_err().is_config());
    }
}
