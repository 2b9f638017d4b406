//! L2-regularised least squares solved through the normal equations.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{check_fit_input, check_predict_input, unknown_parameter, Regressor};
use crate::error::{MlError, Result};
use crate::params::{as_bool, as_f64, ParamSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegressor {
    pub alpha: f64,
    pub fit_intercept: bool,
    coefficients: Option<Vec<f64>>,
    intercept: f64,
}

impl Default for RidgeRegressor {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            fit_intercept: true,
            coefficients: None,
            intercept: 0.0,
        }
    }
}

impl RidgeRegressor {
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Regressor for RidgeRegressor {
    fn name(&self) -> &'static str {
        "ridge"
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params {
            match name.as_str() {
                "alpha" => {
                    let alpha = as_f64(name, value)?;
                    if !(alpha >= 0.0 && alpha.is_finite()) {
                        return Err(MlError::invalid_parameter(name, "must be a finite value >= 0"));
                    }
                    self.alpha = alpha;
                }
                "fit_intercept" => self.fit_intercept = as_bool(name, value)?,
                _ => return Err(unknown_parameter(self.name(), name)),
            }
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        [
            ("alpha".to_string(), json!(self.alpha)),
            ("fit_intercept".to_string(), json!(self.fit_intercept)),
        ]
        .into_iter()
        .collect()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_features = x.ncols();

        let (x_mean, y_mean) = if self.fit_intercept {
            (
                x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features)),
                y.mean().unwrap_or(0.0),
            )
        } else {
            (Array1::zeros(n_features), 0.0)
        };
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let mut gram = xc.t().dot(&xc);
        for i in 0..n_features {
            gram[[i, i]] += self.alpha;
        }
        let rhs = xc.t().dot(&yc);

        let w = cholesky_solve(&gram, &rhs).ok_or_else(|| {
            MlError::training(format!(
                "normal equations are singular (alpha = {}); increase alpha",
                self.alpha
            ))
        })?;

        self.intercept = if self.fit_intercept {
            y_mean - x_mean.dot(&w)
        } else {
            0.0
        };
        self.coefficients = Some(w.to_vec());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_predict_input(x, self.coefficients.as_ref().map(Vec::len))?;
        let w = Array1::from_vec(self.coefficients.clone().unwrap_or_default());
        Ok(x.dot(&w) + self.intercept)
    }
}

/// Solve `a * x = b` for symmetric positive definite `a`.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 1e-12 * a[[i, i]].abs().max(1.0) {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    Some(x)
}
