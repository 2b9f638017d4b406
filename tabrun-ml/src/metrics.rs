//! Regression metrics, scoring functions and the metrics report.

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{MlError, Result};

/// Held-out regression metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mae: f64,
    pub mse: f64,
    pub explained_variance: f64,
    pub max_error: f64,
}

impl RegressionMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_pair(y_true, y_pred)?;
        Ok(Self {
            r2: r2(y_true, y_pred),
            mae: mean_absolute_error(y_true, y_pred),
            mse: mean_squared_error(y_true, y_pred),
            explained_variance: explained_variance(y_true, y_pred),
            max_error: max_error(y_true, y_pred),
        })
    }
}

/// Render the fixed four-line regression report.
pub fn format_report(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<String> {
    let m = RegressionMetrics::compute(y_true, y_pred)?;
    Ok(format!(
        "Regression metrics:\n    -> R2:  {}\n    -> MAE: {}\n    -> MSE: {}\n    -> VAR: {}",
        m.r2, m.mae, m.mse, m.explained_variance
    ))
}

fn check_pair(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.is_empty() {
        return Err(MlError::invalid_input("cannot score an empty prediction set"));
    }
    if y_true.len() != y_pred.len() {
        return Err(MlError::invalid_input(format!(
            "length mismatch: {} true values, {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Coefficient of determination. A constant target scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r2(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    finite_ratio_score(ss_res, ss_tot)
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(f64::abs).mean().unwrap_or(0.0)
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(|d| d * d).mean().unwrap_or(0.0)
}

/// `1 - Var(y - y_hat) / Var(y)`, with the same constant-target handling as [`r2`].
pub fn explained_variance(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let residual = y_true - y_pred;
    finite_ratio_score(residual.var(0.0), y_true.var(0.0))
}

pub fn max_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .fold(0.0, f64::max)
}

fn finite_ratio_score(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        if numerator == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - numerator / denominator
    }
}

/// Cross-validation scoring function. Every score is "greater is better";
/// error metrics are negated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    #[default]
    R2,
    NegMeanAbsoluteError,
    NegMeanSquaredError,
    ExplainedVariance,
    NegMaxError,
}

impl Scoring {
    pub const ALL: [Scoring; 5] = [
        Scoring::R2,
        Scoring::NegMeanAbsoluteError,
        Scoring::NegMeanSquaredError,
        Scoring::ExplainedVariance,
        Scoring::NegMaxError,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::R2 => "r2",
            Self::NegMeanAbsoluteError => "neg_mean_absolute_error",
            Self::NegMeanSquaredError => "neg_mean_squared_error",
            Self::ExplainedVariance => "explained_variance",
            Self::NegMaxError => "neg_max_error",
        }
    }

    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        check_pair(y_true, y_pred)?;
        Ok(match self {
            Self::R2 => r2(y_true, y_pred),
            Self::NegMeanAbsoluteError => -mean_absolute_error(y_true, y_pred),
            Self::NegMeanSquaredError => -mean_squared_error(y_true, y_pred),
            Self::ExplainedVariance => explained_variance(y_true, y_pred),
            Self::NegMaxError => -max_error(y_true, y_pred),
        })
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scoring {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|scoring| scoring.name() == s)
            .ok_or_else(|| MlError::config(format!("unknown scoring function '{s}'")))
    }
}

/// Mean and population standard deviation of fold scores.
pub fn mean_std(scores: &[f64]) -> (f64, f64) {
    if scores.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_perfect_prediction() {
        let y = array![1.0, 2.0, 3.0];
        let m = RegressionMetrics::compute(&y, &y).unwrap();
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.mse, 0.0);
        assert_eq!(m.explained_variance, 1.0);
        assert_eq!(m.max_error, 0.0);
    }

    #[test]
    fn test_known_values() {
        let y = array![3.0, -0.5, 2.0, 7.0];
        let p = array![2.5, 0.0, 2.0, 8.0];
        assert!(close(r2(&y, &p), 0.948_608_137_044_967_9));
        assert!(close(mean_absolute_error(&y, &p), 0.5));
        assert!(close(mean_squared_error(&y, &p), 0.375));
        assert!(close(explained_variance(&y, &p), 0.957_173_447_537_473_2));
        assert!(close(max_error(&y, &p), 1.0));
    }

    #[test]
    fn test_constant_target() {
        let y = array![2.0, 2.0];
        assert_eq!(r2(&y, &array![2.0, 2.0]), 1.0);
        assert_eq!(r2(&y, &array![1.0, 3.0]), 0.0);
    }

    #[test]
    fn test_report_layout() {
        let y = array![1.0, 2.0];
        let report = format_report(&y, &y).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Regression metrics:",
                "    -> R2:  1",
                "    -> MAE: 0",
                "    -> MSE: 0",
                "    -> VAR: 1",
            ]
        );
    }

    #[test]
    fn test_report_rejects_bad_input() {
        let empty = Array1::<f64>::zeros(0);
        assert!(matches!(
            format_report(&empty, &empty),
            Err(MlError::InvalidInput(_))
        ));
        assert!(matches!(
            format_report(&array![1.0, 2.0], &array![1.0]),
            Err(MlError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_scoring_sign_and_names() {
        let y = array![1.0, 2.0];
        let p = array![2.0, 2.0];
        assert_eq!(Scoring::NegMeanAbsoluteError.score(&y, &p).unwrap(), -0.5);
        assert_eq!(Scoring::NegMaxError.score(&y, &p).unwrap(), -1.0);
        for scoring in Scoring::ALL {
            assert_eq!(scoring.name().parse::<Scoring>().unwrap(), scoring);
        }
        assert!("accuracy".parse::<Scoring>().is_err());
        let json = serde_json::to_string(&Scoring::NegMeanSquaredError).unwrap();
        assert_eq!(json, "\"neg_mean_squared_error\"");
    }

    #[test]
    fn test_mean_std() {
        let (mean, std) = mean_std(&[1.0, 3.0]);
        assert_eq!(mean, 2.0);
        assert_eq!(std, 1.0);
    }
}
