//! Hyperparameter grids and parameter sets.
//!
//! A grid maps parameter names to candidate values. Its search space is the
//! Cartesian product of all candidate lists, enumerated with parameter names
//! in sorted order and the last name varying fastest. Enumeration order is
//! what breaks ties between equally scoring configurations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MlError, Result};

/// One configuration: parameter name to scalar value, sorted by name.
pub type ParamSet = BTreeMap<String, Value>;

/// Candidate values per parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperparameterGrid {
    params: BTreeMap<String, Vec<Value>>,
}

impl HyperparameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_param<V: Into<Value>>(
        mut self,
        name: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.insert(name, values);
        self
    }

    /// Set the candidate values of one parameter, replacing earlier ones.
    pub fn insert<V: Into<Value>>(&mut self, name: &str, values: impl IntoIterator<Item = V>) {
        self.params
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameter names in enumeration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Number of configurations in the search space.
    pub fn size(&self) -> usize {
        if self.params.is_empty() {
            return 0;
        }
        self.params.values().map(Vec::len).product()
    }

    /// Reject grids that cannot produce an exhaustive search.
    pub fn validate(&self) -> Result<()> {
        if self.params.is_empty() {
            return Err(MlError::config("hyperparameter grid is empty"));
        }
        for (name, values) in &self.params {
            if values.is_empty() {
                return Err(MlError::config(format!(
                    "parameter '{name}' has no candidate values"
                )));
            }
            if let Some(bad) = values.iter().find(|v| v.is_array() || v.is_object()) {
                return Err(MlError::config(format!(
                    "parameter '{name}' has a non-scalar candidate: {bad}"
                )));
            }
        }
        Ok(())
    }

    /// Every configuration of the grid, in enumeration order.
    pub fn candidates(&self) -> Vec<ParamSet> {
        if self.params.is_empty() {
            return Vec::new();
        }
        let mut configs = vec![ParamSet::new()];
        for (key, values) in &self.params {
            let mut next = Vec::with_capacity(configs.len() * values.len());
            for config in &configs {
                for value in values {
                    let mut c = config.clone();
                    c.insert(key.clone(), value.clone());
                    next.push(c);
                }
            }
            configs = next;
        }
        configs
    }
}

impl From<BTreeMap<String, Vec<Value>>> for HyperparameterGrid {
    fn from(params: BTreeMap<String, Vec<Value>>) -> Self {
        Self { params }
    }
}

/// Read a non-negative integer parameter.
pub fn as_usize(name: &str, value: &Value) -> Result<usize> {
    value
        .as_u64()
        .and_then(|v| usize::try_from(v).ok())
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as usize)
        })
        .ok_or_else(|| MlError::invalid_parameter(name, format!("expected an integer, got {value}")))
}

/// Read an integer parameter where `null` means "unlimited".
pub fn as_opt_usize(name: &str, value: &Value) -> Result<Option<usize>> {
    if value.is_null() {
        Ok(None)
    } else {
        as_usize(name, value).map(Some)
    }
}

/// Read a numeric parameter.
pub fn as_f64(name: &str, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| MlError::invalid_parameter(name, format!("expected a number, got {value}")))
}

/// Read a boolean parameter.
pub fn as_bool(name: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| MlError::invalid_parameter(name, format!("expected a boolean, got {value}")))
}

/// Read a string parameter.
pub fn as_str<'a>(name: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| MlError::invalid_parameter(name, format!("expected a string, got {value}")))
}

/// Render a parameter set as `a=1, b=2` for log lines.
pub fn describe(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_empty_grid_is_config_error() {
        let err = HyperparameterGrid::new().validate().unwrap_err();
        assert!(err.is_config());
        assert_eq!(HyperparameterGrid::new().size(), 0);
        assert!(HyperparameterGrid::new().candidates().is_empty());
    }

    #[test]
    fn test_empty_candidate_list_is_config_error() {
        let grid = HyperparameterGrid::new()
            .with_param("alpha", [0.1])
            .with_param("k", Vec::<i64>::new());
        assert!(matches!(grid.validate(), Err(MlError::Config(_))));
    }

    #[test]
    fn test_non_scalar_candidate_rejected() {
        let grid = HyperparameterGrid::new().with_param("x", [json!([1, 2])]);
        assert!(grid.validate().is_err());
    }

    #[test]
    fn test_enumeration_order_last_key_fastest() {
        let grid = HyperparameterGrid::new()
            .with_param("b", [1, 2])
            .with_param("a", ["x", "y"]);
        let candidates = grid.candidates();
        let rendered: Vec<String> = candidates.iter().map(describe).collect();
        assert_eq!(
            rendered,
            vec![
                "a=\"x\", b=1",
                "a=\"x\", b=2",
                "a=\"y\", b=1",
                "a=\"y\", b=2",
            ]
        );
        assert_eq!(grid.size(), 4);
    }

    #[test]
    fn test_single_parameter_keeps_value_order() {
        let grid = HyperparameterGrid::new().with_param("n", [10, 20]);
        let candidates = grid.candidates();
        assert_eq!(candidates[0]["n"], json!(10));
        assert_eq!(candidates[1]["n"], json!(20));
    }

    #[test]
    fn test_grid_deserializes_from_json_object() {
        let grid: HyperparameterGrid =
            serde_json::from_str(r#"{"n_estimators": [100, 200], "max_depth": [null, 4]}"#)
                .unwrap();
        assert_eq!(grid.size(), 4);
        assert_eq!(grid.names().collect::<Vec<_>>(), vec!["max_depth", "n_estimators"]);
    }

    #[test]
    fn test_value_readers() {
        assert_eq!(as_usize("k", &json!(5)).unwrap(), 5);
        assert_eq!(as_usize("k", &json!(5.0)).unwrap(), 5);
        assert!(as_usize("k", &json!(-1)).is_err());
        assert!(as_usize("k", &json!(2.5)).is_err());
        assert_eq!(as_opt_usize("d", &Value::Null).unwrap(), None);
        assert_eq!(as_f64("a", &json!(1)).unwrap(), 1.0);
        assert!(as_bool("b", &json!("yes")).is_err());
        assert_eq!(as_str("w", &json!("distance")).unwrap(), "distance");
    }
}
