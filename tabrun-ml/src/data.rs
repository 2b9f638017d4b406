//! Delimited text datasets.
//!
//! The first line is the header. Cells are trimmed and stripped of
//! surrounding quotes. Values are kept as text until a numeric view is
//! requested, so a bad cell is reported with its row and column name.

use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MlError, Result};

/// Parsing options for delimited files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvFormat {
    pub delimiter: char,
    pub decimal: char,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: ',',
            decimal: '.',
        }
    }
}

impl CsvFormat {
    pub fn validate(&self) -> Result<()> {
        if self.delimiter == self.decimal {
            return Err(MlError::config(format!(
                "delimiter and decimal separator are both '{}'",
                self.delimiter
            )));
        }
        if self.delimiter == '"' || self.delimiter == '\n' || self.delimiter == '\r' {
            return Err(MlError::config(format!(
                "'{}' cannot be used as a delimiter",
                self.delimiter.escape_default()
            )));
        }
        Ok(())
    }
}

/// Features and target pulled out of a dataset.
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub feature_names: Vec<String>,
    pub features: Array2<f64>,
    pub target_name: String,
    pub target: Array1<f64>,
}

/// A header plus rows of raw cells.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularDataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    format: CsvFormat,
}

impl TabularDataset {
    pub fn load(path: &Path, format: CsvFormat) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MlError::dataset(format!("failed to read {}: {e}", path.display())))?;
        let dataset = Self::parse(&content, format)?;
        debug!(
            path = %path.display(),
            rows = dataset.n_rows(),
            columns = dataset.columns.len(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    pub fn parse(content: &str, format: CsvFormat) -> Result<Self> {
        format.validate()?;
        let split = |line: &str| -> Vec<String> {
            line.split(format.delimiter)
                .map(|s| s.trim().trim_matches('"').to_string())
                .collect()
        };

        let mut lines = content.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let (_, header) = lines
            .next()
            .ok_or_else(|| MlError::dataset("empty file: no header row"))?;
        let columns = split(header);
        for (i, name) in columns.iter().enumerate() {
            if name.is_empty() {
                return Err(MlError::dataset(format!("column {} has an empty name", i + 1)));
            }
            if columns[..i].contains(name) {
                return Err(MlError::dataset(format!("duplicate column '{name}'")));
            }
        }

        let mut rows = Vec::new();
        for (line_no, line) in lines {
            let row = split(line);
            if row.len() != columns.len() {
                return Err(MlError::dataset(format!(
                    "line {}: expected {} cells, found {}",
                    line_no + 1,
                    columns.len(),
                    row.len()
                )));
            }
            rows.push(row);
        }

        Ok(Self {
            columns,
            rows,
            format,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| {
                MlError::dataset(format!(
                    "column '{name}' not found (columns: {})",
                    self.columns.join(", ")
                ))
            })
    }

    fn parse_cell(&self, row: usize, col: usize) -> Result<f64> {
        let raw = &self.rows[row][col];
        let normalized = if self.format.decimal == '.' {
            raw.clone()
        } else {
            raw.replace(self.format.decimal, ".")
        };
        normalized.parse::<f64>().map_err(|_| {
            MlError::dataset(format!(
                "row {}, column '{}': '{raw}' is not a number",
                row + 1,
                self.columns[col]
            ))
        })
    }

    /// Numeric matrix of every column except `exclude`.
    pub fn feature_matrix(&self, exclude: Option<&str>) -> Result<(Vec<String>, Array2<f64>)> {
        let skip = exclude.map(|name| self.column_index(name)).transpose()?;
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&c| Some(c) != skip)
            .collect();
        if keep.is_empty() {
            return Err(MlError::dataset("dataset has no feature columns"));
        }

        let mut values = Vec::with_capacity(self.rows.len() * keep.len());
        for row in 0..self.rows.len() {
            for &col in &keep {
                values.push(self.parse_cell(row, col)?);
            }
        }
        let names = keep.iter().map(|&c| self.columns[c].clone()).collect();
        let matrix = Array2::from_shape_vec((self.rows.len(), keep.len()), values)
            .map_err(|e| MlError::dataset(e.to_string()))?;
        Ok((names, matrix))
    }

    /// Separate the target column from the features.
    pub fn split_target(&self, target: &str) -> Result<TrainingData> {
        if self.rows.is_empty() {
            return Err(MlError::dataset("dataset has no rows"));
        }
        let target_col = self.column_index(target)?;
        let (feature_names, features) = self.feature_matrix(Some(target))?;
        let target_values = (0..self.rows.len())
            .map(|row| self.parse_cell(row, target_col))
            .collect::<Result<Vec<_>>>()?;
        Ok(TrainingData {
            feature_names,
            features,
            target_name: target.to_string(),
            target: Array1::from_vec(target_values),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SAMPLE: &str = "a,b,\"price\"\n1,2,10\n3,4,20\n\n5,6,30\n";

    #[test]
    fn test_parse_and_split() {
        let ds = TabularDataset::parse(SAMPLE, CsvFormat::default()).unwrap();
        assert_eq!(ds.columns(), ["a", "b", "price"]);
        assert_eq!(ds.n_rows(), 3);

        let data = ds.split_target("price").unwrap();
        assert_eq!(data.feature_names, vec!["a", "b"]);
        assert_eq!(data.features.shape(), &[3, 2]);
        assert_eq!(data.target.to_vec(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_semicolon_with_decimal_comma() {
        let content = "x;y\n1,5;2\n3,25;4\n";
        let format = CsvFormat {
            delimiter: ';',
            decimal: ',',
        };
        let data = TabularDataset::parse(content, format)
            .unwrap()
            .split_target("y")
            .unwrap();
        assert_eq!(data.features.column(0).to_vec(), vec![1.5, 3.25]);
    }

    #[test]
    fn test_delimiter_is_not_inferred() {
        let ds = TabularDataset::parse("x;y\n1;2\n", CsvFormat::default()).unwrap();
        assert_eq!(ds.columns(), ["x;y"]);
        assert!(ds.split_target("y").is_err());
    }

    #[test]
    fn test_ragged_row_rejected() {
        let err = TabularDataset::parse("a,b\n1,2\n3\n", CsvFormat::default()).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_non_numeric_cell_named() {
        let ds = TabularDataset::parse("a,y\n1,2\nfoo,3\n", CsvFormat::default()).unwrap();
        let err = ds.split_target("y").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("row 2"));
        assert!(msg.contains("'a'"));
    }

    #[test]
    fn test_missing_target_and_empty_file() {
        let ds = TabularDataset::parse(SAMPLE, CsvFormat::default()).unwrap();
        assert!(matches!(ds.split_target("nope"), Err(MlError::Dataset(_))));
        assert!(TabularDataset::parse("", CsvFormat::default()).is_err());
        let header_only = TabularDataset::parse("a,y\n", CsvFormat::default()).unwrap();
        assert!(header_only.split_target("y").is_err());
    }

    #[test]
    fn test_same_delimiter_and_decimal_rejected() {
        let format = CsvFormat {
            delimiter: ',',
            decimal: ',',
        };
        assert!(TabularDataset::parse("a\n1\n", format).unwrap_err().is_config());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"f\ttarget\n1\t2\n").unwrap();
        let format = CsvFormat {
            delimiter: '\t',
            decimal: '.',
        };
        let ds = TabularDataset::load(file.path(), format).unwrap();
        assert_eq!(ds.split_target("target").unwrap().target.to_vec(), vec![2.0]);
    }
}
