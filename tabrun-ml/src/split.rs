//! Row partitioning: seeded train/held-out split and contiguous K-fold.

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{MlError, Result};

/// Row indices of one partition pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Shuffle `0..n_samples` with a seeded ChaCha8 generator and cut off
/// `ceil(test_fraction * n_samples)` rows as the held-out partition.
pub fn train_test_split(n_samples: usize, test_fraction: f64, seed: u64) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(MlError::invalid_input(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    let n_test = (test_fraction * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(MlError::invalid_input(format!(
            "cannot hold out {n_test} of {n_samples} rows and keep a training partition"
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train_indices = indices.split_off(n_test);
    Ok(Split {
        train_indices,
        test_indices: indices,
    })
}

/// Unshuffled K-fold over `0..n_samples`. The first `n_samples % n_splits`
/// folds hold one extra row.
pub fn k_fold(n_samples: usize, n_splits: usize) -> Result<Vec<Split>> {
    if n_splits < 2 {
        return Err(MlError::invalid_input(format!(
            "fold count must be at least 2, got {n_splits}"
        )));
    }
    if n_samples < n_splits {
        return Err(MlError::invalid_input(format!(
            "{n_samples} training rows cannot fill {n_splits} folds"
        )));
    }

    let base = n_samples / n_splits;
    let remainder = n_samples % n_splits;
    let mut splits = Vec::with_capacity(n_splits);
    let mut start = 0;
    for fold in 0..n_splits {
        let size = if fold < remainder { base + 1 } else { base };
        let end = start + size;
        splits.push(Split {
            train_indices: (0..start).chain(end..n_samples).collect(),
            test_indices: (start..end).collect(),
        });
        start = end;
    }
    Ok(splits)
}

/// Gather the given rows of a feature matrix.
pub fn take_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(0), indices)
}

/// Gather the given entries of a target vector.
pub fn take_targets(y: &Array1<f64>, indices: &[usize]) -> Array1<f64> {
    y.select(Axis(0), indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_held_out_size_rounds_up() {
        let split = train_test_split(11, 0.2, 42).unwrap();
        assert_eq!(split.test_indices.len(), 3);
        assert_eq!(split.train_indices.len(), 8);
    }

    #[test]
    fn test_split_is_seeded() {
        let a = train_test_split(50, 0.2, 7).unwrap();
        let b = train_test_split(50, 0.2, 7).unwrap();
        let c = train_test_split(50, 0.2, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_split_partitions_all_rows() {
        let split = train_test_split(20, 0.25, 1).unwrap();
        let mut all: Vec<usize> = split
            .train_indices
            .iter()
            .chain(&split.test_indices)
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        assert!(train_test_split(10, 0.0, 1).is_err());
        assert!(train_test_split(10, 1.0, 1).is_err());
        assert!(train_test_split(10, f64::NAN, 1).is_err());
        assert!(train_test_split(1, 0.5, 1).is_err());
    }

    #[test]
    fn test_k_fold_contiguous_with_remainder_first() {
        let folds = k_fold(7, 3).unwrap();
        let tests: Vec<Vec<usize>> = folds.iter().map(|f| f.test_indices.clone()).collect();
        assert_eq!(tests, vec![vec![0, 1, 2], vec![3, 4], vec![5, 6]]);
        assert_eq!(folds[1].train_indices, vec![0, 1, 2, 5, 6]);
    }

    #[test]
    fn test_k_fold_rejects_too_few_rows_or_folds() {
        assert!(matches!(k_fold(3, 4), Err(MlError::InvalidInput(_))));
        assert!(matches!(k_fold(10, 1), Err(MlError::InvalidInput(_))));
    }

    #[test]
    fn test_take_rows() {
        let x = Array2::from_shape_vec((3, 2), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let picked = take_rows(&x, &[2, 0]);
        assert_eq!(picked.row(0).to_vec(), vec![5.0, 6.0]);
        assert_eq!(picked.row(1).to_vec(), vec![1.0, 2.0]);
    }
}
