//! Property-based tests for row partitioning and grid enumeration.

use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;
use serde_json::Value;
use tabrun_ml::split::{k_fold, train_test_split};
use tabrun_ml::HyperparameterGrid;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn folds_partition_rows_exactly_once(n in 2usize..200, k in 2usize..12) {
        prop_assume!(k <= n);
        let folds = k_fold(n, k).unwrap();
        prop_assert_eq!(folds.len(), k);

        let mut seen = vec![0usize; n];
        for fold in &folds {
            prop_assert_eq!(fold.train_indices.len() + fold.test_indices.len(), n);
            for &i in &fold.test_indices {
                seen[i] += 1;
            }
            let sizes_differ = fold.test_indices.len().abs_diff(n / k);
            prop_assert!(sizes_differ <= 1);
        }
        prop_assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn held_out_size_is_ceiling(n in 2usize..500, pct in 1u32..99, seed in any::<u64>()) {
        let fraction = f64::from(pct) / 100.0;
        let expected = (fraction * n as f64).ceil() as usize;
        prop_assume!(expected < n);

        let split = train_test_split(n, fraction, seed).unwrap();
        prop_assert_eq!(split.test_indices.len(), expected);
        let all: HashSet<usize> = split
            .train_indices
            .iter()
            .chain(&split.test_indices)
            .copied()
            .collect();
        prop_assert_eq!(all.len(), n);
    }

    #[test]
    fn grid_enumerates_full_product_without_repeats(
        sizes in proptest::collection::btree_map("[a-e]{1,3}", 1usize..4, 1..4)
    ) {
        let params: BTreeMap<String, Vec<Value>> = sizes
            .iter()
            .map(|(name, &len)| (name.clone(), (0..len).map(|v| Value::from(v as u64)).collect()))
            .collect();
        let grid = HyperparameterGrid::from(params);
        let candidates = grid.candidates();

        let expected: usize = sizes.values().product();
        prop_assert_eq!(candidates.len(), expected);
        prop_assert_eq!(grid.size(), expected);

        let distinct: HashSet<String> = candidates
            .iter()
            .map(|c| serde_json::to_string(c).unwrap())
            .collect();
        prop_assert_eq!(distinct.len(), expected);

        // The last key varies fastest.
        if expected > 1 {
            let last = sizes.keys().next_back().unwrap();
            if sizes[last] > 1 {
                prop_assert_ne!(&candidates[0][last], &candidates[1][last]);
            }
        }
    }
}
