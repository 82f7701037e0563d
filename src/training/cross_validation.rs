//! Cross-validation splitting

use crate::error::{ChurnError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified K-Fold (maintains class distribution)
///
/// Without shuffling, each class is cut into contiguous runs in row order,
/// and the run sizes follow the class frequencies of the label-sorted
/// target taken every `n_splits`-th element. Fold sizes therefore differ by
/// at most one sample per class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    /// Shuffle rows within each class before assigning folds
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.random_state = Some(seed);
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate train/test splits for the labels `y`
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(ChurnError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(ChurnError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        // Group samples by class, classes in ascending order
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if self.shuffle {
            let mut rng = match self.random_state {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Label-sorted target: class `k` occupies [start_k, start_k + count_k)
        let mut test_fold = vec![0usize; n_samples];
        let mut start = 0usize;
        for indices in class_indices.values() {
            let end = start + indices.len();
            let mut cursor = indices.iter();
            for fold in 0..n_splits {
                // Positions fold, fold + n_splits, ... falling inside this class block
                let first = if start <= fold {
                    fold
                } else {
                    start + (n_splits - (start - fold) % n_splits) % n_splits
                };
                let count = if first < end { (end - 1 - first) / n_splits + 1 } else { 0 };
                for &idx in cursor.by_ref().take(count) {
                    test_fold[idx] = fold;
                }
            }
            start = end;
        }

        let mut splits = Vec::with_capacity(n_splits);
        for fold_idx in 0..n_splits {
            let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                (0..n_samples).partition(|&i| test_fold[i] == fold_idx);
            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
        }

        Ok(splits)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self { scores, mean_score: f64::NAN, std_score: f64::NAN, n_folds };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;
        let std_score = variance.sqrt();

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pattern: &[f64], repeat: usize) -> Array1<f64> {
        pattern.iter().copied().cycle().take(pattern.len() * repeat).collect()
    }

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, // 5 samples of class 0
            1.0, 1.0, 1.0, 1.0, 1.0, // 5 samples of class 1
        ]);

        let splits = StratifiedKFold::new(5).split(&y).unwrap();
        assert_eq!(splits.len(), 5);

        // Each fold should have 1 sample from each class
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let pos = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(pos, 1);
        }
        // Contiguous allocation in row order
        assert_eq!(splits[0].test_indices, vec![0, 5]);
        assert_eq!(splits[4].test_indices, vec![4, 9]);
    }

    #[test]
    fn test_every_index_tested_once() {
        let y = labels(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0], 23);
        let splits = StratifiedKFold::new(5).split(&y).unwrap();

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..y.len()).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), y.len());
            assert!(split.test_indices.iter().all(|i| !split.train_indices.contains(i)));
        }
    }

    #[test]
    fn test_class_counts_balanced_across_folds() {
        let y = labels(&[0.0, 1.0, 0.0, 0.0, 0.0], 31);
        let splits = StratifiedKFold::new(5).split(&y).unwrap();
        for class in [0.0, 1.0] {
            let counts: Vec<usize> = splits
                .iter()
                .map(|s| s.test_indices.iter().filter(|&&i| y[i] == class).count())
                .collect();
            let max = *counts.iter().max().unwrap();
            let min = *counts.iter().min().unwrap();
            assert!(max - min <= 1, "class {} counts {:?}", class, counts);
        }
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let y = labels(&[0.0, 1.0, 1.0, 0.0], 10);
        let a = StratifiedKFold::new(4).with_shuffle(7).split(&y).unwrap();
        let b = StratifiedKFold::new(4).with_shuffle(7).split(&y).unwrap();
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.test_indices, sb.test_indices);
        }
    }

    #[test]
    fn test_invalid_split_counts() {
        let y = labels(&[0.0, 1.0], 2);
        assert!(StratifiedKFold::new(1).split(&y).is_err());
        assert!(StratifiedKFold::new(10).split(&y).is_err());
    }

    #[test]
    fn test_cv_results_summary() {
        let results = CVResults::from_scores(vec![0.8, 0.9]);
        assert_eq!(results.n_folds, 2);
        assert!((results.mean_score - 0.85).abs() < 1e-12);
        assert!((results.std_score - 0.05).abs() < 1e-12);
    }
}
