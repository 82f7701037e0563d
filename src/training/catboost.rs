//! CatBoost-style gradient boosting with symmetric trees
//!
//! Key features:
//! - Symmetric (oblivious) decision trees: all nodes at same depth use the same split
//! - Per-level feature sampling (`colsample_bylevel`, CatBoost's `rsm`)
//! - Per-iteration row subsampling
//! - `min_data_in_leaf`: a split that would leave a child below it earns no gain in that bucket

use super::boosting::{
    check_n_features, leaf_weight, logloss_gradients, seeded_rng, sigmoid, subsample,
    validate_binary_problem,
};
use super::histogram::{build_histogram, BinStats, BinnedMatrix};
use super::models::Classifier;
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatBoostConfig {
    pub iterations: usize,
    pub learning_rate: f64,
    pub depth: usize,
    /// L2 regularization of leaf values
    pub l2_leaf_reg: f64,
    pub subsample: f64,
    pub colsample_bylevel: f64,
    pub min_data_in_leaf: usize,
    pub max_bins: usize,
    pub random_state: Option<u64>,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            learning_rate: 0.03,
            depth: 6,
            l2_leaf_reg: 3.0,
            subsample: 0.8,
            colsample_bylevel: 1.0,
            min_data_in_leaf: 1,
            max_bins: 255,
            random_state: Some(42),
        }
    }
}

/// Symmetric (oblivious) tree: each level uses the same split feature + threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    splits: Vec<(usize, f64)>, // (feature, threshold) per level
    leaf_values: Vec<f64>,     // 2^depth leaf values
}

impl SymmetricTree {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut idx = 0usize;
        for &(feature, threshold) in &self.splits {
            idx = idx * 2 + usize::from(sample[feature] > threshold);
        }
        self.leaf_values[idx.min(self.leaf_values.len() - 1)]
    }
}

fn bucket_gain(l: &BinStats, r: &BinStats, lambda: f64, min_data_in_leaf: usize) -> f64 {
    if l.count < min_data_in_leaf || r.count < min_data_in_leaf {
        return 0.0;
    }
    let parent_g = l.grad + r.grad;
    let parent_h = l.hess + r.hess;
    l.grad * l.grad / (l.hess + lambda) + r.grad * r.grad / (r.hess + lambda)
        - parent_g * parent_g / (parent_h + lambda)
}

fn build_symmetric_tree(
    matrix: &BinnedMatrix,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    config: &CatBoostConfig,
    rng: &mut Xoshiro256PlusPlus,
) -> SymmetricTree {
    let n_features = matrix.n_features();
    let lambda = config.l2_leaf_reg;
    let mut splits = Vec::with_capacity(config.depth);

    // Current partition of rows into leaves
    let mut buckets: Vec<Vec<usize>> = vec![rows.to_vec()];

    for _level in 0..config.depth {
        let features = subsample(rng, n_features, config.colsample_bylevel);

        // Same split for every bucket: score each cut summed over buckets
        let candidates: Vec<(usize, usize, f64)> = features
            .par_iter()
            .filter_map(|&feat| {
                let n_bins = matrix.feature_bins(feat).n_bins();
                if n_bins < 2 {
                    return None;
                }
                let mut gains = vec![0.0f64; n_bins - 1];
                for bucket in buckets.iter().filter(|b| !b.is_empty()) {
                    let hist = build_histogram(matrix, feat, bucket, grad, hess);
                    let total = BinStats::of_rows(bucket, grad, hess);
                    let mut left = BinStats::default();
                    for (bin, gain) in gains.iter_mut().enumerate() {
                        left.grad += hist[bin].grad;
                        left.hess += hist[bin].hess;
                        left.count += hist[bin].count;
                        let right = BinStats {
                            grad: total.grad - left.grad,
                            hess: total.hess - left.hess,
                            count: total.count - left.count,
                        };
                        *gain += bucket_gain(&left, &right, lambda, config.min_data_in_leaf);
                    }
                }
                gains
                    .into_iter()
                    .enumerate()
                    .fold(None, |best: Option<(usize, usize, f64)>, (bin, g)| match best {
                        Some(b) if b.2 >= g => Some(b),
                        _ => Some((feat, bin, g)),
                    })
            })
            .collect();

        let best = candidates.into_iter().fold(None, |best: Option<(usize, usize, f64)>, c| match best {
            Some(b) if b.2 >= c.2 => Some(b),
            _ => Some(c),
        });

        match best {
            Some((feat, bin, gain)) if gain > 1e-12 => {
                splits.push((feat, matrix.feature_bins(feat).threshold(bin)));
                let mut new_buckets = Vec::with_capacity(buckets.len() * 2);
                for bucket in &buckets {
                    let (left, right) = matrix.partition(bucket, feat, bin);
                    new_buckets.push(left);
                    new_buckets.push(right);
                }
                buckets = new_buckets;
            }
            _ => break,
        }
    }

    let leaf_values: Vec<f64> = buckets
        .iter()
        .map(|bucket| {
            let stats = BinStats::of_rows(bucket, grad, hess);
            leaf_weight(stats.grad, stats.hess, lambda, 0.0)
        })
        .collect();

    SymmetricTree { splits, leaf_values }
}

// ============ CatBoost Classifier ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostClassifier {
    config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    n_features: usize,
}

impl CatBoostClassifier {
    pub fn new(config: CatBoostConfig) -> Self {
        Self { config, trees: Vec::new(), n_features: 0 }
    }

    pub fn config(&self) -> &CatBoostConfig {
        &self.config
    }

    fn raw_score(&self, sample: ArrayView1<f64>) -> f64 {
        self.trees
            .iter()
            .map(|t| self.config.learning_rate * t.predict(sample))
            .sum()
    }
}

impl Classifier for CatBoostClassifier {
    fn name(&self) -> &str {
        "CatBoost"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_binary_problem(x, y)?;
        if self.config.depth > 16 {
            return Err(ChurnError::InvalidParameter {
                name: "depth".into(),
                value: self.config.depth.to_string(),
                reason: "symmetric trees are limited to depth 16".into(),
            });
        }

        let n = x.nrows();
        let matrix = BinnedMatrix::from_array(x, self.config.max_bins)?;
        let mut rng = seeded_rng(self.config.random_state);

        // Logloss starts from a zero raw score
        let mut raw_preds = Array1::zeros(n);
        self.trees.clear();
        self.n_features = x.ncols();

        for iteration in 0..self.config.iterations {
            let (grad, hess) = logloss_gradients(&raw_preds, y);
            let rows = subsample(&mut rng, n, self.config.subsample);

            let tree = build_symmetric_tree(&matrix, &grad, &hess, &rows, &self.config, &mut rng);

            for (i, raw) in raw_preds.iter_mut().enumerate() {
                *raw += self.config.learning_rate * tree.predict(x.row(i));
            }
            self.trees.push(tree);

            if iteration % 100 == 0 {
                debug!(iteration, "catboost boosting iteration");
            }
        }
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_n_features(self.n_features, x)?;
        let probs: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| sigmoid(self.raw_score(x.row(i))))
            .collect();
        Ok(Array1::from_vec(probs))
    }
}
