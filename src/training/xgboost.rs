//! XGBoost-style gradient boosting with second-order approximation
//!
//! Key points:
//! - Uses both gradient (first derivative) and hessian (second derivative) of the log loss
//! - Regularized leaf weights: w* = -ThresholdL1(G) / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Level-wise growth to `max_depth` on histogram bins ("hist" tree method)
//! - Minimum child weight constraint on hessian sums

use super::boosting::{
    base_log_odds, check_n_features, leaf_weight, logloss_gradients, node_score, seeded_rng,
    sigmoid, subsample, validate_binary_problem,
};
use super::histogram::{best_of, best_split_in_histogram, build_histogram, BinStats, BinnedMatrix};
use super::models::Classifier;
use crate::error::Result;
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// XGBoost configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub max_bins: usize,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            max_bins: 255,
            random_state: Some(42),
        }
    }
}

/// A single node in the XGBoost tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] > *threshold {
                    right.predict(sample)
                } else {
                    left.predict(sample)
                }
            }
        }
    }
}

struct TreeContext<'a> {
    matrix: &'a BinnedMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
    config: &'a XGBoostConfig,
}

/// Build an XGBoost tree depth-first from histogram splits
fn build_xgb_tree(ctx: &TreeContext, rows: &[usize], stats: BinStats, depth: usize) -> XGBNode {
    let config = ctx.config;
    let weight = leaf_weight(stats.grad, stats.hess, config.reg_lambda, config.reg_alpha);

    // Stopping conditions
    if depth >= config.max_depth || rows.len() < 2 || stats.hess < 2.0 * config.min_child_weight {
        return XGBNode::Leaf { weight };
    }

    let parent_score = node_score(stats.grad, stats.hess, config.reg_lambda, config.reg_alpha);
    let candidates: Vec<_> = ctx
        .features
        .par_iter()
        .filter_map(|&f| {
            let hist = build_histogram(ctx.matrix, f, rows, ctx.grad, ctx.hess);
            best_split_in_histogram(ctx.matrix, f, &hist, |l, r| {
                if l.hess < config.min_child_weight || r.hess < config.min_child_weight {
                    return None;
                }
                let gain = 0.5
                    * (node_score(l.grad, l.hess, config.reg_lambda, config.reg_alpha)
                        + node_score(r.grad, r.hess, config.reg_lambda, config.reg_alpha)
                        - parent_score);
                Some(gain)
            })
        })
        .collect();

    match best_of(candidates.into_iter()) {
        Some(split) if split.gain > config.gamma => {
            let (left_rows, right_rows) = ctx.matrix.partition(rows, split.feature, split.bin);
            let left = build_xgb_tree(ctx, &left_rows, split.left, depth + 1);
            let right = build_xgb_tree(ctx, &right_rows, split.right, depth + 1);
            XGBNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight },
    }
}

/// XGBoost Classifier (logistic loss with second-order approximation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    fn raw_score(&self, sample: ArrayView1<f64>) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|t| self.config.learning_rate * t.predict(sample))
                .sum::<f64>()
    }
}

impl Classifier for XGBoostClassifier {
    fn name(&self) -> &str {
        "XGB"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_binary_problem(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let matrix = BinnedMatrix::from_array(x, self.config.max_bins)?;

        // Base score in log-odds space
        self.base_score = base_log_odds(y);
        let mut raw_preds = Array1::from_elem(n_samples, self.base_score);
        let mut rng = seeded_rng(self.config.random_state);

        self.trees.clear();
        self.n_features = n_features;

        for round in 0..self.config.n_estimators {
            let (grad, hess) = logloss_gradients(&raw_preds, y);

            let rows = subsample(&mut rng, n_samples, self.config.subsample);
            let features = subsample(&mut rng, n_features, self.config.colsample_bytree);
            let stats = BinStats::of_rows(&rows, &grad, &hess);

            let ctx = TreeContext {
                matrix: &matrix,
                grad: &grad,
                hess: &hess,
                features: &features,
                config: &self.config,
            };
            let tree = build_xgb_tree(&ctx, &rows, stats, 0);

            // Out-of-bag rows are updated too
            for (i, raw) in raw_preds.iter_mut().enumerate() {
                *raw += self.config.learning_rate * tree.predict(x.row(i));
            }
            self.trees.push(tree);

            if round % 100 == 0 {
                debug!(round, "xgboost boosting round");
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
