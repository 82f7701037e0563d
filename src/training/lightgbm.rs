//! LightGBM-style gradient boosting with leaf-wise tree growth
//!
//! Key differences from the XGBoost-style booster:
//! - Leaf-wise (best-first) tree growth bounded by `num_leaves` instead of level-wise
//! - Gradient-based One-Side Sampling (GOSS): keeps top gradients, samples low gradients
//! - Bagging only happens when both `subsample < 1` and `subsample_freq > 0`

use super::boosting::{
    base_log_odds, check_n_features, leaf_weight, logloss_gradients, node_score, seeded_rng,
    sigmoid, subsample, validate_binary_problem,
};
use super::histogram::{
    best_of, best_split_in_histogram, build_histogram, BinStats, BinnedMatrix, SplitCandidate,
};
use super::models::Classifier;
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

/// Boosting flavour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoostingType {
    /// Plain gradient boosting
    Gbdt,
    /// Gradient-based One-Side Sampling
    Goss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGBMConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub subsample: f64,
    /// Re-bag every `subsample_freq` rounds (0 disables bagging)
    pub subsample_freq: usize,
    pub colsample_bytree: f64,
    pub boosting: BoostingType,
    pub top_rate: f64,
    pub other_rate: f64,
    pub max_bins: usize,
    pub random_state: Option<u64>,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            min_child_weight: 1e-3,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
            subsample: 1.0,
            subsample_freq: 0,
            colsample_bytree: 1.0,
            boosting: BoostingType::Gbdt,
            top_rate: 0.2,
            other_rate: 0.1,
            max_bins: 255,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum LGBNode {
    Leaf { value: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<LGBNode>,
        right: Box<LGBNode>,
    },
}

impl LGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            LGBNode::Leaf { value } => *value,
            LGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] > *threshold {
                    right.predict(sample)
                } else {
                    left.predict(sample)
                }
            }
        }
    }
}

// ---- Leaf-wise tree building ----

struct PendingSplit {
    node_id: usize,
    split: SplitCandidate,
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.split.gain == other.split.gain && self.node_id == other.node_id
    }
}
impl Eq for PendingSplit {}
impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingSplit {
    fn cmp(&self, other: &Self) -> Ordering {
        // Highest gain first; earlier nodes win ties
        self.split
            .gain
            .partial_cmp(&other.split.gain)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

enum NodeSlot {
    Leaf { rows: Vec<usize>, stats: BinStats, depth: usize },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

struct TreeBuilder<'a> {
    matrix: &'a BinnedMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
    config: &'a LightGBMConfig,
}

impl TreeBuilder<'_> {
    fn find_split(&self, rows: &[usize], stats: BinStats) -> Option<SplitCandidate> {
        let c = self.config;
        if rows.len() < c.min_child_samples * 2 {
            return None;
        }
        let parent = node_score(stats.grad, stats.hess, c.reg_lambda, c.reg_alpha);
        let candidates: Vec<_> = self
            .features
            .par_iter()
            .filter_map(|&f| {
                let hist = build_histogram(self.matrix, f, rows, self.grad, self.hess);
                best_split_in_histogram(self.matrix, f, &hist, |l, r| {
                    if l.count < c.min_child_samples || r.count < c.min_child_samples {
                        return None;
                    }
                    if l.hess < c.min_child_weight || r.hess < c.min_child_weight {
                        return None;
                    }
                    Some(
                        node_score(l.grad, l.hess, c.reg_lambda, c.reg_alpha)
                            + node_score(r.grad, r.hess, c.reg_lambda, c.reg_alpha)
                            - parent,
                    )
                })
            })
            .collect();
        best_of(candidates.into_iter()).filter(|s| s.gain > 0.0)
    }

    fn build(&self, rows: Vec<usize>) -> LGBNode {
        let c = self.config;
        let max_depth = c.max_depth.unwrap_or(usize::MAX);
        let root_stats = BinStats::of_rows(&rows, self.grad, self.hess);

        let mut heap = BinaryHeap::new();
        if max_depth > 0 {
            if let Some(split) = self.find_split(&rows, root_stats) {
                heap.push(PendingSplit { node_id: 0, split });
            }
        }
        let mut nodes = vec![NodeSlot::Leaf { rows, stats: root_stats, depth: 0 }];
        let mut n_leaves = 1usize;

        while n_leaves < c.num_leaves {
            let Some(PendingSplit { node_id, split }) = heap.pop() else {
                break;
            };
            let (rows, depth) = match &mut nodes[node_id] {
                NodeSlot::Leaf { rows, depth, .. } => (std::mem::take(rows), *depth),
                NodeSlot::Split { .. } => continue,
            };

            let (left_rows, right_rows) = self.matrix.partition(&rows, split.feature, split.bin);
            let left_id = nodes.len();
            let right_id = left_id + 1;
            nodes[node_id] = NodeSlot::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: left_id,
                right: right_id,
            };
            n_leaves += 1;

            for (child_id, child_rows, child_stats) in [
                (left_id, left_rows, split.left),
                (right_id, right_rows, split.right),
            ] {
                if depth + 1 < max_depth {
                    if let Some(child_split) = self.find_split(&child_rows, child_stats) {
                        heap.push(PendingSplit { node_id: child_id, split: child_split });
                    }
                }
                nodes.push(NodeSlot::Leaf { rows: child_rows, stats: child_stats, depth: depth + 1 });
            }
        }

        self.to_node(&nodes, 0)
    }

    fn to_node(&self, nodes: &[NodeSlot], idx: usize) -> LGBNode {
        match &nodes[idx] {
            NodeSlot::Leaf { stats, .. } => LGBNode::Leaf {
                value: leaf_weight(stats.grad, stats.hess, self.config.reg_lambda, self.config.reg_alpha),
            },
            NodeSlot::Split { feature, threshold, left, right } => LGBNode::Split {
                feature: *feature,
                threshold: *threshold,
                left: Box::new(self.to_node(nodes, *left)),
                right: Box::new(self.to_node(nodes, *right)),
            },
        }
    }
}

/// GOSS: keep the `top_rate` largest |gradient| rows, sample `other_rate` of the
/// rest and amplify their gradients by `(1 - top_rate) / other_rate`.
fn goss_sample(
    grad: &mut [f64],
    hess: &mut [f64],
    top_rate: f64,
    other_rate: f64,
    rng: &mut Xoshiro256PlusPlus,
) -> Vec<usize> {
    let n = grad.len();
    let n_top = ((n as f64 * top_rate).ceil() as usize).min(n);
    let n_other = ((n as f64 * other_rate).ceil() as usize).min(n - n_top);

    let mut sorted: Vec<usize> = (0..n).collect();
    sorted.sort_by(|&a, &b| grad[b].abs().partial_cmp(&grad[a].abs()).unwrap_or(Ordering::Equal));

    let mut selected: Vec<usize> = sorted[..n_top].to_vec();
    let mut rest: Vec<usize> = sorted[n_top..].to_vec();
    rest.shuffle(rng);
    rest.truncate(n_other);

    let amplify = if other_rate > 0.0 { (1.0 - top_rate) / other_rate } else { 1.0 };
    for &i in &rest {
        grad[i] *= amplify;
        hess[i] *= amplify;
    }
    selected.extend(rest);
    selected.sort_unstable();
    selected
}

// ============ LightGBM Classifier ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMClassifier {
    config: LightGBMConfig,
    trees: Vec<LGBNode>,
    base_score: f64,
    n_features: usize,
}

impl LightGBMClassifier {
    pub fn new(config: LightGBMConfig) -> Self {
        Self { config, trees: Vec::new(), base_score: 0.0, n_features: 0 }
    }

    pub fn config(&self) -> &LightGBMConfig {
        &self.config
    }

    fn validate_config(&self) -> Result<()> {
        let c = &self.config;
        if c.num_leaves < 2 {
            return Err(ChurnError::InvalidParameter {
                name: "num_leaves".into(),
                value: c.num_leaves.to_string(),
                reason: "must be at least 2".into(),
            });
        }
        if c.boosting == BoostingType::Goss && c.top_rate + c.other_rate > 1.0 {
            return Err(ChurnError::InvalidParameter {
                name: "top_rate + other_rate".into(),
                value: (c.top_rate + c.other_rate).to_string(),
                reason: "must not exceed 1.0 with GOSS".into(),
            });
        }
        Ok(())
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

impl Classifier for LightGBMClassifier {
    fn name(&self) -> &str {
        "LGBM"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_binary_problem(x, y)?;
        self.validate_config()?;

        let n = x.nrows();
        let n_features = x.ncols();
        let matrix = BinnedMatrix::from_array(x, self.config.max_bins)?;
        let mut rng = seeded_rng(self.config.random_state);

        self.base_score = base_log_odds(y);
        self.trees.clear();
        self.n_features = n_features;
        let mut raw_preds = Array1::from_elem(n, self.base_score);
        let mut bagged: Vec<usize> = (0..n).collect();

        for round in 0..self.config.n_estimators {
            let (mut grad, mut hess) = logloss_gradients(&raw_preds, y);

            let rows = match self.config.boosting {
                BoostingType::Goss => goss_sample(
                    &mut grad,
                    &mut hess,
                    self.config.top_rate,
                    self.config.other_rate,
                    &mut rng,
                ),
                BoostingType::Gbdt => {
                    let bagging = self.config.subsample < 1.0 && self.config.subsample_freq > 0;
                    if bagging && round % self.config.subsample_freq == 0 {
                        bagged = subsample(&mut rng, n, self.config.subsample);
                    }
                    bagged.clone()
                }
            };
            let features = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let builder = TreeBuilder {
                matrix: &matrix,
                grad: &grad,
                hess: &hess,
                features: &features,
                config: &self.config,
            };
            let tree = builder.build(rows);

            for (i, raw) in raw_preds.iter_mut().enumerate() {
                *raw += self.config.learning_rate * tree.predict(x.row(i));
            }
            self.trees.push(tree);

            if round % 100 == 0 {
                debug!(round, "lightgbm boosting round");
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

#[cfg(test)]
mod tests {
    use super::*;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((200, 3), |(i, j)| ((i * (j + 3)) % 17) as f64 + i as f64 * 0.01);
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| if r[0] > 8.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_lightgbm_classifier() {
        let (x, y) = classification_data();
        let mut model = LightGBMClassifier::new(LightGBMConfig {
            n_estimators: 30,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let acc = model.score(&x, &y).unwrap();
        assert!(acc > 0.9, "LightGBM classifier accuracy = {}", acc);
    }

    #[test]
    fn test_lightgbm_goss_and_bagging() {
        let (x, y) = classification_data();
        for config in [
            LightGBMConfig { n_estimators: 20, boosting: BoostingType::Goss, ..Default::default() },
            LightGBMConfig { n_estimators: 20, subsample: 0.5, subsample_freq: 1, ..Default::default() },
        ] {
            let mut model = LightGBMClassifier::new(config);
            model.fit(&x, &y).unwrap();
            let proba = model.predict_proba(&x).unwrap();
            assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_lightgbm_respects_num_leaves() {
        let (x, y) = classification_data();
        let mut model = LightGBMClassifier::new(LightGBMConfig {
            n_estimators: 3,
            num_leaves: 4,
            min_child_samples: 1,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        fn count_leaves(node: &LGBNode) -> usize {
            match node {
                LGBNode::Leaf { .. } => 1,
                LGBNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
            }
        }
        assert!(model.trees.iter().all(|t| count_leaves(t) <= 4));
    }

    #[test]
    fn test_lightgbm_depth_one_is_stump() {
        let (x, y) = classification_data();
        let mut model = LightGBMClassifier::new(LightGBMConfig {
            n_estimators: 2,
            max_depth: Some(1),
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        for tree in &model.trees {
            if let LGBNode::Split { left, right, .. } = tree {
                assert!(matches!(**left, LGBNode::Leaf { .. }));
                assert!(matches!(**right, LGBNode::Leaf { .. }));
            }
        }
    }

    #[test]
    fn test_lightgbm_rejects_bad_config() {
        let (x, y) = classification_data();
        let mut model = LightGBMClassifier::new(LightGBMConfig { num_leaves: 1, ..Default::default() });
        assert!(model.fit(&x, &y).is_err());
    }
}
