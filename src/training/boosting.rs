//! Helpers shared by the gradient-boosted classifiers
//!
//! All three boosters optimize binary log-loss with a second-order
//! (Newton) step, so gradient/hessian computation, the initial log-odds and
//! row/column sampling live here.

use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Smallest hessian allowed for a single sample
const MIN_HESSIAN: f64 = 1e-16;

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Log-odds of the positive rate, used as the starting raw score
pub(crate) fn base_log_odds(y: &Array1<f64>) -> f64 {
    let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
    (p / (1.0 - p)).ln()
}

/// Logistic loss: grad = p - y, hess = p * (1 - p)
pub(crate) fn logloss_gradients(raw: &Array1<f64>, y: &Array1<f64>) -> (Vec<f64>, Vec<f64>) {
    raw.iter()
        .zip(y.iter())
        .map(|(&r, &t)| {
            let p = sigmoid(r);
            (p - t, (p * (1.0 - p)).max(MIN_HESSIAN))
        })
        .unzip()
}

/// Check that `x` and `y` describe a non-empty binary problem
pub(crate) fn validate_binary_problem(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ChurnError::TrainingError("Empty dataset".into()));
    }
    if x.nrows() != y.len() {
        return Err(ChurnError::ShapeError {
            expected: format!("{} targets", x.nrows()),
            actual: format!("{} targets", y.len()),
        });
    }
    if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(ChurnError::ValidationError(format!(
            "binary target must contain only 0 and 1, found {}",
            bad
        )));
    }
    Ok(())
}

pub(crate) fn check_n_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if expected == 0 {
        return Err(ChurnError::ModelNotFitted);
    }
    if x.ncols() != expected {
        return Err(ChurnError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> Xoshiro256PlusPlus {
    match seed {
        Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
        None => Xoshiro256PlusPlus::from_entropy(),
    }
}

/// Sorted sample of `ceil(n * ratio)` distinct indices out of `0..n`
pub(crate) fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 || n == 0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).clamp(1, n);
    let mut indices = rand::seq::index::sample(rng, n, k).into_vec();
    indices.sort_unstable();
    indices
}

/// Shrink `|g|` by `alpha` (L1 soft threshold)
pub(crate) fn threshold_l1(g: f64, alpha: f64) -> f64 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

/// Structure score of a node: ThresholdL1(G)^2 / (H + lambda)
pub(crate) fn node_score(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let t = threshold_l1(g, alpha);
    t * t / (h + lambda)
}

/// Newton leaf weight with L1 / L2 regularization
pub(crate) fn leaf_weight(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let denom = h + lambda;
    if denom <= 0.0 {
        return 0.0;
    }
    -threshold_l1(g, alpha) / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sigmoid_midpoint() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(20.0) > 0.999);
        assert!(sigmoid(-20.0) < 0.001);
    }

    #[test]
    fn test_base_log_odds_balanced() {
        let y = array![0.0, 1.0, 0.0, 1.0];
        assert!(base_log_odds(&y).abs() < 1e-12);
    }

    #[test]
    fn test_logloss_gradients_at_zero() {
        let raw = array![0.0, 0.0];
        let y = array![1.0, 0.0];
        let (g, h) = logloss_gradients(&raw, &y);
        assert!((g[0] + 0.5).abs() < 1e-12);
        assert!((g[1] - 0.5).abs() < 1e-12);
        assert!((h[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_non_binary() {
        let x = Array2::zeros((3, 1));
        let y = array![0.0, 2.0, 1.0];
        assert!(validate_binary_problem(&x, &y).is_err());
    }

    #[test]
    fn test_subsample_size_and_order() {
        let mut rng = seeded_rng(Some(7));
        let idx = subsample(&mut rng, 100, 0.25);
        assert_eq!(idx.len(), 25);
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_leaf_weight_l1_zone() {
        assert_eq!(leaf_weight(0.5, 1.0, 1.0, 1.0), 0.0);
        assert!((leaf_weight(-3.0, 1.0, 1.0, 1.0) - 1.0).abs() < 1e-12);
    }
}
