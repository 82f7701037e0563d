//! Binary classification metrics

use crate::error::{ChurnError, Result};
use ndarray::Array1;

/// Area under the ROC curve.
///
/// Computed from the Mann-Whitney U statistic with average ranks, so tied
/// scores count half. Fails when `y_true` holds a single class.
pub fn roc_auc_score(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<f64> {
    if y_true.len() != y_score.len() {
        return Err(ChurnError::ShapeError {
            expected: format!("{} scores", y_true.len()),
            actual: format!("{} scores", y_score.len()),
        });
    }

    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(ChurnError::ValidationError(
            "ROC-AUC is undefined when only one class is present".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| {
        y_score[a]
            .partial_cmp(&y_score[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Sum of (1-based, tie-averaged) ranks of the positives
    let mut pos_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && y_score[order[j + 1]] == y_score[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if y_true[idx] > 0.5 {
                pos_rank_sum += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    let u = pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * n_neg))
}

/// Fraction of labels predicted correctly
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(ChurnError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(ChurnError::ValidationError("accuracy of an empty set".into()));
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Mean binary cross-entropy
pub fn log_loss(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> Result<f64> {
    if y_true.len() != y_prob.len() || y_true.is_empty() {
        return Err(ChurnError::ShapeError {
            expected: format!("{} probabilities", y_true.len()),
            actual: format!("{} probabilities", y_prob.len()),
        });
    }
    let eps = 1e-15;
    let total: f64 = y_true
        .iter()
        .zip(y_prob.iter())
        .map(|(&t, &p)| {
            let p = p.clamp(eps, 1.0 - eps);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum();
    Ok(total / y_true.len() as f64)
}
