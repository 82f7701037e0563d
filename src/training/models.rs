//! Classifier trait and evaluation metrics

use super::metrics::{accuracy_score, log_loss, roc_auc_score};
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Metrics for a binary classifier on one evaluation set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Accuracy at the 0.5 threshold
    pub accuracy: f64,
    /// AUC-ROC
    pub auc_roc: f64,
    /// Log loss
    pub log_loss: f64,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ClassificationMetrics {
    /// Compute metrics from true labels, hard predictions and probabilities
    pub fn compute(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        y_prob: &Array1<f64>,
    ) -> Result<Self> {
        Ok(Self {
            accuracy: accuracy_score(y_true, y_pred)?,
            auc_roc: roc_auc_score(y_true, y_prob)?,
            log_loss: log_loss(y_true, y_prob)?,
            n_samples: y_true.len(),
        })
    }
}

/// Binary probabilistic classifier
pub trait Classifier: Send + Sync {
    /// Short display name
    fn name(&self) -> &str;

    /// Fit the model on features `x` and 0/1 labels `y`
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Probability of the positive class for every row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard 0/1 labels at the 0.5 threshold
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Accuracy on `(x, y)`
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let preds = self.predict(x)?;
        accuracy_score(y, &preds)
    }
}
