//! Voting ensemble methods

use crate::error::{ChurnError, Result};
use crate::training::Classifier;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Voting strategy for classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VotingStrategy {
    /// Hard voting: weighted majority of member labels
    Hard,
    /// Soft voting: weighted average of member probabilities
    #[default]
    Soft,
}

/// Voting classifier ensemble over named members
pub struct VotingClassifier {
    /// Voting strategy
    strategy: VotingStrategy,
    /// Members, in weight order
    estimators: Vec<Box<dyn Classifier>>,
    /// Normalized weights for each member
    weights: Vec<f64>,
}

impl std::fmt::Debug for VotingClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VotingClassifier")
            .field("strategy", &self.strategy)
            .field("estimators", &self.names())
            .field("weights", &self.weights)
            .finish()
    }
}

impl VotingClassifier {
    /// Create a voting classifier with equal member weights
    pub fn new(estimators: Vec<Box<dyn Classifier>>, strategy: VotingStrategy) -> Result<Self> {
        if estimators.is_empty() {
            return Err(ChurnError::ValidationError(
                "No models provided".to_string(),
            ));
        }
        let n = estimators.len();
        Ok(Self {
            strategy,
            estimators,
            weights: vec![1.0 / n as f64; n],
        })
    }

    /// Set member weights (normalized to sum to one)
    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        if weights.len() != self.estimators.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} weights", self.estimators.len()),
                actual: format!("{} weights", weights.len()),
            });
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(ChurnError::InvalidParameter {
                name: "weights".into(),
                value: bad.to_string(),
                reason: "weights must be finite and non-negative".into(),
            });
        }
        let weight_sum: f64 = weights.iter().sum();
        if weight_sum <= 0.0 {
            return Err(ChurnError::InvalidParameter {
                name: "weights".into(),
                value: format!("{:?}", weights),
                reason: "weights must have a positive sum".into(),
            });
        }
        self.weights = weights.iter().map(|w| w / weight_sum).collect();
        Ok(self)
    }

    pub fn strategy(&self) -> VotingStrategy {
        self.strategy
    }

    /// Normalized member weights
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn names(&self) -> Vec<&str> {
        self.estimators.iter().map(|e| e.name()).collect()
    }

    /// Probabilities of every member, in member order
    pub fn member_probabilities(&self, x: &Array2<f64>) -> Result<Vec<Array1<f64>>> {
        self.estimators
            .par_iter()
            .map(|m| m.predict_proba(x))
            .collect()
    }

    fn hard_vote(&self, predictions: &[Array1<f64>]) -> Array1<f64> {
        let n_samples = predictions[0].len();
        Array1::from_shape_fn(n_samples, |i| {
            predictions
                .iter()
                .zip(self.weights.iter())
                .filter(|(pred, _)| pred[i] >= 0.5)
                .map(|(_, &w)| w)
                .sum::<f64>()
        })
    }

    fn soft_vote(&self, predictions: &[Array1<f64>]) -> Array1<f64> {
        let n_samples = predictions[0].len();
        Array1::from_shape_fn(n_samples, |i| {
            predictions
                .iter()
                .zip(self.weights.iter())
                .map(|(pred, &weight)| pred[i] * weight)
                .sum::<f64>()
        })
    }
}

impl Classifier for VotingClassifier {
    fn name(&self) -> &str {
        "VotingClassifier"
    }

    /// Fit every member on the same data, in parallel
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.estimators
            .par_iter_mut()
            .try_for_each(|m| {
                let name = m.name().to_string();
                m.fit(x, y)?;
                debug!(model = %name, "ensemble member fitted");
                Ok(())
            })
    }

    /// Soft: weighted mean probability. Hard: weighted share of positive votes.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let predictions = self.member_probabilities(x)?;
        let combined = match self.strategy {
            VotingStrategy::Hard => self.hard_vote(&predictions),
            VotingStrategy::Soft => self.soft_vote(&predictions),
        };
        Ok(combined.mapv(|p| p.clamp(0.0, 1.0)))
    }
}
