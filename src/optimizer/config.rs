//! Optimization configuration

use super::SamplerType;
use serde::{Deserialize, Serialize};

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeDirection {
    Minimize,
    Maximize,
}

impl OptimizeDirection {
    /// Whether `a` is strictly better than `b`
    pub fn is_better(self, a: f64, b: f64) -> bool {
        match self {
            OptimizeDirection::Minimize => a < b,
            OptimizeDirection::Maximize => a > b,
        }
    }

    /// Value recorded for a failed trial
    pub fn worst_value(self) -> f64 {
        match self {
            OptimizeDirection::Minimize => f64::INFINITY,
            OptimizeDirection::Maximize => f64::NEG_INFINITY,
        }
    }

    /// Map an objective value to a loss (lower is better)
    pub fn to_loss(self, value: f64) -> f64 {
        match self {
            OptimizeDirection::Minimize => value,
            OptimizeDirection::Maximize => -value,
        }
    }
}

/// Configuration for hyperparameter optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Name stored in the study file
    pub study_name: String,

    /// Number of trials to run
    pub n_trials: usize,

    /// Maximum time in seconds
    pub timeout_secs: Option<f64>,

    /// Optimization direction
    pub direction: OptimizeDirection,

    /// Sampler type
    pub sampler: SamplerType,

    /// Number of initial random samples before optimization
    pub n_startup_trials: usize,

    /// TPE quantile splitting good from bad trials
    pub tpe_gamma: f64,

    /// TPE candidates drawn per parameter
    pub tpe_candidates: usize,

    /// Random seed
    pub random_state: Option<u64>,

    /// Patience for early stopping
    pub early_stopping_patience: Option<usize>,

    /// Minimum improvement to consider
    pub min_improvement: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            study_name: "bank-churn".to_string(),
            n_trials: 300,
            timeout_secs: None,
            direction: OptimizeDirection::Maximize,
            sampler: SamplerType::TPE,
            n_startup_trials: 10,
            tpe_gamma: 0.25,
            tpe_candidates: 24,
            random_state: Some(503),
            early_stopping_patience: None,
            min_improvement: 1e-6,
        }
    }
}

impl OptimizationConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set number of trials
    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    /// Builder method to set timeout
    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Builder method to set direction
    pub fn with_direction(mut self, direction: OptimizeDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Builder method to set sampler
    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    /// Builder method to set the random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Builder method to stop after `patience` trials without improvement
    pub fn with_early_stopping(mut self, patience: usize) -> Self {
        self.early_stopping_patience = Some(patience);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OptimizationConfig::default();
        assert_eq!(config.n_trials, 300);
        assert_eq!(config.direction, OptimizeDirection::Maximize);
        assert!(matches!(config.sampler, SamplerType::TPE));
    }

    #[test]
    fn test_builder() {
        let config = OptimizationConfig::new()
            .with_n_trials(50)
            .with_sampler(SamplerType::Random)
            .with_direction(OptimizeDirection::Minimize)
            .with_early_stopping(5);

        assert_eq!(config.n_trials, 50);
        assert!(matches!(config.sampler, SamplerType::Random));
        assert_eq!(config.early_stopping_patience, Some(5));
    }

    #[test]
    fn test_direction_helpers() {
        let max = OptimizeDirection::Maximize;
        assert!(max.is_better(0.9, 0.8));
        assert_eq!(max.worst_value(), f64::NEG_INFINITY);
        assert_eq!(max.to_loss(0.7), -0.7);
        assert!(OptimizeDirection::Minimize.is_better(0.1, 0.2));
    }
}
