//! Main hyperparameter optimizer

use super::{
    config::{OptimizationConfig, OptimizeDirection},
    samplers::{create_sampler, Sampler},
    search_space::{SearchSpace, TrialParams},
};
use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of a single trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    /// Trial number
    pub trial_id: usize,
    /// Parameters used
    pub params: TrialParams,
    /// Objective value
    pub value: f64,
    /// Trial duration in seconds
    pub duration_secs: f64,
    /// Whether trial was pruned (the objective failed)
    pub pruned: bool,
    /// Error message of a failed trial
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Study containing all trials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    /// Study name
    pub study_name: String,
    /// All trial results
    pub trials: Vec<TrialResult>,
    /// Best trial index
    pub best_trial_idx: Option<usize>,
    /// Total duration
    pub total_duration_secs: f64,
    /// Optimization direction
    pub direction: OptimizeDirection,
}

impl Study {
    /// Create a new study
    pub fn new(study_name: impl Into<String>, direction: OptimizeDirection) -> Self {
        Self {
            study_name: study_name.into(),
            trials: Vec::new(),
            best_trial_idx: None,
            total_duration_secs: 0.0,
            direction,
        }
    }

    /// Get the best trial
    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.and_then(|idx| self.trials.get(idx))
    }

    /// Get the best value
    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value)
    }

    /// Get the best parameters
    pub fn best_params(&self) -> Option<&TrialParams> {
        self.best_trial().map(|t| &t.params)
    }

    /// Number of trials that finished without error
    pub fn n_completed(&self) -> usize {
        self.trials.iter().filter(|t| !t.pruned).count()
    }

    /// Add a trial result
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();

        let is_better = match self.best_value() {
            None => true,
            Some(best_val) => self.direction.is_better(result.value, best_val),
        };

        if is_better && !result.pruned {
            self.best_trial_idx = Some(idx);
        }

        self.trials.push(result);
    }

    /// Save study to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load study from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Study> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ChurnError::ConfigError(format!("cannot read study {}: {}", path.display(), e))
        })?;
        let study: Study = serde_json::from_str(&json)?;
        Ok(study)
    }
}

/// Main hyperparameter optimizer
pub struct HyperOptimizer {
    config: OptimizationConfig,
    search_space: SearchSpace,
    sampler: Box<dyn Sampler>,
    enqueued: VecDeque<TrialParams>,
    study: Study,
}

impl HyperOptimizer {
    /// Create a new optimizer
    pub fn new(config: OptimizationConfig, search_space: SearchSpace) -> Self {
        let sampler = create_sampler(&config);
        let study = Study::new(config.study_name.clone(), config.direction);

        Self {
            config,
            search_space,
            sampler,
            enqueued: VecDeque::new(),
            study,
        }
    }

    /// Queue a configuration to evaluate before any sampled one.
    ///
    /// Parameters missing from `params` are filled by the sampler.
    pub fn enqueue_trial(&mut self, params: TrialParams) -> Result<()> {
        for (name, value) in &params {
            let param = self.search_space.get(name).ok_or_else(|| {
                ChurnError::ConfigError(format!("enqueued parameter '{}' is not in the search space", name))
            })?;
            if !param.contains(value) {
                return Err(ChurnError::InvalidParameter {
                    name: name.clone(),
                    value: value.to_string(),
                    reason: "outside the search space".into(),
                });
            }
        }
        self.enqueued.push_back(params);
        Ok(())
    }

    /// Run optimization with an objective function.
    ///
    /// A failing objective marks its trial as pruned. The run only fails
    /// when no trial completed.
    pub fn optimize<F>(&mut self, mut objective: F) -> Result<&Study>
    where
        F: FnMut(&TrialParams) -> Result<f64>,
    {
        let start = Instant::now();
        let direction = self.config.direction;

        let mut trials_without_improvement = 0;
        let mut history: Vec<(TrialParams, f64)> = self
            .study
            .trials
            .iter()
            .filter(|t| !t.pruned)
            .map(|t| (t.params.clone(), direction.to_loss(t.value)))
            .collect();
        let mut last_error: Option<String> = None;

        for _ in 0..self.config.n_trials {
            let trial_id = self.study.trials.len();

            // Check timeout
            if let Some(t) = self.config.timeout_secs {
                if start.elapsed().as_secs_f64() > t {
                    info!(trials = trial_id, "timeout reached");
                    break;
                }
            }

            // Check early stopping
            if let Some(p) = self.config.early_stopping_patience {
                if trials_without_improvement >= p {
                    info!(patience = p, "early stopping: no improvement");
                    break;
                }
            }

            let trial_start = Instant::now();

            // Enqueued trials first, then the sampler
            let mut params = self.sampler.sample(&self.search_space, &history);
            if let Some(fixed) = self.enqueued.pop_front() {
                debug!(trial = trial_id, "running enqueued trial");
                params.extend(fixed);
            }

            let outcome = objective(&params).and_then(|value| {
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(ChurnError::OptimizationError(format!("objective returned {}", value)))
                }
            });

            let result = match outcome {
                Ok(value) => {
                    history.push((params.clone(), direction.to_loss(value)));

                    // Check if this is an improvement
                    let is_improvement = match self.study.best_value() {
                        None => true,
                        Some(best) => match direction {
                            OptimizeDirection::Minimize => value < best - self.config.min_improvement,
                            OptimizeDirection::Maximize => value > best + self.config.min_improvement,
                        },
                    };

                    if is_improvement {
                        trials_without_improvement = 0;
                    } else {
                        trials_without_improvement += 1;
                    }

                    TrialResult {
                        trial_id,
                        params,
                        value,
                        duration_secs: trial_start.elapsed().as_secs_f64(),
                        pruned: false,
                        error: None,
                    }
                }
                Err(e) => {
                    // Trial failed - mark as pruned with worst value
                    warn!(trial = trial_id, error = %e, "trial failed");
                    trials_without_improvement += 1;
                    last_error = Some(e.to_string());
                    TrialResult {
                        trial_id,
                        params,
                        value: direction.worst_value(),
                        duration_secs: trial_start.elapsed().as_secs_f64(),
                        pruned: true,
                        error: Some(e.to_string()),
                    }
                }
            };

            let value = result.value;
            let pruned = result.pruned;
            self.study.add_trial(result);
            info!(
                trial = trial_id,
                value,
                pruned,
                best = self.study.best_value().unwrap_or(value),
                "trial finished"
            );
        }

        self.study.total_duration_secs += start.elapsed().as_secs_f64();

        if self.study.best_trial().is_none() && !self.study.trials.is_empty() {
            return Err(ChurnError::OptimizationError(format!(
                "all {} trials failed; last error: {}",
                self.study.trials.len(),
                last_error.unwrap_or_default()
            )));
        }

        Ok(&self.study)
    }

    /// Get the study results
    pub fn study(&self) -> &Study {
        &self.study
    }

    /// Consume the optimizer and keep its study
    pub fn into_study(self) -> Study {
        self.study
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{ParameterValue, SamplerType};

    fn quadratic_objective(params: &TrialParams) -> Result<f64> {
        let x = params.get("x").and_then(|p| p.as_float()).unwrap_or(0.0);
        let y = params.get("y").and_then(|p| p.as_float()).unwrap_or(0.0);
        Ok(x * x + y * y) // Minimum at (0, 0)
    }

    fn space() -> SearchSpace {
        SearchSpace::new().float("x", -5.0, 5.0).float("y", -5.0, 5.0)
    }

    #[test]
    fn test_optimization() {
        let config = OptimizationConfig::new()
            .with_n_trials(30)
            .with_direction(OptimizeDirection::Minimize);

        let mut optimizer = HyperOptimizer::new(config, space());
        let study = optimizer.optimize(quadratic_objective).unwrap();

        assert_eq!(study.trials.len(), 30);
        assert!(study.best_value().is_some());
        assert!(study.best_value().unwrap() < 25.0);
    }

    #[test]
    fn test_enqueued_trial_runs_first_and_bounds_best() {
        let config = OptimizationConfig::new()
            .with_n_trials(15)
            .with_direction(OptimizeDirection::Maximize);
        let mut optimizer = HyperOptimizer::new(config, space());

        let mut fixed = TrialParams::new();
        fixed.insert("x".into(), ParameterValue::Float(0.5));
        fixed.insert("y".into(), ParameterValue::Float(-0.5));
        optimizer.enqueue_trial(fixed.clone()).unwrap();

        let objective = |p: &TrialParams| quadratic_objective(p).map(|v| -v);
        let study = optimizer.optimize(objective).unwrap();

        assert_eq!(study.trials[0].params, fixed);
        assert!(study.best_value().unwrap() >= study.trials[0].value);
    }

    #[test]
    fn test_enqueue_rejects_unknown_and_out_of_range() {
        let mut optimizer = HyperOptimizer::new(OptimizationConfig::new(), space());
        let mut unknown = TrialParams::new();
        unknown.insert("z".into(), ParameterValue::Float(0.0));
        assert!(optimizer.enqueue_trial(unknown).is_err());

        let mut outside = TrialParams::new();
        outside.insert("x".into(), ParameterValue::Float(50.0));
        assert!(optimizer.enqueue_trial(outside).is_err());
    }

    #[test]
    fn test_failed_trials_are_pruned() {
        let config = OptimizationConfig::new()
            .with_n_trials(10)
            .with_sampler(SamplerType::Random);
        let mut optimizer = HyperOptimizer::new(config, space());

        let mut calls = 0;
        let study = optimizer
            .optimize(|p: &TrialParams| {
                calls += 1;
                if calls % 2 == 0 {
                    Err(ChurnError::TrainingError("boom".into()))
                } else {
                    quadratic_objective(p)
                }
            })
            .unwrap();

        assert_eq!(study.n_completed(), 5);
        let best = study.best_trial().unwrap();
        assert!(!best.pruned);
        assert!(study.trials.iter().filter(|t| t.pruned).all(|t| t.error.is_some()));
    }

    #[test]
    fn test_all_failed_is_error() {
        let config = OptimizationConfig::new().with_n_trials(3);
        let mut optimizer = HyperOptimizer::new(config, space());
        let result = optimizer.optimize(|_: &TrialParams| -> Result<f64> {
            Err(ChurnError::TrainingError("nope".into()))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_early_stopping() {
        let config = OptimizationConfig::new()
            .with_n_trials(100)
            .with_direction(OptimizeDirection::Minimize)
            .with_early_stopping(20);

        let constant_objective = |_: &TrialParams| -> Result<f64> { Ok(1.0) };

        let mut optimizer = HyperOptimizer::new(config, SearchSpace::new().float("x", 0.0, 1.0));
        let study = optimizer.optimize(constant_objective).unwrap();

        // Should stop early due to no improvement
        assert_eq!(study.trials.len(), 21);
    }

    #[test]
    fn test_study_json_round_trip() {
        let config = OptimizationConfig::new().with_n_trials(5);
        let mut optimizer = HyperOptimizer::new(config, space());
        optimizer.optimize(quadratic_objective).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.json");
        optimizer.study().save(&path).unwrap();

        let loaded = Study::load(&path).unwrap();
        assert_eq!(loaded.trials.len(), 5);
        assert_eq!(loaded.best_trial_idx, optimizer.study().best_trial_idx);
        assert_eq!(loaded.best_params(), optimizer.study().best_params());
        assert_eq!(loaded.direction, OptimizeDirection::Maximize);
    }
}
