//! Run configuration
//!
//! Everything a run needs besides the data itself. Loaded from an optional
//! JSON file; command-line flags override individual fields.

use crate::error::{ChurnError, Result};
use crate::model::DEFAULT_RANDOM_STATE;
use crate::optimizer::OptimizationConfig;
use crate::preprocessing::PreprocessingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration of a predict or optimize run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding `train.csv` and `test.csv`
    pub data_dir: PathBuf,

    /// Submission CSV to write
    pub output: PathBuf,

    /// Where the optimize mode saves its study
    pub study_path: PathBuf,

    /// Study file whose best trial replaces the default hyperparameters
    pub params_path: Option<PathBuf>,

    /// Stratified folds for prediction and for the search objective
    pub n_folds: usize,

    /// Seed for every model family
    pub random_state: u64,

    pub optimization: OptimizationConfig,

    pub preprocessing: PreprocessingConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            output: PathBuf::from("./submission.csv"),
            study_path: PathBuf::from("./optuna_results.json"),
            params_path: None,
            n_folds: 5,
            random_state: DEFAULT_RANDOM_STATE,
            optimization: OptimizationConfig::default(),
            preprocessing: PreprocessingConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChurnError::ConfigError(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        // The sampler follows the run seed unless the file sets its own
        let sampler_seed_set = value.pointer("/optimization/random_state").is_some();
        let mut config: Self = serde_json::from_value(value)?;
        if !sampler_seed_set {
            config.optimization.random_state = Some(config.random_state);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = path.into();
        self
    }

    pub fn with_study_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.study_path = path.into();
        self
    }

    pub fn with_params_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.params_path = Some(path.into());
        self
    }

    pub fn with_n_folds(mut self, n: usize) -> Self {
        self.n_folds = n;
        self
    }

    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.optimization.n_trials = n;
        self
    }

    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.optimization.timeout_secs = Some(secs);
        self
    }

    /// Seed the models and the sampler
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self.optimization.random_state = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_folds < 2 {
            return Err(ChurnError::InvalidParameter {
                name: "n_folds".into(),
                value: self.n_folds.to_string(),
                reason: "need at least 2 folds".into(),
            });
        }
        if self.optimization.n_trials == 0 {
            return Err(ChurnError::InvalidParameter {
                name: "n_trials".into(),
                value: "0".into(),
                reason: "need at least one trial".into(),
            });
        }
        if let Some(t) = self.optimization.timeout_secs {
            if t.is_nan() || t <= 0.0 {
                return Err(ChurnError::InvalidParameter {
                    name: "timeout_secs".into(),
                    value: t.to_string(),
                    reason: "must be positive".into(),
                });
            }
        }
        Ok(())
    }
}
