//! Ensemble hyperparameters: tuned defaults and trial overrides
//!
//! Trial parameters are keyed `<family>__<param>` where the family is one of
//! `lgbm`, `xgb`, `cat` or `vc` (the voting weights).

use crate::ensemble::VotingStrategy;
use crate::error::{ChurnError, Result};
use crate::optimizer::{ParameterValue, TrialParams};
use crate::training::{CatBoostConfig, LightGBMConfig, XGBoostConfig};
use serde::{Deserialize, Serialize};

/// Seed shared by all three model families
pub const DEFAULT_RANDOM_STATE: u64 = 503;

/// Separator between family and parameter name in trial keys
pub const KEY_SEPARATOR: &str = "__";

/// Voting combination of the three families
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingParams {
    pub strategy: VotingStrategy,
    /// Weights for (lgbm, xgb, cat)
    pub weights: [f64; 3],
}

impl Default for VotingParams {
    fn default() -> Self {
        Self {
            strategy: VotingStrategy::Soft,
            weights: [3.0146183474429327, 0.5762900154092979, 1.5605382149604368],
        }
    }
}

/// Hyperparameters for the full ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleParams {
    pub lgbm: LightGBMConfig,
    pub xgb: XGBoostConfig,
    pub cat: CatBoostConfig,
    pub voting: VotingParams,
}

impl Default for EnsembleParams {
    fn default() -> Self {
        let seed = Some(DEFAULT_RANDOM_STATE);
        Self {
            lgbm: LightGBMConfig {
                n_estimators: 960,
                subsample: 0.4604756677696442,
                colsample_bytree: 0.465375841230126,
                learning_rate: 0.04531704129811222,
                max_depth: Some(6),
                num_leaves: 803,
                reg_alpha: 0.4132098753297654,
                reg_lambda: 0.9992674466487466,
                random_state: seed,
                ..LightGBMConfig::default()
            },
            xgb: XGBoostConfig {
                n_estimators: 973,
                learning_rate: 0.0786311558099196,
                max_depth: 9,
                subsample: 0.6451633803299511,
                colsample_bytree: 0.20800229296622322,
                min_child_weight: 11.0,
                random_state: seed,
                ..XGBoostConfig::default()
            },
            cat: CatBoostConfig {
                iterations: 1395,
                learning_rate: 0.025092883785253036,
                depth: 6,
                subsample: 0.32039321811073496,
                colsample_bylevel: 0.47765607925544096,
                min_data_in_leaf: 30,
                random_state: seed,
                ..CatBoostConfig::default()
            },
            voting: VotingParams::default(),
        }
    }
}

fn float_of(key: &str, value: &ParameterValue) -> Result<f64> {
    value.as_float().ok_or_else(|| ChurnError::InvalidParameter {
        name: key.to_string(),
        value: value.to_string(),
        reason: "expected a number".to_string(),
    })
}

fn usize_of(key: &str, value: &ParameterValue) -> Result<usize> {
    value
        .as_int()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| ChurnError::InvalidParameter {
            name: key.to_string(),
            value: value.to_string(),
            reason: "expected a non-negative integer".to_string(),
        })
}

fn unknown(key: &str) -> ChurnError {
    ChurnError::ConfigError(format!("unknown hyperparameter '{}'", key))
}

impl EnsembleParams {
    /// Use one seed for every family
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.lgbm.random_state = Some(seed);
        self.xgb.random_state = Some(seed);
        self.cat.random_state = Some(seed);
        self
    }

    /// Defaults with every trial value applied on top
    pub fn from_trial(params: &TrialParams) -> Result<Self> {
        let mut out = Self::default();
        out.apply_overrides(params)?;
        Ok(out)
    }

    /// Override fields key by key; unknown keys are a configuration error
    pub fn apply_overrides(&mut self, params: &TrialParams) -> Result<()> {
        for (key, value) in params {
            let (family, name) = key.split_once(KEY_SEPARATOR).ok_or_else(|| unknown(key))?;
            match family {
                "lgbm" => self.set_lgbm(key, name, value)?,
                "xgb" => self.set_xgb(key, name, value)?,
                "cat" => self.set_cat(key, name, value)?,
                "vc" => self.set_voting(key, name, value)?,
                _ => return Err(unknown(key)),
            }
        }
        Ok(())
    }

    fn set_lgbm(&mut self, key: &str, name: &str, value: &ParameterValue) -> Result<()> {
        let c = &mut self.lgbm;
        match name {
            "n_estimators" => c.n_estimators = usize_of(key, value)?,
            "learning_rate" => c.learning_rate = float_of(key, value)?,
            "num_leaves" => c.num_leaves = usize_of(key, value)?,
            "max_depth" => c.max_depth = Some(usize_of(key, value)?),
            "min_child_samples" => c.min_child_samples = usize_of(key, value)?,
            "reg_alpha" => c.reg_alpha = float_of(key, value)?,
            "reg_lambda" => c.reg_lambda = float_of(key, value)?,
            "subsample" => c.subsample = float_of(key, value)?,
            "subsample_freq" => c.subsample_freq = usize_of(key, value)?,
            "colsample_bytree" => c.colsample_bytree = float_of(key, value)?,
            "random_state" => c.random_state = Some(usize_of(key, value)? as u64),
            _ => return Err(unknown(key)),
        }
        Ok(())
    }

    fn set_xgb(&mut self, key: &str, name: &str, value: &ParameterValue) -> Result<()> {
        let c = &mut self.xgb;
        match name {
            "n_estimators" => c.n_estimators = usize_of(key, value)?,
            "learning_rate" => c.learning_rate = float_of(key, value)?,
            "max_depth" => c.max_depth = usize_of(key, value)?,
            "min_child_weight" => c.min_child_weight = float_of(key, value)?,
            "reg_lambda" => c.reg_lambda = float_of(key, value)?,
            "reg_alpha" => c.reg_alpha = float_of(key, value)?,
            "gamma" => c.gamma = float_of(key, value)?,
            "subsample" => c.subsample = float_of(key, value)?,
            "colsample_bytree" => c.colsample_bytree = float_of(key, value)?,
            "random_state" => c.random_state = Some(usize_of(key, value)? as u64),
            _ => return Err(unknown(key)),
        }
        Ok(())
    }

    fn set_cat(&mut self, key: &str, name: &str, value: &ParameterValue) -> Result<()> {
        let c = &mut self.cat;
        match name {
            "iterations" => c.iterations = usize_of(key, value)?,
            "learning_rate" => c.learning_rate = float_of(key, value)?,
            "depth" => c.depth = usize_of(key, value)?,
            "l2_leaf_reg" => c.l2_leaf_reg = float_of(key, value)?,
            "subsample" => c.subsample = float_of(key, value)?,
            "colsample_bylevel" => c.colsample_bylevel = float_of(key, value)?,
            "min_data_in_leaf" => c.min_data_in_leaf = usize_of(key, value)?,
            "random_state" => c.random_state = Some(usize_of(key, value)? as u64),
            _ => return Err(unknown(key)),
        }
        Ok(())
    }

    fn set_voting(&mut self, key: &str, name: &str, value: &ParameterValue) -> Result<()> {
        let idx = match name {
            "lgbm_weight" => 0,
            "xgb_weight" => 1,
            "cat_weight" => 2,
            _ => return Err(unknown(key)),
        };
        self.voting.weights[idx] = float_of(key, value)?;
        Ok(())
    }

    /// The parameters the search tunes, at their current values
    pub fn to_trial_params(&self) -> TrialParams {
        let mut p = TrialParams::new();
        let mut int = |k: &str, v: usize| p.insert(k.to_string(), ParameterValue::Int(v as i64));
        int("lgbm__n_estimators", self.lgbm.n_estimators);
        if let Some(depth) = self.lgbm.max_depth {
            int("lgbm__max_depth", depth);
        }
        int("lgbm__num_leaves", self.lgbm.num_leaves);
        int("xgb__n_estimators", self.xgb.n_estimators);
        int("xgb__max_depth", self.xgb.max_depth);
        int("xgb__min_child_weight", self.xgb.min_child_weight.round() as usize);
        int("cat__iterations", self.cat.iterations);
        int("cat__depth", self.cat.depth);
        int("cat__min_data_in_leaf", self.cat.min_data_in_leaf);

        let floats = [
            ("lgbm__subsample", self.lgbm.subsample),
            ("lgbm__colsample_bytree", self.lgbm.colsample_bytree),
            ("lgbm__learning_rate", self.lgbm.learning_rate),
            ("lgbm__reg_alpha", self.lgbm.reg_alpha),
            ("lgbm__reg_lambda", self.lgbm.reg_lambda),
            ("xgb__learning_rate", self.xgb.learning_rate),
            ("xgb__subsample", self.xgb.subsample),
            ("xgb__colsample_bytree", self.xgb.colsample_bytree),
            ("cat__learning_rate", self.cat.learning_rate),
            ("cat__subsample", self.cat.subsample),
            ("cat__colsample_bylevel", self.cat.colsample_bylevel),
            ("vc__lgbm_weight", self.voting.weights[0]),
            ("vc__xgb_weight", self.voting.weights[1]),
            ("vc__cat_weight", self.voting.weights[2]),
        ];
        for (k, v) in floats {
            p.insert(k.to_string(), ParameterValue::Float(v));
        }
        p
    }
}
