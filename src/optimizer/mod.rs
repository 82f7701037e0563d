//! Hyperparameter optimization module
//!
//! Provides:
//! - Search spaces over float and integer parameters
//! - Tree-structured Parzen Estimators (TPE) and random search
//! - A sequential optimizer with enqueued trials, timeout and early stopping
//! - Studies persisted as JSON

mod config;
mod optimizer;
mod samplers;
mod search_space;

pub use config::{OptimizationConfig, OptimizeDirection};
pub use optimizer::{HyperOptimizer, Study, TrialResult};
pub use samplers::{create_sampler, RandomSampler, Sampler, SamplerType, TPESampler};
pub use search_space::{Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
