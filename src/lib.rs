//! churnboost - bank-churn classification runner
//!
//! Loads the competition CSVs, engineers features, trains a soft-voting
//! ensemble of three gradient-boosted tree classifiers and writes a
//! submission. Hyperparameters can be tuned with a TPE search first.
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - CSV loading, validation and submission writing
//! - [`feature_engineering`] - Derived columns, TF-IDF, truncated SVD
//! - [`preprocessing`] - Encoding, scaling and the fold-level pipeline
//!
//! ## Models
//! - [`training`] - XGBoost, LightGBM and CatBoost style classifiers, CV, metrics
//! - [`ensemble`] - Weighted voting classifier
//! - [`optimizer`] - Search space, samplers (random, TPE) and studies
//! - [`model`] - Ensemble hyperparameters, construction and search
//!
//! ## Running
//! - [`config`] - Run configuration
//! - [`runner`] - K-fold prediction, predict and optimize modes
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod data;
pub mod feature_engineering;
pub mod preprocessing;

// Models
pub mod training;
pub mod ensemble;
pub mod optimizer;
pub mod model;

// Running
pub mod config;
pub mod runner;
pub mod cli;

pub use error::{ChurnError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ChurnError, Result};

    // Data
    pub use crate::data::{load_competition_data, write_submission, CompetitionData, Submission};

    // Preprocessing
    pub use crate::preprocessing::{DataPipeline, FeatureMatrix, PreprocessingConfig};

    // Training
    pub use crate::training::{
        CatBoostClassifier, Classifier, LightGBMClassifier, StratifiedKFold, XGBoostClassifier,
    };

    // Ensemble
    pub use crate::ensemble::{VotingClassifier, VotingStrategy};

    // Optimization
    pub use crate::optimizer::{HyperOptimizer, OptimizationConfig, SearchSpace, Study};

    // Model
    pub use crate::model::{build_ensemble, EnsembleParams};

    // Running
    pub use crate::config::RunConfig;
    pub use crate::runner::{kfold_prediction, run, RunMode, RunReport};
}
