//! Model training module
//!
//! Provides the binary classifiers used by the churn ensemble:
//! - XGBoost-style level-wise boosting
//! - LightGBM-style leaf-wise boosting (GBDT / GOSS)
//! - CatBoost-style boosting on symmetric trees
//!
//! plus the shared histogram binning, stratified cross-validation and
//! evaluation metrics.

mod boosting;
mod histogram;
mod models;
pub mod catboost;
pub mod cross_validation;
pub mod lightgbm;
pub mod metrics;
pub mod xgboost;

pub use catboost::{CatBoostClassifier, CatBoostConfig};
pub use cross_validation::{CVResults, CVSplit, StratifiedKFold};
pub use histogram::{BinnedMatrix, FeatureBins, MAX_BINS};
pub use lightgbm::{BoostingType, LightGBMClassifier, LightGBMConfig};
pub use metrics::{accuracy_score, log_loss, roc_auc_score};
pub use models::{ClassificationMetrics, Classifier};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
