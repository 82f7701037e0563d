//! The bank-churn model: ensemble hyperparameters, construction and search

pub mod builder;
pub mod params;
pub mod search;

pub use builder::build_ensemble;
pub use params::{EnsembleParams, VotingParams, DEFAULT_RANDOM_STATE, KEY_SEPARATOR};
pub use search::{cross_validated_auc, ensemble_search_space, search_ensemble_params};
