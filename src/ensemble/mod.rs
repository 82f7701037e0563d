//! Ensemble methods module
//!
//! Provides the weighted voting ensemble (hard and soft voting) that
//! combines the boosted classifiers.

mod voting;

pub use voting::{VotingClassifier, VotingStrategy};
