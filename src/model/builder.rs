//! Voting ensemble construction from [`EnsembleParams`]

use super::params::EnsembleParams;
use crate::ensemble::VotingClassifier;
use crate::error::Result;
use crate::training::{CatBoostClassifier, Classifier, LightGBMClassifier, XGBoostClassifier};

/// Unfitted LGBM + XGB + CatBoost voting ensemble, weighted in that order
pub fn build_ensemble(params: &EnsembleParams) -> Result<VotingClassifier> {
    let members: Vec<Box<dyn Classifier>> = vec![
        Box::new(LightGBMClassifier::new(params.lgbm.clone())),
        Box::new(XGBoostClassifier::new(params.xgb.clone())),
        Box::new(CatBoostClassifier::new(params.cat.clone())),
    ];
    VotingClassifier::new(members, params.voting.strategy)?.with_weights(params.voting.weights.to_vec())
}
