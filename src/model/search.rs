//! Hyperparameter search over the three model families
//!
//! The objective is the mean ROC-AUC of the voting ensemble over stratified
//! folds of an already transformed training matrix.

use super::builder::build_ensemble;
use super::params::EnsembleParams;
use crate::error::Result;
use crate::optimizer::{HyperOptimizer, OptimizationConfig, SearchSpace, Study, TrialParams};
use crate::training::{roc_auc_score, CVResults, Classifier, StratifiedKFold};
use ndarray::{Array1, Array2, Axis};
use tracing::{debug, info};

/// Search space for every tuned hyperparameter
pub fn ensemble_search_space() -> SearchSpace {
    SearchSpace::new()
        .int("lgbm__n_estimators", 500, 2500)
        .float("lgbm__subsample", 0.05, 1.0)
        .float("lgbm__colsample_bytree", 0.05, 1.0)
        .float("lgbm__learning_rate", 1e-3, 0.1)
        .int("lgbm__max_depth", 1, 10)
        .int("lgbm__num_leaves", 2, 1000)
        .float("lgbm__reg_alpha", 0.05, 1.0)
        .float("lgbm__reg_lambda", 0.05, 1.0)
        .int("xgb__n_estimators", 500, 2500)
        .float("xgb__learning_rate", 1e-3, 0.1)
        .int("xgb__max_depth", 1, 10)
        .float("xgb__subsample", 0.05, 1.0)
        .float("xgb__colsample_bytree", 0.05, 1.0)
        .int("xgb__min_child_weight", 1, 20)
        .int("cat__iterations", 500, 1500)
        .float("cat__learning_rate", 1e-3, 0.1)
        .int("cat__depth", 1, 10)
        .float("cat__subsample", 0.05, 1.0)
        .float("cat__colsample_bylevel", 0.05, 1.0)
        .int("cat__min_data_in_leaf", 1, 100)
        .float("vc__lgbm_weight", 0.1, 5.0)
        .float("vc__xgb_weight", 0.1, 5.0)
        .float("vc__cat_weight", 0.1, 5.0)
}

/// Mean validation ROC-AUC of the ensemble built from `params`
pub fn cross_validated_auc(
    params: &EnsembleParams,
    x: &Array2<f64>,
    y: &Array1<f64>,
    n_folds: usize,
) -> Result<CVResults> {
    let splits = StratifiedKFold::new(n_folds).split(y)?;
    let mut scores = Vec::with_capacity(splits.len());

    for split in &splits {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_val = x.select(Axis(0), &split.test_indices);
        let y_val = y.select(Axis(0), &split.test_indices);

        let mut model = build_ensemble(params)?;
        model.fit(&x_train, &y_train)?;
        let auc = roc_auc_score(&y_val, &model.predict_proba(&x_val)?)?;
        debug!(fold = split.fold_idx, auc, "fold scored");
        scores.push(auc);
    }

    Ok(CVResults::from_scores(scores))
}

/// Search ensemble hyperparameters on a transformed training matrix.
///
/// Every trial is applied on top of `baseline`, which carries the seed and
/// the untuned fields. The baseline itself is enqueued as the first trial, so
/// the best trial never scores below it.
pub fn search_ensemble_params(
    x: &Array2<f64>,
    y: &Array1<f64>,
    config: OptimizationConfig,
    baseline: &EnsembleParams,
    n_folds: usize,
) -> Result<Study> {
    let mut optimizer = HyperOptimizer::new(config, ensemble_search_space());
    optimizer.enqueue_trial(baseline.to_trial_params())?;

    optimizer.optimize(|trial: &TrialParams| {
        let mut params = baseline.clone();
        params.apply_overrides(trial)?;
        Ok(cross_validated_auc(&params, x, y, n_folds)?.mean_score)
    })?;

    let study = optimizer.into_study();
    if let Some(best) = study.best_trial() {
        info!(
            trial = best.trial_id,
            auc = best.value,
            completed = study.n_completed(),
            "search finished"
        );
    }
    Ok(study)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::SamplerType;

    fn tiny_params() -> EnsembleParams {
        let mut p = EnsembleParams::default();
        p.lgbm.n_estimators = 10;
        p.lgbm.num_leaves = 4;
        p.lgbm.min_child_samples = 2;
        p.xgb.n_estimators = 10;
        p.xgb.max_depth = 2;
        p.xgb.min_child_weight = 1.0;
        p.cat.iterations = 10;
        p.cat.depth = 2;
        p.cat.min_data_in_leaf = 1;
        p
    }

    /// Smallest in-range values of the search space, for a quick baseline trial
    fn in_range_params() -> EnsembleParams {
        let mut p = EnsembleParams::default();
        p.lgbm.n_estimators = 500;
        p.lgbm.max_depth = Some(1);
        p.lgbm.num_leaves = 2;
        p.xgb.n_estimators = 500;
        p.xgb.max_depth = 1;
        p.cat.iterations = 500;
        p.cat.depth = 1;
        p
    }

    fn separable(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i * 37 + j * 11) % n) as f64 / n as f64);
        let y = x.column(0).mapv(|v| if v > 0.5 { 1.0 } else { 0.0 });
        (x, y)
    }

    #[test]
    fn test_search_space_matches_trial_params() {
        let space = ensemble_search_space();
        let defaults = EnsembleParams::default().to_trial_params();
        assert_eq!(space.len(), defaults.len());
        for (name, value) in &defaults {
            let param = space.get(name).unwrap();
            assert!(param.contains(value), "{} = {} out of range", name, value);
        }
    }

    #[test]
    fn test_cross_validated_auc() {
        let (x, y) = separable(60);
        let cv = cross_validated_auc(&tiny_params(), &x, &y, 3).unwrap();
        assert_eq!(cv.n_folds, 3);
        assert!(cv.mean_score > 0.9, "auc {}", cv.mean_score);
    }

    #[test]
    fn test_search_starts_from_baseline() {
        let (x, y) = separable(40);
        let config = OptimizationConfig::new()
            .with_n_trials(1)
            .with_sampler(SamplerType::Random)
            .with_random_state(7);
        let baseline = in_range_params();
        let study = search_ensemble_params(&x, &y, config, &baseline, 2).unwrap();

        assert_eq!(study.trials.len(), 1);
        assert_eq!(study.trials[0].params, baseline.to_trial_params());
        assert!(!study.trials[0].pruned);
    }

    #[test]
    fn test_first_trial_scores_the_seeded_baseline() {
        let (x, y) = separable(40);
        let config = OptimizationConfig::new()
            .with_n_trials(1)
            .with_sampler(SamplerType::Random)
            .with_random_state(7);
        let mut baseline = in_range_params().with_random_state(7);
        baseline.lgbm.subsample_freq = 1;
        baseline.lgbm.subsample = 0.5;
        let study = search_ensemble_params(&x, &y, config, &baseline, 2).unwrap();

        let expected = cross_validated_auc(&baseline, &x, &y, 2).unwrap().mean_score;
        assert_eq!(study.trials[0].value, expected);
    }

    #[test]
    fn test_out_of_range_baseline_is_rejected() {
        let (x, y) = separable(20);
        let config = OptimizationConfig::new().with_n_trials(1);
        assert!(search_ensemble_params(&x, &y, config, &tiny_params(), 2).is_err());
    }
}
