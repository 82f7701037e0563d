//! The two run modes: predict and optimize
//!
//! Both end in [`kfold_prediction`]: per stratified fold the data pipeline is
//! fitted on the training rows only, the ensemble is trained, scored on the
//! held-out rows and applied to the test set. The submission is the mean of
//! the fold predictions.

use crate::config::RunConfig;
use crate::data::{load_competition_data, take_rows, write_submission, CompetitionData};
use crate::error::{ChurnError, Result};
use crate::model::{build_ensemble, search_ensemble_params, EnsembleParams};
use crate::optimizer::Study;
use crate::preprocessing::DataPipeline;
use crate::training::{CVResults, ClassificationMetrics, Classifier, StratifiedKFold};
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Which routine a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Predict,
    Optimize,
}

/// Scores of one validation fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldScore {
    pub fold: usize,
    pub accuracy: f64,
    pub auc: f64,
    pub log_loss: f64,
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub folds: Vec<FoldScore>,
    pub mean_auc: f64,
    pub std_auc: f64,
    pub n_features: usize,
    pub n_test: usize,
    pub output: PathBuf,
    /// Best search trial as (trial id, CV AUC), optimize mode only
    pub best_trial: Option<(usize, f64)>,
    pub elapsed_secs: f64,
}

/// Test predictions averaged over the folds, plus per-fold validation scores
#[derive(Debug, Clone)]
pub struct KFoldOutput {
    pub test_predictions: Array1<f64>,
    pub folds: Vec<FoldScore>,
    pub cv: CVResults,
    pub n_features: usize,
}

/// Stratified K-fold training with fold-level preprocessing
pub fn kfold_prediction(
    data: &CompetitionData,
    params: &EnsembleParams,
    config: &RunConfig,
) -> Result<KFoldOutput> {
    let splits = StratifiedKFold::new(config.n_folds).split(&data.target)?;
    let mut test_predictions = Array1::<f64>::zeros(data.test.height());
    let mut folds = Vec::with_capacity(splits.len());
    let mut n_features = 0;

    for split in &splits {
        let fold_start = Instant::now();
        let train_df = take_rows(&data.train, &split.train_indices)?;
        let val_df = take_rows(&data.train, &split.test_indices)?;
        let y_train = data.target.select(Axis(0), &split.train_indices);
        let y_val = data.target.select(Axis(0), &split.test_indices);

        let mut pipeline = DataPipeline::with_config(config.preprocessing.clone());
        let train = pipeline.fit_transform(&train_df)?;
        let val = pipeline.transform(&val_df)?;
        let test = pipeline.transform(&data.test)?;
        n_features = train.n_features();

        let mut model = build_ensemble(params)?;
        model.fit(&train.x, &y_train)?;

        let val_proba = model.predict_proba(&val.x)?;
        let val_pred = val_proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 });
        let metrics = ClassificationMetrics::compute(&y_val, &val_pred, &val_proba)?;
        info!(
            fold = split.fold_idx,
            accuracy = metrics.accuracy,
            auc = metrics.auc_roc,
            log_loss = metrics.log_loss,
            elapsed_ms = fold_start.elapsed().as_millis() as u64,
            "fold finished"
        );

        test_predictions += &model.predict_proba(&test.x)?;
        folds.push(FoldScore {
            fold: split.fold_idx,
            accuracy: metrics.accuracy,
            auc: metrics.auc_roc,
            log_loss: metrics.log_loss,
        });
    }

    test_predictions /= splits.len() as f64;
    let cv = CVResults::from_scores(folds.iter().map(|f| f.auc).collect());
    info!(mean_auc = cv.mean_score, std_auc = cv.std_score, "cross-validation finished");

    Ok(KFoldOutput {
        test_predictions,
        folds,
        cv,
        n_features,
    })
}

/// Best trial of a saved study applied over the defaults
pub fn load_tuned_params(path: impl AsRef<Path>) -> Result<EnsembleParams> {
    let path = path.as_ref();
    let study = Study::load(path)?;
    let best = study.best_params().ok_or_else(|| {
        ChurnError::ConfigError(format!("study {} has no completed trial", path.display()))
    })?;
    EnsembleParams::from_trial(best)
}

fn base_params(config: &RunConfig) -> Result<EnsembleParams> {
    let params = match &config.params_path {
        Some(path) => {
            info!(path = %path.display(), "using tuned hyperparameters");
            load_tuned_params(path)?
        }
        None => EnsembleParams::default(),
    };
    Ok(params.with_random_state(config.random_state))
}

fn finish(
    mode: RunMode,
    data: &CompetitionData,
    params: &EnsembleParams,
    config: &RunConfig,
    best_trial: Option<(usize, f64)>,
    start: Instant,
) -> Result<RunReport> {
    let out = kfold_prediction(data, params, config)?;
    let submission = write_submission(&config.output, &data.test_ids, &out.test_predictions)?;

    Ok(RunReport {
        mode,
        folds: out.folds,
        mean_auc: out.cv.mean_score,
        std_auc: out.cv.std_score,
        n_features: out.n_features,
        n_test: submission.len(),
        output: config.output.clone(),
        best_trial,
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}

/// Train with fixed hyperparameters and write the submission
pub fn predict(config: &RunConfig) -> Result<RunReport> {
    let start = Instant::now();
    config.validate()?;
    let data = load_competition_data(&config.data_dir)?;
    let params = base_params(config)?;
    finish(RunMode::Predict, &data, &params, config, None, start)
}

/// Search hyperparameters, save the study, then predict with the best trial
pub fn optimize(config: &RunConfig) -> Result<RunReport> {
    let start = Instant::now();
    config.validate()?;
    let data = load_competition_data(&config.data_dir)?;
    let baseline = base_params(config)?;

    let mut pipeline = DataPipeline::with_config(config.preprocessing.clone());
    let features = pipeline.fit_transform(&data.train)?;
    info!(
        rows = features.n_samples(),
        features = features.n_features(),
        trials = config.optimization.n_trials,
        "starting hyperparameter search"
    );

    let study = search_ensemble_params(
        &features.x,
        &data.target,
        config.optimization.clone(),
        &baseline,
        config.n_folds,
    )?;
    study.save(&config.study_path)?;
    info!(path = %config.study_path.display(), "study saved");

    let best = study
        .best_trial()
        .ok_or_else(|| ChurnError::OptimizationError("search produced no completed trial".into()))?;
    if best.trial_id == 0 {
        warn!("no trial beat the baseline configuration");
    }
    let mut tuned = baseline.clone();
    tuned.apply_overrides(&best.params)?;
    let best_trial = Some((best.trial_id, best.value));

    finish(RunMode::Optimize, &data, &tuned, config, best_trial, start)
}

/// Dispatch on the run mode
pub fn run(config: &RunConfig, mode: RunMode) -> Result<RunReport> {
    match mode {
        RunMode::Predict => predict(config),
        RunMode::Optimize => optimize(config),
    }
}
