//! Data preprocessing pipeline
//!
//! Raw competition rows in, model-ready matrix out. Everything learned
//! (categories, scaling ranges, vocabularies, SVD components, the output
//! column list) comes from the frame passed to [`DataPipeline::fit`], so a
//! pipeline fitted on a training fold transforms validation and test rows
//! into exactly the same columns.

use super::{
    config::PreprocessingConfig,
    encoder::Encoder,
    scaler::Scaler,
};
use crate::data::{f64_column, require_columns};
use crate::error::{ChurnError, Result};
use crate::feature_engineering::{engineer_features, TextEmbedder};
use ndarray::Array2;
use polars::prelude::*;
use std::time::Instant;
use tracing::debug;

/// Dense feature matrix with its column names
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub x: Array2<f64>,
    pub feature_names: Vec<String>,
}

impl FeatureMatrix {
    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }
}

/// Feature engineering, encoding, text embedding and scaling in one unit
#[derive(Debug, Clone)]
pub struct DataPipeline {
    config: PreprocessingConfig,
    encoder: Option<Encoder>,
    scaler: Option<Scaler>,
    embedder: Option<TextEmbedder>,
    /// Plain numeric columns carried through, in input order
    passthrough_columns: Vec<String>,
    feature_names: Vec<String>,
    /// Timing: seconds spent in last fit call
    fit_time: Option<f64>,
}

impl DataPipeline {
    /// Create a new pipeline with default configuration
    pub fn new() -> Self {
        Self::with_config(PreprocessingConfig::default())
    }

    /// Create a new pipeline with custom configuration
    pub fn with_config(config: PreprocessingConfig) -> Self {
        Self {
            config,
            encoder: None,
            scaler: None,
            embedder: None,
            passthrough_columns: Vec::new(),
            feature_names: Vec::new(),
            fit_time: None,
        }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        !self.feature_names.is_empty()
    }

    /// Output column names, in matrix order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }

    fn names(columns: &[String]) -> Vec<&str> {
        columns.iter().map(|s| s.as_str()).collect()
    }

    /// Fit the pipeline to raw feature rows (no label column)
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let start = Instant::now();
        if df.height() == 0 {
            return Err(ChurnError::PreprocessingError("cannot fit on an empty frame".into()));
        }

        let engineered = engineer_features(df)?;

        let categorical = Self::names(&self.config.categorical_columns);
        let scaled = Self::names(&self.config.scaled_columns);
        let text = Self::names(&self.config.text_columns);
        require_columns(&engineered, &categorical)?;
        require_columns(&engineered, &scaled)?;

        let mut embedder = TextEmbedder::new(&text, self.config.svd.clone());
        embedder.fit(&engineered)?;

        let mut encoder = Encoder::new(self.config.encoder_type.clone());
        encoder.fit(&engineered, &categorical)?;

        let mut scaler = Scaler::new(self.config.scaler_type.clone());
        scaler.fit(&engineered, &scaled)?;

        let excluded: Vec<&str> = categorical
            .iter()
            .chain(&text)
            .copied()
            .chain(self.config.dropped_columns.iter().map(|s| s.as_str()))
            .collect();
        self.passthrough_columns = engineered
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .filter(|c| !excluded.contains(&c.as_str()))
            .collect();

        let mut feature_names = self.passthrough_columns.clone();
        feature_names.extend(encoder.output_names());
        feature_names.extend(embedder.output_names());
        self.feature_names = feature_names;

        self.encoder = Some(encoder);
        self.scaler = Some(scaler);
        self.embedder = Some(embedder);
        self.fit_time = Some(start.elapsed().as_secs_f64());

        debug!(
            rows = df.height(),
            features = self.feature_names.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pipeline fitted"
        );
        Ok(self)
    }

    /// Transform raw feature rows into the fitted column layout
    pub fn transform(&self, df: &DataFrame) -> Result<FeatureMatrix> {
        let (encoder, scaler, embedder) = match (&self.encoder, &self.scaler, &self.embedder) {
            (Some(e), Some(s), Some(t)) => (e, s, t),
            _ => return Err(ChurnError::ModelNotFitted),
        };

        let engineered = engineer_features(df)?;
        let embedded = embedder.transform(&engineered)?;
        let encoded = encoder.transform(&embedded)?;
        let scaled = scaler.transform(&encoded)?;

        let mut x = Array2::zeros((df.height(), self.feature_names.len()));
        for (j, name) in self.feature_names.iter().enumerate() {
            let values = f64_column(&scaled, name)?;
            for (i, v) in values.into_iter().enumerate() {
                x[[i, j]] = v;
            }
        }

        Ok(FeatureMatrix {
            x,
            feature_names: self.feature_names.clone(),
        })
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<FeatureMatrix> {
        self.fit(df)?;
        self.transform(df)
    }
}

impl Default for DataPipeline {
    fn default() -> Self {
        Self::new()
    }
}
