//! Preprocessing configuration

use super::{EncoderType, ScalerType};
use crate::feature_engineering::{SvdConfig, AGE_CATEGORY, SUR_GEO_GEND_SAL};
use serde::{Deserialize, Serialize};

/// Configuration for the bank-churn data pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Type of scaler applied to `scaled_columns`
    pub scaler_type: ScalerType,

    /// Type of encoder applied to `categorical_columns`
    pub encoder_type: EncoderType,

    /// Columns expanded by the encoder
    pub categorical_columns: Vec<String>,

    /// Numeric columns rescaled with the training-fold statistics
    pub scaled_columns: Vec<String>,

    /// String columns embedded with TF-IDF + truncated SVD, then dropped
    pub text_columns: Vec<String>,

    /// Identifier columns removed before modelling
    pub dropped_columns: Vec<String>,

    /// Truncated SVD settings for every text column
    pub svd: SvdConfig,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            scaler_type: ScalerType::MinMax,
            encoder_type: EncoderType::OneHot,
            categorical_columns: owned(&["Geography", "Gender", "NumOfProducts", AGE_CATEGORY]),
            scaled_columns: owned(&["CreditScore", "Age", "Balance", "EstimatedSalary"]),
            text_columns: owned(&["Surname", SUR_GEO_GEND_SAL]),
            dropped_columns: owned(&["id", "CustomerId"]),
            svd: SvdConfig::default(),
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set scaler type
    pub fn with_scaler(mut self, scaler_type: ScalerType) -> Self {
        self.scaler_type = scaler_type;
        self
    }

    /// Builder method to set encoder type
    pub fn with_encoder(mut self, encoder_type: EncoderType) -> Self {
        self.encoder_type = encoder_type;
        self
    }

    /// Builder method to set the number of SVD components per text column
    pub fn with_svd_components(mut self, n_components: usize) -> Self {
        self.svd.n_components = n_components;
        self
    }
}
