//! Feature scaling implementations

use crate::data::f64_column;
use crate::error::{ChurnError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
}

/// Parameters for a fitted scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean or min
    scale: f64,  // std or range
}

/// Feature scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<(String, ScalerParams)>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut params = Vec::with_capacity(columns.len());
        for col_name in columns {
            let values = f64_column(df, col_name)?;
            params.push((col_name.to_string(), self.compute_params(&values)));
        }

        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data.
    /// Columns the scaler was not fitted on pass through unchanged.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ChurnError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (col_name, params) in &self.params {
            let scaled: Vec<f64> = f64_column(df, col_name)?
                .into_iter()
                .map(|v| (v - params.center) / params.scale)
                .collect();
            result.with_column(Series::new(col_name.as_str().into(), scaled))?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    fn compute_params(&self, values: &[f64]) -> ScalerParams {
        if values.is_empty() {
            return ScalerParams { center: 0.0, scale: 1.0 };
        }
        match self.scaler_type {
            ScalerType::Standard => {
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                ScalerParams {
                    center: mean,
                    scale: if std == 0.0 { 1.0 } else { std },
                }
            }
            ScalerType::MinMax => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                }
            }
        }
    }
}
