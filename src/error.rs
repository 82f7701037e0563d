//! Error types for the churn pipeline

use thiserror::Error;

/// Result type alias for churnboost operations
pub type Result<T> = std::result::Result<T, ChurnError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum ChurnError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Optimization error: {0}")]
    OptimizationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<polars::error::PolarsError> for ChurnError {
    fn from(err: polars::error::PolarsError) -> Self {
        ChurnError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ChurnError {
    fn from(err: serde_json::Error) -> Self {
        ChurnError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ChurnError {
    fn from(err: ndarray::ShapeError) -> Self {
        ChurnError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChurnError::ColumnNotFound("Exited".to_string());
        assert_eq!(err.to_string(), "Column not found: Exited");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "train.csv");
        let err: ChurnError = io_err.into();
        assert!(matches!(err, ChurnError::IoError(_)));
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = ChurnError::InvalidParameter {
            name: "weights".into(),
            value: "[]".into(),
            reason: "must not be empty".into(),
        };
        assert_eq!(err.to_string(), "Invalid parameter: weights = [], must not be empty");
    }
}
