//! Data preprocessing module
//!
//! Turns raw competition frames into dense feature matrices:
//! - Categorical encoding (OneHot, Label)
//! - Feature scaling (MinMax, Standard)
//! - The fold-level `DataPipeline` combining both with the derived columns
//!   and text embeddings from `feature_engineering`

mod config;
mod encoder;
mod pipeline;
mod scaler;

pub use config::PreprocessingConfig;
pub use encoder::{Encoder, EncoderType};
pub use pipeline::{DataPipeline, FeatureMatrix};
pub use scaler::{Scaler, ScalerType};
