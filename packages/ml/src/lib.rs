//! Crop recommendation engine
//!
//! Feature schema, training data preparation, a random forest classifier on
//! top of [`linfa_trees`] and the lifecycle that trains, persists, loads and
//! serves it.

pub mod dataset;
pub mod error;
pub mod forest;
pub mod lifecycle;
pub mod metrics;
pub mod model;
pub mod schema;

#[cfg(test)]
mod tests;

pub use error::{ArtifactError, FieldError, ModelError, Result, ValidationError};
pub use lifecycle::{
    DEFAULT_RANDOM_SEED, DEFAULT_TEST_SIZE, FeatureImportance, ModelConfig, ModelManager,
    TrainingReport,
};
pub use model::{ModelInfo, PredictionResult, TrainedModel};
pub use schema::{Feature, FeatureVector, RawRecord, sample_input};
