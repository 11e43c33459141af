//! Error types for training and inference

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for model operations
pub type Result<T, E = ModelError> = std::result::Result<T, E>;

/// A single rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every field that failed validation for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.field.as_str())
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields().any(|f| f == field)
    }

    /// Ok when nothing was collected, the error itself otherwise.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "Validation errors: {}", messages.join(", "))
    }
}

impl std::error::Error for ValidationError {}

/// Why a persisted artifact could not be written or read back
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Decoding failed: {0}")]
    Decode(String),

    #[error("Unsupported artifact format version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown model type `{0}`")]
    UnknownModelType(String),

    #[error("Incompatible artifact: {0}")]
    Incompatible(String),
}

/// Errors surfaced by the model lifecycle
#[derive(Debug, Error)]
pub enum ModelError {
    /// Input field missing or out of range
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Nothing trained in this process and no artifact on disk
    #[error("Model not trained or loaded (no artifact at {})", path.display())]
    ModelUnavailable { path: PathBuf },

    /// The artifact exists but cannot be used
    #[error("Model artifact at {} is unusable: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: ArtifactError,
    },

    /// No usable rows, or a malformed source file
    #[error("Training data error: {0}")]
    TrainingData(String),

    #[error("A training run is already in progress")]
    TrainingInProgress,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Classifier error: {0}")]
    Classifier(String),
}

impl ModelError {
    pub(crate) fn persistence(path: &Path, source: impl Into<ArtifactError>) -> Self {
        ModelError::Persistence {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    /// True for conditions the caller can fix and retry (bad input, train first, wait).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ModelError::Validation(_)
                | ModelError::ModelUnavailable { .. }
                | ModelError::TrainingInProgress
                | ModelError::InvalidParameter(_)
        )
    }
}

impl From<ndarray::ShapeError> for ModelError {
    fn from(err: ndarray::ShapeError) -> Self {
        ModelError::Classifier(format!("shape mismatch: {err}"))
    }
}
