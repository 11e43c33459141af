//! Prediction history sinks

use chrono::{DateTime, Utc};
use crop_advisor_ml::RawRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum PredictionLogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionLogEntry {
    pub id: String,
    pub input: RawRecord,
    pub prediction: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl PredictionLogEntry {
    pub fn new(input: RawRecord, prediction: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            input,
            prediction: prediction.into(),
            confidence,
            timestamp: Utc::now(),
        }
    }
}

/// Where served predictions are recorded
#[async_trait::async_trait]
pub trait PredictionSink: Send + Sync {
    async fn record(&self, entry: PredictionLogEntry) -> Result<(), PredictionLogError>;
}

/// Discards every entry
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPredictionLog;

#[async_trait::async_trait]
impl PredictionSink for NoopPredictionLog {
    async fn record(&self, _entry: PredictionLogEntry) -> Result<(), PredictionLogError> {
        Ok(())
    }
}

/// Appends one JSON document per line
#[derive(Debug)]
pub struct JsonlPredictionLog {
    path: PathBuf,
    write: Mutex<()>,
}

impl JsonlPredictionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl PredictionSink for JsonlPredictionLog {
    async fn record(&self, entry: PredictionLogEntry) -> Result<(), PredictionLogError> {
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let _guard = self.write.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        tracing::debug!(id = %entry.id, path = %self.path.display(), "recorded prediction");
        Ok(())
    }
}
