//! Trained model artifact: classifier, label encoding and column order
//!
//! On disk the artifact is a Fory envelope carrying a format version and the
//! classifier kind around a MessagePack payload of the whole model.

use crate::error::{ArtifactError, ModelError, Result};
use crate::forest::{RandomForest, argmax};
use crate::schema::{Feature, RawRecord};
use chrono::{DateTime, Utc};
use fory::ForyObject;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;

/// Current on-disk format version
pub const ARTIFACT_VERSION: u8 = 1;

const RANDOM_FOREST_KIND: &str = "RandomForestClassifier";

/// Bijective mapping between crop names and class ids, ids in sorted name order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit(labels: &[String]) -> Result<Self> {
        let mut classes = labels.to_vec();
        classes.sort();
        classes.dedup();
        if classes.is_empty() {
            return Err(ModelError::TrainingData(
                "no labels to encode".to_string(),
            ));
        }
        Ok(Self { classes })
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .ok()
    }

    pub fn decode(&self, class: usize) -> Option<&str> {
        self.classes.get(class).map(String::as_str)
    }

    pub fn transform(&self, labels: &[String]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|l| {
                self.encode(l)
                    .ok_or_else(|| ModelError::Classifier(format!("unknown label `{l}`")))
            })
            .collect()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Supported classifier kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Classifier {
    RandomForest(RandomForest),
}

impl Classifier {
    pub fn kind(&self) -> &'static str {
        match self {
            Classifier::RandomForest(_) => RANDOM_FOREST_KIND,
        }
    }

    fn n_features(&self) -> usize {
        match self {
            Classifier::RandomForest(forest) => forest.n_features(),
        }
    }

    fn n_classes(&self) -> usize {
        match self {
            Classifier::RandomForest(forest) => forest.n_classes(),
        }
    }

    fn predict_proba(&self, records: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            Classifier::RandomForest(forest) => forest.predict_proba(records.view()),
        }
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Outcome of one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: String,
    /// Highest class probability
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub n_features: usize,
    pub feature_columns: Vec<String>,
    pub n_classes: usize,
    pub classes: Vec<String>,
    pub last_trained: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    classifier: Classifier,
    encoder: LabelEncoder,
    feature_columns: Vec<String>,
    trained_at: DateTime<Utc>,
}

impl TrainedModel {
    pub fn new(classifier: Classifier, encoder: LabelEncoder, feature_columns: Vec<String>) -> Self {
        Self {
            classifier,
            encoder,
            feature_columns,
            trained_at: Utc::now(),
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            model_type: self.classifier.kind().to_string(),
            n_features: self.feature_columns.len(),
            feature_columns: self.feature_columns.clone(),
            n_classes: self.encoder.len(),
            classes: self.encoder.classes().to_vec(),
            last_trained: self.trained_at,
        }
    }

    fn check_consistency(&self) -> std::result::Result<(), ArtifactError> {
        if self.classifier.n_classes() != self.encoder.len() {
            return Err(ArtifactError::Incompatible(format!(
                "classifier has {} classes but the encoder has {}",
                self.classifier.n_classes(),
                self.encoder.len()
            )));
        }
        if self.classifier.n_features() != self.feature_columns.len() {
            return Err(ArtifactError::Incompatible(format!(
                "classifier expects {} features but {} columns are recorded",
                self.classifier.n_features(),
                self.feature_columns.len()
            )));
        }
        if let Some(unknown) = self
            .feature_columns
            .iter()
            .find(|c| Feature::from_column(c).is_none())
        {
            return Err(ArtifactError::Incompatible(format!(
                "unknown feature column `{unknown}`"
            )));
        }
        Ok(())
    }

    /// Predict every record. Columns a record lacks are filled with the
    /// schema defaults before the classifier sees them.
    pub fn predict(&self, records: &[RawRecord]) -> Result<Vec<PredictionResult>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let width = self.feature_columns.len();
        let mut flat = Vec::with_capacity(records.len() * width);
        for record in records {
            let missing = record.missing_columns(&self.feature_columns);
            if !missing.is_empty() {
                tracing::debug!(?missing, "filling missing feature columns with defaults");
            }
            flat.extend(record.align(&self.feature_columns));
        }
        let matrix = Array2::from_shape_vec((records.len(), width), flat)?;
        let proba = self.classifier.predict_proba(&matrix)?;

        proba
            .rows()
            .into_iter()
            .map(|row| {
                let row = row.to_vec();
                let best = argmax(&row);
                let label = self.encoder.decode(best).ok_or_else(|| {
                    ModelError::Classifier(format!("class id {best} has no label"))
                })?;
                let probabilities = self
                    .encoder
                    .classes()
                    .iter()
                    .cloned()
                    .zip(row.iter().copied())
                    .collect();
                Ok(PredictionResult {
                    label: label.to_string(),
                    confidence: row[best],
                    probabilities,
                })
            })
            .collect()
    }

    pub fn to_artifact_bytes(&self) -> std::result::Result<Vec<u8>, ArtifactError> {
        use fory::Fory;

        let msgpack_payload =
            rmp_serde::to_vec_named(self).map_err(|e| ArtifactError::Encode(e.to_string()))?;

        let envelope = ArtifactEnvelope {
            version: ARTIFACT_VERSION,
            model_type: self.classifier.kind().to_string(),
            msgpack_payload,
        };

        let mut fory = Fory::default().compatible(true);
        fory.register::<ArtifactEnvelope>(1)
            .map_err(|e| ArtifactError::Encode(format!("cannot register envelope: {e}")))?;
        fory.serialize(&envelope)
            .map_err(|e| ArtifactError::Encode(e.to_string()))
    }

    pub fn from_artifact_bytes(bytes: &[u8]) -> std::result::Result<Self, ArtifactError> {
        use fory::Fory;

        let mut fory = Fory::default().compatible(true);
        fory.register::<ArtifactEnvelope>(1)
            .map_err(|e| ArtifactError::Decode(format!("cannot register envelope: {e}")))?;
        let envelope: ArtifactEnvelope = fory
            .deserialize(bytes)
            .map_err(|e| ArtifactError::Decode(e.to_string()))?;

        if envelope.version != ARTIFACT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(envelope.version));
        }
        if envelope.model_type != RANDOM_FOREST_KIND {
            return Err(ArtifactError::UnknownModelType(envelope.model_type));
        }

        let model: TrainedModel = rmp_serde::from_slice(&envelope.msgpack_payload)
            .map_err(|e| ArtifactError::Decode(e.to_string()))?;
        model.check_consistency()?;
        Ok(model)
    }

    /// Write the artifact next to `path` and rename it into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self
            .to_artifact_bytes()
            .map_err(|e| ModelError::persistence(path, e))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| ModelError::persistence(path, e))?;

        let mut file =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| ModelError::persistence(path, e))?;
        file.write_all(&bytes)
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| ModelError::persistence(path, e))?;
        file.persist(path)
            .map_err(|e| ModelError::persistence(path, e.error))?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "saved model artifact");
        Ok(())
    }

    /// `Ok(None)` when there is no artifact at `path`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ModelError::persistence(path, e)),
        };
        let model = Self::from_artifact_bytes(&bytes).map_err(|e| ModelError::persistence(path, e))?;
        tracing::info!(
            path = %path.display(),
            classes = model.encoder.len(),
            trained_at = %model.trained_at,
            "loaded model artifact"
        );
        Ok(Some(model))
    }
}

#[derive(ForyObject)]
struct ArtifactEnvelope {
    version: u8,
    model_type: String,
    msgpack_payload: Vec<u8>,
}
