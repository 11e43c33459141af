//! Model lifecycle: train, persist, load and predict over one shared slot

use crate::dataset::{self, DataSources, stratified_folds, stratified_split};
use crate::error::{ModelError, Result};
use crate::forest::{ForestParams, RandomForest};
use crate::metrics::{ClassMetrics, accuracy, classification_report, mean_std};
use crate::model::{Classifier, LabelEncoder, ModelInfo, PredictionResult, TrainedModel};
use crate::schema::RawRecord;
use chrono::{DateTime, Utc};
use ndarray::{Array2, Axis};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CV_FOLDS: usize = 5;
pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const DEFAULT_RANDOM_SEED: u64 = 42;

const DEFAULT_MODEL_PATH: &str = "models/model.flmodel";
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    /// Directory holding the CSV training sources
    pub data_dir: PathBuf,
    pub forest: ForestParams,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_PATH, DEFAULT_DATA_DIR)
    }
}

impl ModelConfig {
    pub fn new(model_path: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            data_dir: data_dir.into(),
            forest: ForestParams::default(),
        }
    }

    /// `MODEL_PATH` and `DATA_PATH`, falling back to the defaults.
    pub fn from_env() -> Self {
        let model_path = std::env::var("MODEL_PATH").unwrap_or_else(|_| DEFAULT_MODEL_PATH.into());
        let data_dir = std::env::var("DATA_PATH").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
        Self::new(model_path, data_dir)
    }

    pub fn with_forest(mut self, forest: ForestParams) -> Self {
        self.forest = forest;
        self
    }

    /// Sources present in the data directory right now
    pub fn sources(&self) -> DataSources {
        DataSources::from_dir(&self.data_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Evaluation of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub cv_mean: f64,
    pub cv_std: f64,
    pub cv_scores: Vec<f64>,
    /// Sorted by importance, highest first
    pub feature_importance: Vec<FeatureImportance>,
    pub n_train: usize,
    pub n_test: usize,
    pub classes: Vec<String>,
    pub classification_report: Vec<ClassMetrics>,
    pub trained_at: DateTime<Utc>,
}

/// Owns the process-wide model slot.
///
/// Readers clone the current `Arc` and predict without holding the lock.
/// Training is serialized by its own guard and publishes the new model in
/// one swap after it has been persisted.
pub struct ModelManager {
    config: ModelConfig,
    slot: RwLock<Option<Arc<TrainedModel>>>,
    training: Mutex<()>,
}

impl ModelManager {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            slot: RwLock::new(None),
            training: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn model_path(&self) -> &Path {
        &self.config.model_path
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }

    fn resident(&self) -> Option<Arc<TrainedModel>> {
        self.slot.read().clone()
    }

    fn publish(&self, model: Arc<TrainedModel>) {
        *self.slot.write() = Some(model);
    }

    /// Keep the resident model if there is one, otherwise install `model`.
    /// Returns whichever model ends up resident.
    fn fill(&self, model: Arc<TrainedModel>) -> Arc<TrainedModel> {
        let mut slot = self.slot.write();
        match slot.as_ref() {
            Some(resident) => resident.clone(),
            None => {
                *slot = Some(model.clone());
                model
            }
        }
    }

    /// Read the artifact and make it the resident model, replacing any
    /// model already in the slot. `Ok(false)` when there is none.
    pub fn load(&self) -> Result<bool> {
        match TrainedModel::load(self.model_path())? {
            Some(model) => {
                self.publish(Arc::new(model));
                Ok(true)
            }
            None => {
                tracing::debug!(path = %self.model_path().display(), "no model artifact to load");
                Ok(false)
            }
        }
    }

    /// Read the artifact into an empty slot. A model published while the
    /// read was in flight wins over the artifact.
    fn load_if_empty(&self) -> Result<Option<Arc<TrainedModel>>> {
        if let Some(model) = self.resident() {
            return Ok(Some(model));
        }
        match TrainedModel::load(self.model_path())? {
            Some(model) => Ok(Some(self.fill(Arc::new(model)))),
            None => {
                tracing::debug!(path = %self.model_path().display(), "no model artifact to load");
                Ok(self.resident())
            }
        }
    }

    /// Load from disk unless a model is already resident.
    pub fn ensure_loaded(&self) -> Result<bool> {
        Ok(self.load_if_empty()?.is_some())
    }

    /// The resident model, loaded lazily from disk.
    pub fn current(&self) -> Result<Arc<TrainedModel>> {
        self.load_if_empty()?.ok_or_else(|| ModelError::ModelUnavailable {
            path: self.config.model_path.clone(),
        })
    }

    /// Persist the resident model.
    pub fn save(&self) -> Result<()> {
        let model = self.resident().ok_or_else(|| ModelError::ModelUnavailable {
            path: self.config.model_path.clone(),
        })?;
        model.save(self.model_path())
    }

    pub fn predict(&self, record: &RawRecord) -> Result<PredictionResult> {
        self.current()?
            .predict(std::slice::from_ref(record))?
            .pop()
            .ok_or_else(|| ModelError::Classifier("classifier returned no prediction".to_string()))
    }

    pub fn predict_batch(&self, records: &[RawRecord]) -> Result<Vec<PredictionResult>> {
        self.current()?.predict(records)
    }

    /// Metadata of the resident model, if any.
    pub fn model_info(&self) -> Option<ModelInfo> {
        self.resident().map(|model| model.info())
    }

    /// Prepare data, fit, evaluate, persist and publish a new model.
    ///
    /// Fails fast with [`ModelError::TrainingInProgress`] while another run
    /// holds the training guard.
    pub fn train(&self, test_size: f64, seed: u64) -> Result<TrainingReport> {
        let _guard = self
            .training
            .try_lock()
            .ok_or(ModelError::TrainingInProgress)?;

        tracing::info!(test_size, seed, data_dir = %self.config.data_dir.display(), "training started");

        let data = dataset::prepare(&self.config.sources(), seed)?;
        if data.len() < CV_FOLDS {
            return Err(ModelError::TrainingData(format!(
                "{} usable rows, at least {CV_FOLDS} are needed for training",
                data.len()
            )));
        }
        let encoder = LabelEncoder::fit(data.labels())?;
        let targets = encoder.transform(data.labels())?;
        let records = data.records();

        let split = stratified_split(&targets, test_size, seed)?;
        let (x_train, y_train) = select_rows(records, &targets, &split.train);
        let (x_test, y_test) = select_rows(records, &targets, &split.test);

        let forest = RandomForest::fit(
            x_train.view(),
            &y_train,
            encoder.len(),
            &self.config.forest,
            seed,
        )?;

        let train_accuracy = accuracy(&y_train, &forest.predict(x_train.view())?);
        let test_predictions = forest.predict(x_test.view())?;
        let test_accuracy = accuracy(&y_test, &test_predictions);
        tracing::info!(train_accuracy, test_accuracy, "holdout evaluation");

        let cv_scores = self.cross_validate(records, &targets, encoder.len(), seed)?;
        let (cv_mean, cv_std) = mean_std(&cv_scores);
        tracing::info!(?cv_scores, cv_mean, cv_std, "cross-validation");

        let classification_report =
            classification_report(&y_test, &test_predictions, encoder.classes());

        let mut feature_importance: Vec<FeatureImportance> = data
            .columns()
            .iter()
            .zip(forest.feature_importance())
            .map(|(feature, importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();
        feature_importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        let model = TrainedModel::new(
            Classifier::RandomForest(forest),
            encoder,
            data.columns().to_vec(),
        );
        model.save(self.model_path())?;

        let report = TrainingReport {
            train_accuracy,
            test_accuracy,
            cv_mean,
            cv_std,
            cv_scores,
            feature_importance,
            n_train: split.train.len(),
            n_test: split.test.len(),
            classes: model.encoder().classes().to_vec(),
            classification_report,
            trained_at: model.trained_at(),
        };

        self.publish(Arc::new(model));
        tracing::info!(
            path = %self.model_path().display(),
            classes = report.classes.len(),
            "training finished"
        );
        Ok(report)
    }

    fn cross_validate(
        &self,
        records: &Array2<f64>,
        targets: &[usize],
        n_classes: usize,
        seed: u64,
    ) -> Result<Vec<f64>> {
        stratified_folds(targets, CV_FOLDS)?
            .into_iter()
            .map(|fold| {
                let (x_train, y_train) = select_rows(records, targets, &fold.train);
                let (x_val, y_val) = select_rows(records, targets, &fold.validation);
                let forest = RandomForest::fit(
                    x_train.view(),
                    &y_train,
                    n_classes,
                    &self.config.forest,
                    seed,
                )?;
                Ok(accuracy(&y_val, &forest.predict(x_val.view())?))
            })
            .collect()
    }
}

fn select_rows(records: &Array2<f64>, targets: &[usize], rows: &[usize]) -> (Array2<f64>, Vec<usize>) {
    (
        records.select(Axis(0), rows),
        rows.iter().map(|r| targets[*r]).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Feature;

    fn manager(dir: &Path) -> ModelManager {
        ModelManager::new(
            ModelConfig::new(dir.join("model.flmodel"), dir.join("data"))
                .with_forest(ForestParams::default().with_trees(5)),
        )
    }

    fn model(crops: &[&str]) -> Arc<TrainedModel> {
        let labels: Vec<String> = (0..12).map(|i| crops[i % crops.len()].to_string()).collect();
        let encoder = LabelEncoder::fit(&labels).unwrap();
        let targets = encoder.transform(&labels).unwrap();
        let records = Array2::from_shape_fn((12, 7), |(r, c)| (r * 7 + c) as f64);
        let forest = RandomForest::fit(
            records.view(),
            &targets,
            encoder.len(),
            &ForestParams::default().with_trees(3),
            1,
        )
        .unwrap();
        let columns = Feature::REQUIRED.iter().map(|f| f.column().to_string()).collect();
        Arc::new(TrainedModel::new(Classifier::RandomForest(forest), encoder, columns))
    }

    #[test]
    fn test_fill_installs_into_empty_slot() {
        let dir = tempfile::TempDir::new().unwrap();
        let manager = manager(dir.path());

        let installed = manager.fill(model(&["rice", "wheat"]));
        assert_eq!(installed.encoder().len(), 2);
        assert_eq!(manager.model_info().unwrap().n_classes, 2);
    }

    #[test]
    fn test_fill_keeps_published_model() {
        let dir = tempfile::TempDir::new().unwrap();
        let manager = manager(dir.path());
        manager.publish(model(&["rice", "wheat", "corn"]));

        let resident = manager.fill(model(&["rice", "wheat"]));
        assert_eq!(resident.encoder().len(), 3);
        assert_eq!(manager.model_info().unwrap().n_classes, 3);
    }

    #[test]
    fn test_lazy_load_does_not_replace_resident_model() {
        let dir = tempfile::TempDir::new().unwrap();
        let manager = manager(dir.path());
        model(&["rice", "wheat"]).save(manager.model_path()).unwrap();
        manager.publish(model(&["rice", "wheat", "corn"]));

        assert!(manager.ensure_loaded().unwrap());
        assert_eq!(manager.current().unwrap().encoder().len(), 3);

        assert!(manager.load().unwrap());
        assert_eq!(manager.current().unwrap().encoder().len(), 2);
    }

    #[test]
    fn test_train_fails_fast_while_guard_is_held() {
        let dir = tempfile::TempDir::new().unwrap();
        let manager = manager(dir.path());

        let held = manager.training.lock();
        let err = manager.train(DEFAULT_TEST_SIZE, DEFAULT_RANDOM_SEED).unwrap_err();
        assert!(matches!(err, ModelError::TrainingInProgress));
        assert!(err.is_recoverable());
        drop(held);

        assert!(!manager.is_loaded());
        assert!(!manager.model_path().exists());
    }
}
