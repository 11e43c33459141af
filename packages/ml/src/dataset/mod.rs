//! Data preparation: raw tables in, one clean training dataset out

pub mod kfold;
pub mod loader;
pub mod sample;
pub mod stratified;

use crate::error::{ModelError, Result};
use crate::schema::Feature;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use kfold::{Fold, stratified_folds};
pub use stratified::{Split, stratified_split};

pub const BASE_FILE: &str = "Crop_recommendation.csv";
pub const REGIONAL_FILE: &str = "indian_crops.csv";
pub const VEGETATION_FILE: &str = "sentinel_ndvi.csv";

/// Synthesized vegetation values are drawn from this half-open interval
const SYNTHETIC_VEGETATION_RANGE: (f64, f64) = (0.1, 0.9);

/// One raw row: a slot per schema column plus the label, any of them missing
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: [Option<f64>; 8],
    pub label: Option<String>,
}

impl Row {
    pub fn new(values: [Option<f64>; 8], label: Option<String>) -> Self {
        Self { values, label }
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values[feature.index()]
    }

    fn key(&self) -> ([Option<u64>; 8], Option<String>) {
        (self.values.map(|v| v.map(f64::to_bits)), self.label.clone())
    }
}

/// Rows of one or more sources sharing a column set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub has_vegetation_index: bool,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(has_vegetation_index: bool, rows: Vec<Row>) -> Self {
        Self {
            has_vegetation_index,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn columns(&self) -> Vec<Feature> {
        if self.has_vegetation_index {
            Feature::ALL.to_vec()
        } else {
            Feature::REQUIRED.to_vec()
        }
    }

    /// Concatenate tables. The vegetation column survives only if every
    /// input carries it.
    pub fn union(tables: Vec<Table>) -> Table {
        let has_vegetation_index =
            !tables.is_empty() && tables.iter().all(|t| t.has_vegetation_index);
        let mut rows: Vec<Row> = tables.into_iter().flat_map(|t| t.rows).collect();
        if !has_vegetation_index {
            for row in &mut rows {
                row.values[Feature::VegetationIndex.index()] = None;
            }
        }
        Table {
            has_vegetation_index,
            rows,
        }
    }

    /// Deduplicate, drop rows with missing cells, then drop rows whose pH,
    /// temperature or humidity fall outside their declared ranges.
    pub fn clean(&mut self) {
        let before = self.rows.len();

        let mut seen = HashSet::new();
        let mut deduped = Vec::with_capacity(self.rows.len());
        for row in self.rows.drain(..) {
            if seen.insert(row.key()) {
                deduped.push(row);
            }
        }
        let duplicates = before - deduped.len();
        tracing::info!(removed = duplicates, "removed duplicate rows");

        let columns = self.columns();
        let after_dedup = deduped.len();
        deduped.retain(|row| {
            row.label.as_deref().is_some_and(|l| !l.is_empty())
                && columns.iter().all(|c| row.get(*c).is_some())
        });
        let missing = after_dedup - deduped.len();
        if missing > 0 {
            tracing::info!(removed = missing, "dropped rows with missing values");
        }

        let after_missing = deduped.len();
        deduped.retain(|row| {
            [Feature::Ph, Feature::Temperature, Feature::Humidity]
                .into_iter()
                .all(|f| row.get(f).is_some_and(|v| f.contains(v)))
        });
        let out_of_range = after_missing - deduped.len();
        if out_of_range > 0 {
            tracing::info!(removed = out_of_range, "dropped rows outside declared ranges");
        }

        self.rows = deduped;
        tracing::info!(before, after = self.rows.len(), "cleaned training table");
    }

    /// Attach vegetation values by position. Rows past the end of `values`
    /// (or whose value is out of range) get a synthesized one.
    pub fn attach_vegetation_index(&mut self, values: &[f64], seed: u64) {
        if self.has_vegetation_index {
            tracing::info!("dataset already carries ndvi, ignoring vegetation source");
            return;
        }

        let usable: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| Feature::VegetationIndex.contains(*v))
            .collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let (low, high) = SYNTHETIC_VEGETATION_RANGE;
        let mut synthesized = 0usize;

        for (i, row) in self.rows.iter_mut().enumerate() {
            let value = match usable.get(i) {
                Some(v) => *v,
                None => {
                    synthesized += 1;
                    rng.random_range(low..high)
                }
            };
            row.values[Feature::VegetationIndex.index()] = Some(value);
        }
        self.has_vegetation_index = true;

        tracing::info!(
            attached = self.rows.len() - synthesized,
            synthesized,
            "attached vegetation index"
        );
    }

    /// Materialize as a feature matrix and label vector.
    pub fn into_dataset(self) -> Result<TrainingDataset> {
        let columns = self.columns();
        let mut flat = Vec::with_capacity(self.rows.len() * columns.len());
        let mut labels = Vec::with_capacity(self.rows.len());

        for row in self.rows {
            for column in &columns {
                let value = row.get(*column).ok_or_else(|| {
                    ModelError::TrainingData(format!("row is missing column `{column}`"))
                })?;
                flat.push(value);
            }
            labels.push(row.label.unwrap_or_default());
        }

        let records = Array2::from_shape_vec((labels.len(), columns.len()), flat)?;
        Ok(TrainingDataset {
            columns: columns.iter().map(|c| c.column().to_string()).collect(),
            records,
            labels,
        })
    }
}

/// Clean feature matrix in schema order plus one label per row
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    columns: Vec<String>,
    records: Array2<f64>,
    labels: Vec<String>,
}

impl TrainingDataset {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &Array2<f64> {
        &self.records
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }
}

/// Where the training tables come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSources {
    /// Synthesized when the file does not exist
    pub base: PathBuf,
    pub regional: Option<PathBuf>,
    pub vegetation: Option<PathBuf>,
}

impl DataSources {
    /// Conventional file names inside `dir`; optional sources are only
    /// picked up when present.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let existing = |name: &str| Some(dir.join(name)).filter(|p| p.is_file());
        Self {
            base: dir.join(BASE_FILE),
            regional: existing(REGIONAL_FILE),
            vegetation: existing(VEGETATION_FILE),
        }
    }
}

/// Run the whole preparation pipeline.
pub fn prepare(sources: &DataSources, seed: u64) -> Result<TrainingDataset> {
    let base = if sources.base.is_file() {
        loader::read_table(&sources.base)?
    } else {
        tracing::warn!(
            path = %sources.base.display(),
            "base dataset not found, synthesizing sample data"
        );
        sample::synthesize(sample::SAMPLE_ROWS, sample::SAMPLE_SEED)
    };

    let mut tables = vec![base];
    if let Some(regional) = &sources.regional {
        tables.push(loader::read_table(regional)?);
    }

    let mut table = Table::union(tables);
    table.clean();

    if let Some(vegetation) = &sources.vegetation {
        let values = loader::read_vegetation_index(vegetation)?;
        table.attach_vegetation_index(&values, seed);
    }

    if table.is_empty() {
        return Err(ModelError::TrainingData(
            "no usable rows left after cleaning".to_string(),
        ));
    }

    let dataset = table.into_dataset()?;
    tracing::info!(
        rows = dataset.len(),
        features = dataset.n_features(),
        "prepared training dataset"
    );
    Ok(dataset)
}
