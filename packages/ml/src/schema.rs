//! Feature schema shared by training and inference
//!
//! Fixes the column order consumed by the classifier, the declared range of
//! every column and the defaults substituted for columns an inference record
//! does not carry.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Name of the target column in tabular sources
pub const LABEL_COLUMN: &str = "label";

/// Neutral vegetation index used when the satellite lookup did not happen
pub const VEGETATION_INDEX_DEFAULT: f64 = 0.5;

/// Default for every other absent numeric feature
pub const MISSING_FEATURE_DEFAULT: f64 = 0.0;

/// One input column of the classifier, in schema order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    Nitrogen,
    Phosphorus,
    Potassium,
    Temperature,
    Humidity,
    Ph,
    Rainfall,
    VegetationIndex,
}

impl Feature {
    pub const REQUIRED: [Feature; 7] = [
        Feature::Nitrogen,
        Feature::Phosphorus,
        Feature::Potassium,
        Feature::Temperature,
        Feature::Humidity,
        Feature::Ph,
        Feature::Rainfall,
    ];

    pub const ALL: [Feature; 8] = [
        Feature::Nitrogen,
        Feature::Phosphorus,
        Feature::Potassium,
        Feature::Temperature,
        Feature::Humidity,
        Feature::Ph,
        Feature::Rainfall,
        Feature::VegetationIndex,
    ];

    /// Position in [`Feature::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn column(self) -> &'static str {
        match self {
            Feature::Nitrogen => "N",
            Feature::Phosphorus => "P",
            Feature::Potassium => "K",
            Feature::Temperature => "temperature",
            Feature::Humidity => "humidity",
            Feature::Ph => "ph",
            Feature::Rainfall => "rainfall",
            Feature::VegetationIndex => "ndvi",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == name)
    }

    pub fn is_required(self) -> bool {
        !matches!(self, Feature::VegetationIndex)
    }

    /// Closed interval of accepted values
    pub fn range(self) -> (f64, f64) {
        match self {
            Feature::Nitrogen => (0.0, 200.0),
            Feature::Phosphorus => (0.0, 200.0),
            Feature::Potassium => (0.0, 300.0),
            Feature::Temperature => (-50.0, 60.0),
            Feature::Humidity => (0.0, 100.0),
            Feature::Ph => (0.0, 14.0),
            Feature::Rainfall => (0.0, f64::INFINITY),
            Feature::VegetationIndex => (-1.0, 1.0),
        }
    }

    pub fn contains(self, value: f64) -> bool {
        let (low, high) = self.range();
        !value.is_nan() && !value.is_infinite() && value >= low && value <= high
    }

    pub fn default_value(self) -> f64 {
        match self {
            Feature::VegetationIndex => VEGETATION_INDEX_DEFAULT,
            _ => MISSING_FEATURE_DEFAULT,
        }
    }

    fn range_message(self) -> String {
        match self {
            Feature::Nitrogen => "Nitrogen (N) should be between 0-200".to_string(),
            Feature::Phosphorus => "Phosphorus (P) should be between 0-200".to_string(),
            Feature::Potassium => "Potassium (K) should be between 0-300".to_string(),
            Feature::Temperature => "Temperature should be between -50°C to 60°C".to_string(),
            Feature::Humidity => "Humidity should be between 0-100%".to_string(),
            Feature::Ph => "pH should be between 0-14".to_string(),
            Feature::Rainfall => "Rainfall should be non-negative".to_string(),
            Feature::VegetationIndex => "NDVI should be between -1 and 1".to_string(),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Value substituted for `column` when an inference record lacks it.
/// Columns outside the schema fall back to [`MISSING_FEATURE_DEFAULT`].
pub fn default_for_column(column: &str) -> f64 {
    Feature::from_column(column)
        .map(Feature::default_value)
        .unwrap_or(MISSING_FEATURE_DEFAULT)
}

/// Canonical input used for smoke predictions
pub fn sample_input() -> RawRecord {
    RawRecord::new()
        .with("N", 90.0)
        .with("P", 42.0)
        .with("K", 43.0)
        .with("temperature", 20.87)
        .with("humidity", 82.0)
        .with("ph", 6.5)
        .with("rainfall", 202.93)
        .with("ndvi", 0.65)
}

/// Untyped record: column name to value, any subset of columns present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(HashMap<String, f64>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: f64) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: f64) {
        self.0.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.0.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read the schema columns out of a JSON object.
    ///
    /// `null` counts as absent, unknown keys are ignored and any other
    /// non-numeric value is reported against its field.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ValidationError::single("body", "Expected a JSON object"))?;

        let mut record = RawRecord::new();
        let mut errors = ValidationError::default();
        for feature in Feature::ALL {
            match object.get(feature.column()) {
                None | Some(Value::Null) => {}
                Some(Value::Number(n)) => match n.as_f64() {
                    Some(v) => record.insert(feature.column(), v),
                    None => errors.push(
                        feature.column(),
                        format!("Field {} must be a number", feature.column()),
                    ),
                },
                Some(_) => errors.push(
                    feature.column(),
                    format!("Field {} must be a number", feature.column()),
                ),
            }
        }
        errors.into_result()?;
        Ok(record)
    }

    /// Values in `columns` order, defaults filled in for absent columns
    pub fn align(&self, columns: &[String]) -> Vec<f64> {
        columns
            .iter()
            .map(|c| self.get(c).unwrap_or_else(|| default_for_column(c)))
            .collect()
    }

    pub fn missing_columns<'a>(&self, columns: &'a [String]) -> Vec<&'a str> {
        columns
            .iter()
            .filter(|c| !self.contains(c))
            .map(String::as_str)
            .collect()
    }
}

impl FromIterator<(String, f64)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        RawRecord(iter.into_iter().collect())
    }
}

/// Validated measurements in schema order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; 7],
    vegetation_index: Option<f64>,
}

impl FeatureVector {
    /// Strict constructor: every required field present and every present
    /// field inside its declared range. All offending fields are reported.
    pub fn validate(record: &RawRecord) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::default();
        let mut values = [0.0; 7];

        for feature in Feature::REQUIRED {
            match record.get(feature.column()) {
                None => errors.push(
                    feature.column(),
                    format!("Missing required field: {}", feature.column()),
                ),
                Some(v) if !feature.contains(v) => {
                    errors.push(feature.column(), feature.range_message())
                }
                Some(v) => values[feature.index()] = v,
            }
        }

        let vegetation_index = record.get(Feature::VegetationIndex.column());
        if let Some(v) = vegetation_index {
            if !Feature::VegetationIndex.contains(v) {
                errors.push(
                    Feature::VegetationIndex.column(),
                    Feature::VegetationIndex.range_message(),
                );
            }
        }

        errors.into_result()?;
        Ok(Self {
            values,
            vegetation_index,
        })
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::VegetationIndex => self.vegetation_index,
            other => Some(self.values[other.index()]),
        }
    }

    pub fn vegetation_index(&self) -> Option<f64> {
        self.vegetation_index
    }

    /// Fill the optional column after the fact (satellite enrichment).
    pub fn with_vegetation_index(mut self, value: f64) -> Result<Self, ValidationError> {
        if !Feature::VegetationIndex.contains(value) {
            return Err(ValidationError::single(
                Feature::VegetationIndex.column(),
                Feature::VegetationIndex.range_message(),
            ));
        }
        self.vegetation_index = Some(value);
        Ok(self)
    }

    /// All eight columns, the optional one defaulted when absent
    pub fn to_row(&self) -> [f64; 8] {
        let mut row = [0.0; 8];
        row[..7].copy_from_slice(&self.values);
        row[7] = self
            .vegetation_index
            .unwrap_or(Feature::VegetationIndex.default_value());
        row
    }

    /// Back to an untyped record; an absent vegetation index stays absent.
    pub fn to_record(&self) -> RawRecord {
        Feature::ALL
            .into_iter()
            .filter_map(|f| self.get(f).map(|v| (f.column().to_string(), v)))
            .collect()
    }
}
