//! CSV sources

use super::{Row, Table};
use crate::error::{ModelError, Result};
use crate::schema::{Feature, LABEL_COLUMN};
use std::io;
use std::path::Path;

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    reader_builder().from_path(path).map_err(|e| {
        ModelError::TrainingData(format!("cannot read {}: {e}", path.display()))
    })
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.flexible(true).trim(csv::Trim::All);
    builder
}

/// Empty, unparsable and NaN cells are missing values.
fn parse_cell(cell: Option<&str>) -> Option<f64> {
    cell.filter(|c| !c.is_empty())
        .and_then(|c| c.parse::<f64>().ok())
        .filter(|v| !v.is_nan())
}

/// Load a labelled training table from `path`.
pub fn read_table(path: &Path) -> Result<Table> {
    let reader = open(path)?;
    let table = read_table_from(reader, &path.display().to_string())?;
    tracing::info!(path = %path.display(), rows = table.len(), "loaded training table");
    Ok(table)
}

/// Load a labelled training table from any CSV reader. `source` names it in errors.
pub fn read_table_from<R: io::Read>(mut reader: csv::Reader<R>, source: &str) -> Result<Table> {
    let headers = reader
        .headers()
        .map_err(|e| ModelError::TrainingData(format!("{source}: invalid header: {e}")))?
        .clone();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let mut indices = [None; 8];
    for feature in Feature::REQUIRED {
        let index = position(feature.column()).ok_or_else(|| {
            ModelError::TrainingData(format!(
                "{source}: missing required column `{}`",
                feature.column()
            ))
        })?;
        indices[feature.index()] = Some(index);
    }
    indices[Feature::VegetationIndex.index()] = position(Feature::VegetationIndex.column());
    let label_index = position(LABEL_COLUMN).ok_or_else(|| {
        ModelError::TrainingData(format!("{source}: missing required column `{LABEL_COLUMN}`"))
    })?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            ModelError::TrainingData(format!("{source}: malformed record {}: {e}", line + 1))
        })?;
        let values = indices.map(|index| index.and_then(|i| parse_cell(record.get(i))));
        let label = record
            .get(label_index)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        rows.push(Row::new(values, label));
    }

    Ok(Table::new(
        indices[Feature::VegetationIndex.index()].is_some(),
        rows,
    ))
}

/// Read the `ndvi` column of a vegetation-index source, in file order.
/// Unparsable cells are skipped; a source without the column yields nothing.
pub fn read_vegetation_index(path: &Path) -> Result<Vec<f64>> {
    let mut reader = open(path)?;
    let headers = reader
        .headers()
        .map_err(|e| {
            ModelError::TrainingData(format!("{}: invalid header: {e}", path.display()))
        })?
        .clone();

    let Some(index) = headers
        .iter()
        .position(|h| h == Feature::VegetationIndex.column())
    else {
        tracing::warn!(path = %path.display(), "vegetation source has no ndvi column");
        return Ok(Vec::new());
    };

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            ModelError::TrainingData(format!("{}: malformed record: {e}", path.display()))
        })?;
        if let Some(v) = parse_cell(record.get(index)) {
            values.push(v);
        }
    }
    tracing::info!(path = %path.display(), values = values.len(), "loaded vegetation index");
    Ok(values)
}

/// Reader over an in-memory CSV document, configured like file sources.
pub fn reader_from_str(data: &str) -> csv::Reader<&[u8]> {
    reader_builder().from_reader(data.as_bytes())
}
