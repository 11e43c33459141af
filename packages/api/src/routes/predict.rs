use crate::crop_info::{CropInfo, crop_info};
use crate::error::ApiError;
use crate::prediction_log::PredictionLogEntry;
use crate::state::AppState;
use crate::vegetation::Location;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::{
    Router,
    routing::{get, post},
};
use crop_advisor_ml::{FeatureVector, PredictionResult, RawRecord, ValidationError, sample_input};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Upper bound on records per batch request
pub const MAX_BATCH_SIZE: usize = 1000;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(predict))
        .route("/batch", post(predict_batch))
        .route("/sample", get(predict_sample))
}

/// Soil and weather measurements for one field
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "N": 90, "P": 42, "K": 43, "temperature": 20.87,
    "humidity": 82.0, "ph": 6.5, "rainfall": 202.93, "ndvi": 0.65
}))]
pub struct CropInput {
    /// Nitrogen content in soil, 0-200
    #[serde(rename = "N")]
    pub nitrogen: f64,
    /// Phosphorus content in soil, 0-200
    #[serde(rename = "P")]
    pub phosphorus: f64,
    /// Potassium content in soil, 0-300
    #[serde(rename = "K")]
    pub potassium: f64,
    /// Celsius, -50 to 60
    pub temperature: f64,
    /// Percent, 0-100
    pub humidity: f64,
    /// 0-14
    pub ph: f64,
    /// Millimetres, non-negative
    pub rainfall: f64,
    /// Vegetation index, -1 to 1
    pub ndvi: Option<f64>,
    /// Used to look up `ndvi` when it is not given
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CropPrediction {
    pub crop: String,
    pub confidence: f64,
    pub all_probabilities: BTreeMap<String, f64>,
    pub crop_info: CropInfo,
}

impl From<PredictionResult> for CropPrediction {
    fn from(result: PredictionResult) -> Self {
        Self {
            crop_info: crop_info(&result.label),
            crop: result.label,
            confidence: result.confidence,
            all_probabilities: result.probabilities,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SamplePrediction {
    #[schema(value_type = Object)]
    pub input: RawRecord,
    pub prediction: CropPrediction,
    pub message: String,
}

fn parse_request(body: &Value) -> Result<(FeatureVector, Option<Location>), ValidationError> {
    let record = RawRecord::from_json(body)?;
    let location = match body.get("location") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(
            serde_json::from_value::<Location>(raw.clone())
                .ok()
                .filter(Location::is_valid)
                .ok_or_else(|| {
                    ValidationError::single(
                        "location",
                        "Field location must hold a valid latitude and longitude",
                    )
                })?,
        ),
    };
    Ok((FeatureVector::validate(&record)?, location))
}

/// Fill a missing vegetation index from the configured source. Lookup
/// failures leave the vector untouched.
async fn enrich(state: &AppState, vector: FeatureVector, location: Option<Location>) -> FeatureVector {
    if vector.vegetation_index().is_some() {
        return vector;
    }
    let (Some(source), Some(location)) = (state.vegetation.as_ref(), location) else {
        return vector;
    };

    match source.vegetation_index(location).await {
        Ok(value) => vector.with_vegetation_index(value).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "vegetation source returned an out-of-range value");
            vector
        }),
        Err(e) => {
            tracing::warn!(error = %e, "vegetation index lookup failed");
            vector
        }
    }
}

fn log_prediction(state: &AppState, input: RawRecord, result: &PredictionResult) {
    let sink = state.prediction_log.clone();
    let entry = PredictionLogEntry::new(input, result.label.clone(), result.confidence);
    tokio::spawn(async move {
        if let Err(e) = sink.record(entry).await {
            tracing::warn!(error = %e, "failed to record prediction");
        }
    });
}

async fn serve(state: &AppState, records: Vec<RawRecord>) -> Result<Vec<CropPrediction>, ApiError> {
    let models = state.models.clone();
    let inputs = records.clone();
    let results = tokio::task::spawn_blocking(move || models.predict_batch(&inputs)).await??;

    Ok(records
        .into_iter()
        .zip(results)
        .map(|(input, result)| {
            tracing::info!(crop = %result.label, confidence = result.confidence, "prediction served");
            log_prediction(state, input, &result);
            CropPrediction::from(result)
        })
        .collect())
}

async fn predict_one(state: &AppState, vector: FeatureVector) -> Result<CropPrediction, ApiError> {
    serve(state, vec![vector.to_record()])
        .await?
        .pop()
        .ok_or_else(|| ApiError::internal("classifier returned no prediction"))
}

#[utoipa::path(
    post,
    path = "/predict",
    tag = "prediction",
    request_body = CropInput,
    responses(
        (status = 200, description = "Recommended crop", body = CropPrediction),
        (status = 400, description = "Invalid input"),
        (status = 503, description = "No trained model")
    )
)]
#[tracing::instrument(name = "POST /predict", skip(state, body))]
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CropPrediction>, ApiError> {
    let Json(body) = body?;
    let (vector, location) = parse_request(&body)?;
    let vector = enrich(&state, vector, location).await;
    Ok(Json(predict_one(&state, vector).await?))
}

#[utoipa::path(
    post,
    path = "/predict/batch",
    tag = "prediction",
    request_body = Vec<CropInput>,
    responses(
        (status = 200, description = "One recommendation per input, in order", body = Vec<CropPrediction>),
        (status = 400, description = "Invalid input"),
        (status = 503, description = "No trained model")
    )
)]
#[tracing::instrument(name = "POST /predict/batch", skip(state, body))]
pub async fn predict_batch(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Vec<CropPrediction>>, ApiError> {
    let Json(body) = body?;
    let items = body
        .as_array()
        .ok_or_else(|| ApiError::bad_request("Expected a JSON array of records"))?;
    if items.len() > MAX_BATCH_SIZE {
        return Err(ApiError::bad_request(format!(
            "Batch holds {} records, at most {} are allowed",
            items.len(),
            MAX_BATCH_SIZE
        )));
    }

    let mut errors = ValidationError::default();
    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match parse_request(item) {
            Ok(ok) => parsed.push(ok),
            Err(invalid) => {
                for e in invalid.errors {
                    errors.push(format!("{index}.{}", e.field), e.message);
                }
            }
        }
    }
    errors.into_result()?;

    let mut records = Vec::with_capacity(parsed.len());
    for (vector, location) in parsed {
        records.push(enrich(&state, vector, location).await.to_record());
    }
    Ok(Json(serve(&state, records).await?))
}

#[utoipa::path(
    get,
    path = "/predict/sample",
    tag = "prediction",
    responses(
        (status = 200, description = "Prediction for a canonical input", body = SamplePrediction),
        (status = 503, description = "No trained model")
    )
)]
#[tracing::instrument(name = "GET /predict/sample", skip(state))]
pub async fn predict_sample(
    State(state): State<AppState>,
) -> Result<Json<SamplePrediction>, ApiError> {
    let input = sample_input();
    let vector = FeatureVector::validate(&input)?;
    let prediction = predict_one(&state, vector).await?;
    Ok(Json(SamplePrediction {
        input,
        prediction,
        message: "Sample prediction for testing purposes".to_string(),
    }))
}
