use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::{
    Router,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use crop_advisor_ml::{DEFAULT_RANDOM_SEED, DEFAULT_TEST_SIZE, ModelInfo, TrainingReport};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/info", get(model_info))
        .route("/train", post(train))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelInfoResponse {
    pub model_type: String,
    pub n_features: usize,
    pub feature_columns: Vec<String>,
    pub n_classes: usize,
    pub classes: Vec<String>,
    pub last_trained: DateTime<Utc>,
}

impl From<ModelInfo> for ModelInfoResponse {
    fn from(info: ModelInfo) -> Self {
        Self {
            model_type: info.model_type,
            n_features: info.n_features,
            feature_columns: info.feature_columns,
            n_classes: info.n_classes,
            classes: info.classes,
            last_trained: info.last_trained,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TrainRequest {
    /// Holdout fraction, defaults to 0.2
    pub test_size: Option<f64>,
    /// Seed for splitting and fitting, defaults to 42
    pub random_state: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrainResponse {
    pub message: String,
    #[schema(value_type = Object)]
    pub results: TrainingReport,
    pub timestamp: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/model/info",
    tag = "model",
    responses(
        (status = 200, description = "Metadata of the current model", body = ModelInfoResponse),
        (status = 404, description = "No trained model")
    )
)]
#[tracing::instrument(name = "GET /model/info", skip(state))]
pub async fn model_info(State(state): State<AppState>) -> Result<Json<ModelInfoResponse>, ApiError> {
    let models = state.models.clone();
    let loaded = tokio::task::spawn_blocking(move || models.ensure_loaded()).await??;
    if !loaded {
        return Err(ApiError::not_found(
            "Model not found. Please train the model first.",
        ));
    }

    state
        .models
        .model_info()
        .map(|info| Json(info.into()))
        .ok_or_else(|| ApiError::not_found("Model not available"))
}

#[utoipa::path(
    post,
    path = "/model/train",
    tag = "model",
    request_body(content = TrainRequest, description = "Optional training parameters"),
    responses(
        (status = 200, description = "Training report", body = TrainResponse),
        (status = 409, description = "Another training run is in progress"),
        (status = 422, description = "Training data unusable")
    )
)]
#[tracing::instrument(name = "POST /model/train", skip(state, body))]
pub async fn train(State(state): State<AppState>, body: Bytes) -> Result<Json<TrainResponse>, ApiError> {
    let request: TrainRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TrainRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let test_size = request.test_size.unwrap_or(DEFAULT_TEST_SIZE);
    let seed = request.random_state.unwrap_or(DEFAULT_RANDOM_SEED);

    tracing::info!(test_size, seed, "training requested");
    let models = state.models.clone();
    let results = tokio::task::spawn_blocking(move || models.train(test_size, seed)).await??;

    Ok(Json(TrainResponse {
        message: "Model trained successfully".to_string(),
        results,
        timestamp: Utc::now(),
    }))
}
