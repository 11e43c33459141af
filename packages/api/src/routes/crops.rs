use crate::crop_info::{CropInfo, crop_info};
use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::{Router, routing::get};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(supported_crops))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CropEntry {
    pub name: String,
    pub info: CropInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CropsResponse {
    pub crops: Vec<CropEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[utoipa::path(
    get,
    path = "/crops",
    tag = "crops",
    responses(
        (status = 200, description = "Crops the current model can recommend", body = CropsResponse)
    )
)]
#[tracing::instrument(name = "GET /crops", skip(state))]
pub async fn supported_crops(State(state): State<AppState>) -> Result<Json<CropsResponse>, ApiError> {
    let models = state.models.clone();
    let loaded = tokio::task::spawn_blocking(move || models.ensure_loaded()).await??;

    let Some(info) = loaded.then(|| state.models.model_info()).flatten() else {
        return Ok(Json(CropsResponse {
            crops: Vec::new(),
            total: None,
            message: Some("Model not available. Please train the model first.".to_string()),
        }));
    };

    let crops: Vec<CropEntry> = info
        .classes
        .into_iter()
        .map(|name| CropEntry {
            info: crop_info(&name),
            name,
        })
        .collect();
    Ok(Json(CropsResponse {
        total: Some(crops.len()),
        crops,
        message: None,
    }))
}
