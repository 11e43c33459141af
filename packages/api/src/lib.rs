use axum::{Json, Router, routing::get};
use state::AppState;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

mod routes;

pub mod crop_info;
pub mod error;
pub mod openapi;
pub mod prediction_log;
pub mod state;
pub mod vegetation;

pub use axum;

pub fn construct_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/predict", routes::predict::routes())
        .nest("/model", routes::model::routes())
        .nest("/crops", routes::crops::routes());

    Router::new()
        .route("/", get(routes::health::health))
        .nest("/health", routes::health::routes())
        .nest("/api/health", routes::health::routes())
        .nest("/api/v1", api)
        .route("/api-docs/openapi.json", get(openapi_json))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDoc::openapi())
}
