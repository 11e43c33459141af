#[cfg(not(any(all(target_os = "macos", target_arch = "aarch64"), target_os = "ios")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use config::VegetationSource;
use crop_advisor_api::prediction_log::JsonlPredictionLog;
use crop_advisor_api::state::State;
use crop_advisor_api::vegetation::MockVegetationIndex;
use crop_advisor_api::{axum, construct_router};
use crop_advisor_ml::ModelManager;
use dotenv::dotenv;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Crop Advisor API");

    let config = config::Config::from_env()?;
    tracing::info!(
        "Loaded configuration: addr={}, model_path={}, data_dir={}",
        config.addr(),
        config.model.model_path.display(),
        config.model.data_dir.display()
    );

    let models = ModelManager::new(config.model.clone());
    match models.load() {
        Ok(true) => tracing::info!(info = ?models.model_info(), "Model loaded"),
        Ok(false) => tracing::warn!("No trained model found, train one via /api/v1/model/train"),
        Err(e) => tracing::error!(error = %e, "Failed to load model"),
    }

    let mut state = State::new(models);
    if let Some(path) = &config.prediction_log_path {
        tracing::info!(path = %path.display(), "Recording predictions");
        state = state.with_prediction_log(Arc::new(JsonlPredictionLog::new(path)));
    }
    if let Some(VegetationSource::Mock) = config.vegetation_source {
        tracing::info!("Using mock vegetation index source");
        state = state.with_vegetation_source(Arc::new(MockVegetationIndex));
    }

    let app = construct_router(Arc::new(state));

    let addr = config.addr();
    tracing::info!("API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
