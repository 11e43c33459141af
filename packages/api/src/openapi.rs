use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Crop Advisor API",
        version = "1.0.0",
        description = "Crop recommendations from soil and weather measurements, optionally enriched with a satellite vegetation index.",
        license(name = "MIT")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "prediction", description = "Crop recommendations"),
        (name = "model", description = "Model metadata and training"),
        (name = "crops", description = "Crops known to the current model")
    ),
    paths(
        crate::routes::health::health,
        crate::routes::predict::predict,
        crate::routes::predict::predict_batch,
        crate::routes::predict::predict_sample,
        crate::routes::model::model_info,
        crate::routes::model::train,
        crate::routes::crops::supported_crops,
    ),
    components(schemas(
        crate::routes::health::HealthResponse,
        crate::routes::predict::CropInput,
        crate::routes::predict::CropPrediction,
        crate::routes::predict::SamplePrediction,
        crate::routes::model::ModelInfoResponse,
        crate::routes::model::TrainRequest,
        crate::routes::model::TrainResponse,
        crate::routes::crops::CropEntry,
        crate::routes::crops::CropsResponse,
        crate::crop_info::CropInfo,
        crate::vegetation::Location,
    ))
)]
pub struct ApiDoc;
