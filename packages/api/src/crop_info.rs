//! Agronomic facts attached to predictions

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const NOT_SPECIFIED: &str = "Not specified";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CropInfo {
    pub season: String,
    pub water_requirement: String,
    pub soil_type: String,
    pub temperature_range: String,
    pub rainfall_range: String,
    pub growth_period: String,
}

impl CropInfo {
    fn from_parts(parts: [&str; 6]) -> Self {
        let [season, water, soil, temperature, rainfall, growth] = parts;
        Self {
            season: season.to_string(),
            water_requirement: water.to_string(),
            soil_type: soil.to_string(),
            temperature_range: temperature.to_string(),
            rainfall_range: rainfall.to_string(),
            growth_period: growth.to_string(),
        }
    }

    pub fn unspecified() -> Self {
        Self::from_parts([NOT_SPECIFIED; 6])
    }
}

/// Facts for `crop`, matched case-insensitively. Unknown crops get
/// "Not specified" everywhere.
pub fn crop_info(crop: &str) -> CropInfo {
    let parts = match crop.to_lowercase().as_str() {
        "rice" => [
            "Kharif",
            "High",
            "Clay, Clay Loam",
            "20-37°C",
            "100-200cm",
            "120-150 days",
        ],
        "wheat" => [
            "Rabi",
            "Medium",
            "Clay Loam, Sandy Loam",
            "10-25°C",
            "30-100cm",
            "120-150 days",
        ],
        "corn" => [
            "Kharif",
            "Medium-High",
            "Well-drained Loamy",
            "18-27°C",
            "50-100cm",
            "80-120 days",
        ],
        "cotton" => [
            "Kharif",
            "Medium",
            "Black Cotton Soil",
            "21-30°C",
            "50-100cm",
            "180-200 days",
        ],
        _ => return CropInfo::unspecified(),
    };
    CropInfo::from_parts(parts)
}
