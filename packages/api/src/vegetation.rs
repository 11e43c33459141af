//! Vegetation index lookup by coordinates

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const MOCK_SAMPLES: usize = 10;
const MOCK_NOISE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VegetationError {
    #[error("Invalid location: latitude {latitude}, longitude {longitude}")]
    InvalidLocation { latitude: f64, longitude: f64 },
}

/// Provides an NDVI reading for a point on the map
#[async_trait::async_trait]
pub trait VegetationIndexSource: Send + Sync {
    async fn vegetation_index(&self, location: Location) -> Result<f64, VegetationError>;
}

/// Offline stand-in. The reading grows with absolute latitude; noise is
/// seeded from the coordinates so a point always reads the same.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockVegetationIndex;

impl MockVegetationIndex {
    pub fn reading(location: Location) -> f64 {
        let base = 0.3 + (location.latitude.abs() / 90.0) * 0.4;
        let seed = location.latitude.to_bits() ^ location.longitude.to_bits().rotate_left(32);
        let mut rng = StdRng::seed_from_u64(seed);

        let total: f64 = (0..MOCK_SAMPLES)
            .map(|_| (base + rng.random_range(-MOCK_NOISE..MOCK_NOISE)).clamp(0.0, 1.0))
            .sum();
        total / MOCK_SAMPLES as f64
    }
}

#[async_trait::async_trait]
impl VegetationIndexSource for MockVegetationIndex {
    async fn vegetation_index(&self, location: Location) -> Result<f64, VegetationError> {
        if !location.is_valid() {
            return Err(VegetationError::InvalidLocation {
                latitude: location.latitude,
                longitude: location.longitude,
            });
        }
        let value = Self::reading(location);
        tracing::debug!(
            latitude = location.latitude,
            longitude = location.longitude,
            ndvi = value,
            "mock vegetation index"
        );
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_reading_is_stable_and_bounded() {
        let source = MockVegetationIndex;
        let delhi = Location {
            latitude: 28.6,
            longitude: 77.2,
        };
        let a = source.vegetation_index(delhi).await.unwrap();
        let b = source.vegetation_index(delhi).await.unwrap();
        assert_eq!(a, b);
        let base = 0.3 + 28.6 / 90.0 * 0.4;
        assert!((a - base).abs() <= MOCK_NOISE);
        assert!((0.0..=1.0).contains(&a));
    }

    #[tokio::test]
    async fn test_mock_rejects_invalid_location() {
        let result = MockVegetationIndex
            .vegetation_index(Location {
                latitude: 120.0,
                longitude: 0.0,
            })
            .await;
        assert!(matches!(result, Err(VegetationError::InvalidLocation { .. })));
    }
}
