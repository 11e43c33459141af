use crop_advisor_ml::ModelConfig;
use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VegetationSource {
    Mock,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub model: ModelConfig,
    /// JSON-lines file receiving served predictions, disabled when unset
    pub prediction_log_path: Option<PathBuf>,
    pub vegetation_source: Option<VegetationSource>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ModelConfig::default();
        let model = ModelConfig::new(
            lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            lookup("DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
        );

        Ok(Config {
            host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("API_PORT")
                .unwrap_or_else(|| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("API_PORT".to_string()))?,
            model,
            prediction_log_path: lookup("PREDICTION_LOG_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            vegetation_source: match lookup("VEGETATION_SOURCE").as_deref() {
                None | Some("") | Some("none") => None,
                Some("mock") => Some(VegetationSource::Mock),
                Some(_) => return Err(ConfigError::InvalidValue("VEGETATION_SOURCE".to_string())),
            },
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(var) => write!(f, "Invalid value for: {}", var),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.addr(), "0.0.0.0:8000");
        assert_eq!(config.model, ModelConfig::default());
        assert!(config.prediction_log_path.is_none());
        assert!(config.vegetation_source.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9100"),
            ("MODEL_PATH", "/srv/model.flmodel"),
            ("DATA_PATH", "/srv/data"),
            ("PREDICTION_LOG_PATH", "/srv/logs/predictions.jsonl"),
            ("VEGETATION_SOURCE", "mock"),
        ])
        .unwrap();

        assert_eq!(config.addr(), "127.0.0.1:9100");
        assert_eq!(config.model.model_path, PathBuf::from("/srv/model.flmodel"));
        assert_eq!(config.model.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(
            config.prediction_log_path,
            Some(PathBuf::from("/srv/logs/predictions.jsonl"))
        );
        assert_eq!(config.vegetation_source, Some(VegetationSource::Mock));
    }

    #[test]
    fn test_invalid_values() {
        let err = config(&[("API_PORT", "eighty")]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for: API_PORT");

        let err = config(&[("VEGETATION_SOURCE", "sentinel")]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for: VEGETATION_SOURCE");
    }
}
