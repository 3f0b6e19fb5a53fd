//! Hydraulic sales forecasting
//!
//! Turns a product/market/operational scenario into the feature row a
//! pre-trained regressor expects, and reports its "Units Sold" forecast.

pub mod features;
pub mod model;
pub mod predict;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use features::{
    assemble, CategoricalField, EncoderRegistry, FeatureColumn, FeatureVector, NumericField,
    RangePolicy, ScenarioInput,
};
pub use model::{ModelKind, Regressor};
pub use predict::{Forecast, ForecastContext, Predictor};

/// Application-wide errors
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Unknown category for {field}: {value:?}")]
    UnknownCategory {
        field: CategoricalField,
        value: String,
    },

    #[error("Failed to load {artifact}: {message}")]
    ArtifactLoad { artifact: String, message: String },

    #[error("{field} = {value} is outside [{min}, {max}]")]
    RangeViolation {
        field: NumericField,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ForecastError {
    pub(crate) fn artifact(artifact: impl fmt::Display, message: impl fmt::Display) -> Self {
        ForecastError::ArtifactLoad {
            artifact: artifact.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub artifacts: ArtifactConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// JSON map of categorical field name to its ordered classes
    pub encoders_path: String,
    /// Trained regressor (LightGBM JSON dump, or burn record without extension)
    pub model_path: String,
    pub model_kind: ModelKind,
    /// Hidden layer sizes, only read for `model_kind = "mlp"`
    #[serde(default = "default_hidden_dims")]
    pub hidden_dims: Vec<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub range_policy: RangePolicy,
}

fn default_hidden_dims() -> Vec<usize> {
    vec![64, 32]
}

impl Default for Config {
    fn default() -> Self {
        Config {
            artifacts: ArtifactConfig {
                encoders_path: "models/label_encoders.json".to_string(),
                model_path: "models/lightgbm_model.json".to_string(),
                model_kind: ModelKind::TreeEnsemble,
                hidden_dims: default_hidden_dims(),
            },
            input: InputConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ForecastError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ForecastError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_toml_roundtrip_keeps_policy() {
        let mut config = Config::default();
        config.input.range_policy = RangePolicy::Clamp;

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = Config::from_toml_str(&text).unwrap();

        assert_eq!(parsed.input.range_policy, RangePolicy::Clamp);
        assert_eq!(parsed.artifacts.model_kind, ModelKind::TreeEnsemble);
    }

    #[test]
    fn test_config_input_section_is_optional() {
        let text = r#"
            [artifacts]
            encoders_path = "enc.json"
            model_path = "model.json"
            model_kind = "tree_ensemble"
        "#;
        let config = Config::from_toml_str(text).unwrap();

        assert_eq!(config.input.range_policy, RangePolicy::Reject);
        assert_eq!(config.artifacts.hidden_dims, vec![64, 32]);
    }

    #[test]
    fn test_unknown_category_message_names_field() {
        let err = ForecastError::UnknownCategory {
            field: CategoricalField::Channel,
            value: "Carrier pigeon".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown category for channel: \"Carrier pigeon\""
        );
    }
}
