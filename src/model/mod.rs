//! Trained regressors
//!
//! The forecast model is produced offline. Two artifact formats load here:
//! - Tree ensemble: a LightGBM JSON model dump
//! - MLP: a burn record of [`MlpRegressor`]

pub mod gbdt;
pub mod mlp;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::features::FeatureVector;
use crate::{ArtifactConfig, Result};

pub use gbdt::TreeEnsemble;
pub use mlp::{MlpConfig, MlpRegressor};

/// CPU backend used to run burn models
pub type InferenceBackend = burn::backend::NdArray<f32>;

/// A loaded model: one scalar prediction per input row
///
/// Implementations hold no mutable state once loaded.
pub trait Regressor: Send {
    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>>;

    fn info(&self) -> ModelInfo;
}

/// Artifact format of the trained model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    TreeEnsemble,
    Mlp,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::TreeEnsemble => write!(f, "Tree ensemble"),
            ModelKind::Mlp => write!(f, "MLP"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "tree_ensemble" | "gbdt" | "lightgbm" => Ok(ModelKind::TreeEnsemble),
            "mlp" => Ok(ModelKind::Mlp),
            _ => Err(format!("Unknown model kind: {}. Use tree_ensemble or mlp.", s)),
        }
    }
}

/// Summary of a loaded model
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub kind: ModelKind,
    pub n_features: usize,
    pub detail: String,
}

impl fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} features): {}", self.kind, self.n_features, self.detail)
    }
}

/// Load the configured model artifact
pub fn load_model(artifacts: &ArtifactConfig) -> Result<Box<dyn Regressor>> {
    let model: Box<dyn Regressor> = match artifacts.model_kind {
        ModelKind::TreeEnsemble => Box::new(TreeEnsemble::load(&artifacts.model_path)?),
        ModelKind::Mlp => {
            let device = Default::default();
            let config = MlpConfig {
                input_dim: FeatureVector::DIM,
                hidden_dims: artifacts.hidden_dims.clone(),
            };
            Box::new(MlpRegressor::<InferenceBackend>::load(
                &device,
                &artifacts.model_path,
                config,
            )?)
        }
    };

    log::info!("Loaded model from {}: {}", artifacts.model_path, model.info());
    Ok(model)
}
