//! Feed-forward regressor
//!
//! Architecture: Input(27) → standardize → [Linear → ReLU] × N → Linear(1)
//!
//! The standardization mean/std are part of the record, so a model trained
//! on scaled inputs is fed raw feature rows.

use burn::module::{Module, Param};
use burn::nn::{Linear, LinearConfig};
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::{ModelInfo, ModelKind, Regressor};
use crate::features::FeatureVector;
use crate::{ForecastError, Result};

/// Configuration for the MLP model
#[derive(Debug, Clone)]
pub struct MlpConfig {
    /// Input dimension (feature row width)
    pub input_dim: usize,
    /// Hidden layer dimensions (e.g., [64, 32] for two layers)
    pub hidden_dims: Vec<usize>,
}

impl Default for MlpConfig {
    fn default() -> Self {
        MlpConfig {
            input_dim: FeatureVector::DIM,
            hidden_dims: vec![64, 32],
        }
    }
}

/// A single hidden layer block: Linear → ReLU
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> HiddenBlock<B> {
    pub fn new(device: &B::Device, in_dim: usize, out_dim: usize) -> Self {
        HiddenBlock {
            linear: LinearConfig::new(in_dim, out_dim).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        relu(self.linear.forward(x))
    }
}

/// Multi-layer perceptron with a single regression output
#[derive(Module, Debug)]
pub struct MlpRegressor<B: Backend> {
    mean: Param<Tensor<B, 1>>,
    std: Param<Tensor<B, 1>>,
    hidden: Vec<HiddenBlock<B>>,
    head: Linear<B>,
}

impl<B: Backend> MlpRegressor<B> {
    /// Create an untrained model with identity standardization
    pub fn new(device: &B::Device, config: MlpConfig) -> Self {
        let mut hidden = Vec::with_capacity(config.hidden_dims.len());
        let mut in_dim = config.input_dim;
        for &out_dim in &config.hidden_dims {
            hidden.push(HiddenBlock::new(device, in_dim, out_dim));
            in_dim = out_dim;
        }

        MlpRegressor {
            mean: Param::from_tensor(Tensor::zeros([config.input_dim], device)),
            std: Param::from_tensor(Tensor::ones([config.input_dim], device)),
            hidden,
            head: LinearConfig::new(in_dim, 1).init(device),
        }
    }

    /// Replace the input standardization
    pub fn with_standardization(mut self, mean: &[f32], std: &[f32], device: &B::Device) -> Self {
        self.mean = Param::from_tensor(Tensor::from_floats(mean, device));
        self.std = Param::from_tensor(Tensor::from_floats(std, device));
        self
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Raw feature rows [batch, input_dim]
    ///
    /// # Returns
    /// Predictions [batch, 1]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let mean = self.mean.val().unsqueeze::<2>();
        let std = self.std.val().unsqueeze::<2>();
        let mut x = (x - mean) / std;

        for block in &self.hidden {
            x = block.forward(x);
        }
        self.head.forward(x)
    }

    fn device(&self) -> B::Device {
        self.head.weight.val().device()
    }

    fn input_dim(&self) -> usize {
        self.mean.val().dims()[0]
    }

    /// Save model to file
    pub fn save(&self, path: &str) -> Result<()>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.clone().into_record(), path.into())
            .map_err(|e| ForecastError::artifact(path, e))
    }

    /// Load model from file
    pub fn load(device: &B::Device, path: &str, config: MlpConfig) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        if config.input_dim != FeatureVector::DIM {
            return Err(ForecastError::artifact(
                path,
                format!(
                    "model expects {} features, the feature row has {}",
                    config.input_dim,
                    FeatureVector::DIM
                ),
            ));
        }

        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(path.into(), device)
            .map_err(|e| ForecastError::artifact(path, e))?;

        let model = Self::new(device, config);
        Ok(model.load_record(record))
    }
}

impl<B: Backend> Regressor for MlpRegressor<B> {
    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let device = self.device();
        let data: Vec<f32> = rows.iter().flat_map(|r| r.to_f32_vec()).collect();
        let x = Tensor::<B, 1>::from_floats(data.as_slice(), &device)
            .reshape([rows.len(), FeatureVector::DIM]);

        let output = self.forward(x).into_data();
        let values = output
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| ForecastError::Model(format!("{:?}", e)))?;

        Ok(values.into_iter().map(f64::from).collect())
    }

    fn info(&self) -> ModelInfo {
        let hidden: Vec<String> = self
            .hidden
            .iter()
            .map(|b| b.linear.weight.val().dims()[1].to_string())
            .collect();
        ModelInfo {
            kind: ModelKind::Mlp,
            n_features: self.input_dim(),
            detail: format!("hidden layers [{}]", hidden.join(", ")),
        }
    }
}
