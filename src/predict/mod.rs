//! Prediction and inference
//!
//! Load trained artifacts and generate forecasts.

pub mod inference;

pub use inference::{format_forecast, Forecast, ForecastContext, Predictor};
