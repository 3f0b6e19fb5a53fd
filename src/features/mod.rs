//! Feature extraction and encoding
//!
//! Converts raw scenario values into the model-ready row.

pub mod encoding;
pub mod scenario;
pub mod temporal;
pub mod vector;

pub use encoding::{CategoricalField, CategoryChoice, CategoryEncoder, EncoderRegistry};
pub use scenario::{NumericField, NumericSpec, RangePolicy, ScenarioInput, ScenarioOverrides};
pub use temporal::MonthFeatures;
pub use vector::{assemble, FeatureColumn, FeatureVector, NEW_PRODUCT_LAUNCH};
