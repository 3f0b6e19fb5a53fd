//! Date-derived features
//!
//! Month is fed to the model three ways: raw, as a quarter, and as a point
//! on the unit circle so December and January sit next to each other.

use std::f64::consts::PI;

/// Calendar quarter (1-4) of a month in 1..=12
pub fn quarter(month: u32) -> u32 {
    (month.saturating_sub(1)) / 3 + 1
}

pub fn month_sin(month: u32) -> f64 {
    (2.0 * PI * month as f64 / 12.0).sin()
}

pub fn month_cos(month: u32) -> f64 {
    (2.0 * PI * month as f64 / 12.0).cos()
}

/// The derived month columns of the feature vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthFeatures {
    pub quarter: u32,
    pub sin: f64,
    pub cos: f64,
}

impl MonthFeatures {
    pub fn from_month(month: u32) -> Self {
        MonthFeatures {
            quarter: quarter(month),
            sin: month_sin(month),
            cos: month_cos(month),
        }
    }

    /// Euclidean distance between two months on the unit circle
    pub fn distance(&self, other: &MonthFeatures) -> f64 {
        ((self.sin - other.sin).powi(2) + (self.cos - other.cos).powi(2)).sqrt()
    }
}
