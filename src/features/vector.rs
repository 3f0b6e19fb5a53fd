//! Model input row
//!
//! The regressor was fitted on 27 columns in a fixed order. Nothing checks
//! the order at prediction time, so a swapped column silently degrades the
//! forecast. `FeatureColumn::ALL` is the single source of that order.

use std::fmt;

use super::encoding::{CategoricalField, EncoderRegistry};
use super::scenario::ScenarioInput;
use super::temporal::MonthFeatures;
use crate::Result;

/// Value emitted for `new_product_launch`.
///
/// The model was trained with this column but the form never collects it,
/// so every row carries 0. A future input for it must keep column 17.
pub const NEW_PRODUCT_LAUNCH: f64 = 0.0;

/// Model input columns, in training order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    ProductType,
    ProductCode,
    Variant,
    Region,
    Country,
    CustomerSegment,
    Channel,
    ApplicationArea,
    Revenue,
    MarketingSpend,
    DiscountPercent,
    StockAvailable,
    LeadTimeDays,
    CompetitorActivity,
    SeasonalityIndex,
    EconomicIndicator,
    NewProductLaunch,
    FailureRatePct,
    ReturnUnits,
    PressureRatingBar,
    TemperatureRatingC,
    OilType,
    Year,
    Month,
    Quarter,
    MonthSin,
    MonthCos,
}

impl FeatureColumn {
    pub const ALL: [FeatureColumn; FeatureVector::DIM] = [
        FeatureColumn::ProductType,
        FeatureColumn::ProductCode,
        FeatureColumn::Variant,
        FeatureColumn::Region,
        FeatureColumn::Country,
        FeatureColumn::CustomerSegment,
        FeatureColumn::Channel,
        FeatureColumn::ApplicationArea,
        FeatureColumn::Revenue,
        FeatureColumn::MarketingSpend,
        FeatureColumn::DiscountPercent,
        FeatureColumn::StockAvailable,
        FeatureColumn::LeadTimeDays,
        FeatureColumn::CompetitorActivity,
        FeatureColumn::SeasonalityIndex,
        FeatureColumn::EconomicIndicator,
        FeatureColumn::NewProductLaunch,
        FeatureColumn::FailureRatePct,
        FeatureColumn::ReturnUnits,
        FeatureColumn::PressureRatingBar,
        FeatureColumn::TemperatureRatingC,
        FeatureColumn::OilType,
        FeatureColumn::Year,
        FeatureColumn::Month,
        FeatureColumn::Quarter,
        FeatureColumn::MonthSin,
        FeatureColumn::MonthCos,
    ];

    /// Zero-based position in the row
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Column name in the training data
    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::ProductType => "product_type",
            FeatureColumn::ProductCode => "product_code",
            FeatureColumn::Variant => "variant",
            FeatureColumn::Region => "region",
            FeatureColumn::Country => "country",
            FeatureColumn::CustomerSegment => "customer_segment",
            FeatureColumn::Channel => "channel",
            FeatureColumn::ApplicationArea => "application_area",
            FeatureColumn::Revenue => "revenue",
            FeatureColumn::MarketingSpend => "marketing_spend",
            FeatureColumn::DiscountPercent => "discount_percent",
            FeatureColumn::StockAvailable => "stock_available",
            FeatureColumn::LeadTimeDays => "lead_time_days",
            FeatureColumn::CompetitorActivity => "competitor_activity",
            FeatureColumn::SeasonalityIndex => "seasonality_index",
            FeatureColumn::EconomicIndicator => "economic_indicator",
            FeatureColumn::NewProductLaunch => "new_product_launch",
            FeatureColumn::FailureRatePct => "failure_rate_pct",
            FeatureColumn::ReturnUnits => "return_units",
            FeatureColumn::PressureRatingBar => "pressure_rating_bar",
            FeatureColumn::TemperatureRatingC => "temperature_rating_c",
            FeatureColumn::OilType => "oil_type",
            FeatureColumn::Year => "year",
            FeatureColumn::Month => "month",
            FeatureColumn::Quarter => "quarter",
            FeatureColumn::MonthSin => "month_sin",
            FeatureColumn::MonthCos => "month_cos",
        }
    }

    /// Categorical field encoded into this column, if any
    pub fn categorical(&self) -> Option<CategoricalField> {
        match self {
            FeatureColumn::ProductType => Some(CategoricalField::ProductType),
            FeatureColumn::ProductCode => Some(CategoricalField::ProductCode),
            FeatureColumn::Variant => Some(CategoricalField::Variant),
            FeatureColumn::Region => Some(CategoricalField::Region),
            FeatureColumn::Country => Some(CategoricalField::Country),
            FeatureColumn::CustomerSegment => Some(CategoricalField::CustomerSegment),
            FeatureColumn::Channel => Some(CategoricalField::Channel),
            FeatureColumn::ApplicationArea => Some(CategoricalField::ApplicationArea),
            FeatureColumn::OilType => Some(CategoricalField::OilType),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One assembled model input row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FeatureVector::DIM]);

impl FeatureVector {
    /// Number of columns the model expects
    pub const DIM: usize = 27;

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, column: FeatureColumn) -> f64 {
        self.0[column.index()]
    }

    /// Row as f32, for tensor-backed models
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.0.iter().map(|&v| v as f32).collect()
    }

    /// Column names paired with their values, in model order
    pub fn named(&self) -> impl Iterator<Item = (FeatureColumn, f64)> + '_ {
        FeatureColumn::ALL.into_iter().zip(self.0.iter().copied())
    }
}

/// Build the model row for a scenario
///
/// Fails with `UnknownCategory` if any categorical value is not one of its
/// encoder's classes; no partial row is produced in that case.
pub fn assemble(registry: &EncoderRegistry, input: &ScenarioInput) -> Result<FeatureVector> {
    let code = |field: CategoricalField| -> Result<f64> {
        Ok(registry.encode(field, input.category(field))? as f64)
    };
    let month = MonthFeatures::from_month(input.month);

    let row = [
        code(CategoricalField::ProductType)?,
        code(CategoricalField::ProductCode)?,
        code(CategoricalField::Variant)?,
        code(CategoricalField::Region)?,
        code(CategoricalField::Country)?,
        code(CategoricalField::CustomerSegment)?,
        code(CategoricalField::Channel)?,
        code(CategoricalField::ApplicationArea)?,
        input.revenue,
        input.marketing_spend,
        input.discount_percent,
        input.stock_available,
        input.lead_time_days,
        input.competitor_activity,
        input.seasonality_index,
        input.economic_indicator,
        NEW_PRODUCT_LAUNCH,
        input.failure_rate_pct,
        input.return_units,
        input.pressure_rating_bar,
        input.temperature_rating_c,
        code(CategoricalField::OilType)?,
        input.year as f64,
        input.month as f64,
        month.quarter as f64,
        month.sin,
        month.cos,
    ];

    let vector = FeatureVector(row);
    log::debug!("Assembled feature row: {:?}", vector.as_slice());
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::encoding::tests::sample_registry;
    use crate::features::scenario::tests::pump_scenario;
    use crate::ForecastError;

    #[test]
    fn test_pump_scenario_row() {
        let registry = sample_registry();
        let vector = assemble(&registry, &pump_scenario()).unwrap();

        // Codes from the sample encoders: Pump=2, P100=2, Std=1, North=1,
        // India=1, OEM=1, Direct=0, Mining=2, Mineral=1
        let expected_prefix = [
            2.0, 2.0, 1.0, 1.0, 1.0, 1.0, 0.0, 2.0, 800_000.0, 30_000.0, 8.0, 300.0, 12.0, 4.0,
            1.05, 6.8, 0.0, 1.2, 1.0, 250.0, 90.0, 1.0, 2020.0, 1.0, 1.0,
        ];
        let row = vector.as_slice();

        assert_eq!(row.len(), FeatureVector::DIM);
        assert_eq!(&row[..25], &expected_prefix[..]);
        assert!((row[25] - 0.5).abs() < 1e-9);
        assert!((row[26] - 0.866_025_403_784).abs() < 1e-9);
    }

    #[test]
    fn test_columns_line_up_with_fields() {
        let registry = sample_registry();
        let input = pump_scenario();
        let vector = assemble(&registry, &input).unwrap();

        for (column, value) in vector.named() {
            if let Some(field) = column.categorical() {
                let expected = registry.encode(field, input.category(field)).unwrap();
                assert_eq!(value, expected as f64, "column {}", column);
            }
        }
        assert_eq!(vector.get(FeatureColumn::OilType), 1.0);
        assert_eq!(vector.get(FeatureColumn::Revenue), input.revenue);
        assert_eq!(vector.get(FeatureColumn::TemperatureRatingC), 90.0);
    }

    #[test]
    fn test_column_indices_are_dense() {
        for (i, column) in FeatureColumn::ALL.iter().enumerate() {
            assert_eq!(column.index(), i);
        }
        assert_eq!(FeatureColumn::NewProductLaunch.index(), 16);
        assert_eq!(FeatureColumn::MonthSin.index(), 25);
        assert_eq!(FeatureColumn::MonthCos.index(), 26);
    }

    #[test]
    fn test_new_product_launch_always_zero() {
        let registry = sample_registry();
        let mut input = pump_scenario();

        for month in 1..=12 {
            input.month = month;
            input.revenue = 250_000.0 + month as f64 * 1_000.0;
            let vector = assemble(&registry, &input).unwrap();
            assert_eq!(vector.get(FeatureColumn::NewProductLaunch), 0.0);
        }
    }

    #[test]
    fn test_quarter_column() {
        let registry = sample_registry();
        let mut input = pump_scenario();

        for (month, quarter) in [(1, 1.0), (3, 1.0), (4, 2.0), (9, 3.0), (10, 4.0), (12, 4.0)] {
            input.month = month;
            let vector = assemble(&registry, &input).unwrap();
            assert_eq!(vector.get(FeatureColumn::Quarter), quarter, "month {}", month);
        }
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let registry = sample_registry();
        let input = pump_scenario();

        let a = assemble(&registry, &input).unwrap();
        let b = assemble(&registry, &input).unwrap();

        let bits = |v: &FeatureVector| v.as_slice().iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_unknown_category_produces_no_row() {
        let registry = sample_registry();
        let mut input = pump_scenario();
        input.oil_type = "Olive".into();

        match assemble(&registry, &input) {
            Err(ForecastError::UnknownCategory { field, value }) => {
                assert_eq!(field, CategoricalField::OilType);
                assert_eq!(value, "Olive");
            }
            other => panic!("expected UnknownCategory, got {:?}", other),
        }
    }

    #[test]
    fn test_f32_conversion_keeps_order() {
        let vector = assemble(&sample_registry(), &pump_scenario()).unwrap();
        let row = vector.to_f32_vec();

        assert_eq!(row.len(), FeatureVector::DIM);
        assert_eq!(row[FeatureColumn::Year.index()], 2020.0);
    }
}
