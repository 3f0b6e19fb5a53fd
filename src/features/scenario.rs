//! Scenario input: the raw values a user enters for one forecast

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::encoding::{CategoricalField, CategoryChoice, EncoderRegistry};
use crate::{ForecastError, Result};

/// Bounded numeric scenario fields, in form display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    Revenue,
    MarketingSpend,
    DiscountPercent,
    StockAvailable,
    LeadTimeDays,
    CompetitorActivity,
    SeasonalityIndex,
    EconomicIndicator,
    FailureRatePct,
    ReturnUnits,
    PressureRatingBar,
    TemperatureRatingC,
    Year,
    Month,
}

/// Declared input range of a numeric field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericSpec {
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub step: f64,
    /// Closed set of allowed values, if the field is a selection
    pub choices: Option<&'static [f64]>,
}

const PRESSURE_RATINGS: &[f64] = &[160.0, 200.0, 250.0, 315.0, 350.0];
const TEMPERATURE_RATINGS: &[f64] = &[80.0, 90.0, 100.0, 110.0];

fn range(min: f64, max: f64, default: f64, step: f64) -> NumericSpec {
    NumericSpec {
        min,
        max,
        default,
        step,
        choices: None,
    }
}

fn choice(choices: &'static [f64]) -> NumericSpec {
    NumericSpec {
        min: choices[0],
        max: choices[choices.len() - 1],
        default: choices[0],
        step: 0.0,
        choices: Some(choices),
    }
}

impl NumericField {
    pub const ALL: [NumericField; 14] = [
        NumericField::Revenue,
        NumericField::MarketingSpend,
        NumericField::DiscountPercent,
        NumericField::StockAvailable,
        NumericField::LeadTimeDays,
        NumericField::CompetitorActivity,
        NumericField::SeasonalityIndex,
        NumericField::EconomicIndicator,
        NumericField::FailureRatePct,
        NumericField::ReturnUnits,
        NumericField::PressureRatingBar,
        NumericField::TemperatureRatingC,
        NumericField::Year,
        NumericField::Month,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NumericField::Revenue => "revenue",
            NumericField::MarketingSpend => "marketing_spend",
            NumericField::DiscountPercent => "discount_percent",
            NumericField::StockAvailable => "stock_available",
            NumericField::LeadTimeDays => "lead_time_days",
            NumericField::CompetitorActivity => "competitor_activity",
            NumericField::SeasonalityIndex => "seasonality_index",
            NumericField::EconomicIndicator => "economic_indicator",
            NumericField::FailureRatePct => "failure_rate_pct",
            NumericField::ReturnUnits => "return_units",
            NumericField::PressureRatingBar => "pressure_rating_bar",
            NumericField::TemperatureRatingC => "temperature_rating_c",
            NumericField::Year => "year",
            NumericField::Month => "month",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NumericField::Revenue => "Revenue (₹)",
            NumericField::MarketingSpend => "Marketing Spend (₹)",
            NumericField::DiscountPercent => "Discount Percent",
            NumericField::StockAvailable => "Stock Available (units)",
            NumericField::LeadTimeDays => "Lead Time (days)",
            NumericField::CompetitorActivity => "Competitor Activity Index",
            NumericField::SeasonalityIndex => "Seasonality Index",
            NumericField::EconomicIndicator => "Economic Indicator",
            NumericField::FailureRatePct => "Failure Rate (%)",
            NumericField::ReturnUnits => "Return Units",
            NumericField::PressureRatingBar => "Pressure Rating (bar)",
            NumericField::TemperatureRatingC => "Temperature Rating (°C)",
            NumericField::Year => "Year",
            NumericField::Month => "Month",
        }
    }

    pub fn spec(&self) -> NumericSpec {
        match self {
            NumericField::Revenue => range(250_000.0, 1_800_000.0, 800_000.0, 5_000.0),
            NumericField::MarketingSpend => range(10_000.0, 500_000.0, 30_000.0, 5_000.0),
            NumericField::DiscountPercent => range(3.0, 14.0, 8.0, 1.0),
            NumericField::StockAvailable => range(100.0, 500.0, 300.0, 10.0),
            NumericField::LeadTimeDays => range(5.0, 19.0, 12.0, 1.0),
            NumericField::CompetitorActivity => range(0.0, 9.0, 4.0, 1.0),
            NumericField::SeasonalityIndex => range(0.85, 1.25, 1.05, 0.01),
            NumericField::EconomicIndicator => range(5.5, 8.5, 6.8, 0.1),
            NumericField::FailureRatePct => range(0.1, 2.5, 1.2, 0.1),
            NumericField::ReturnUnits => range(0.0, 4.0, 1.0, 1.0),
            NumericField::PressureRatingBar => choice(PRESSURE_RATINGS),
            NumericField::TemperatureRatingC => choice(TEMPERATURE_RATINGS),
            NumericField::Year => range(2000.0, 2050.0, 2020.0, 1.0),
            NumericField::Month => range(1.0, 12.0, 1.0, 1.0),
        }
    }

    /// Whether the form only accepts whole numbers for this field
    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            NumericField::SeasonalityIndex
                | NumericField::EconomicIndicator
                | NumericField::FailureRatePct
        )
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for NumericField {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace('-', "_");
        NumericField::ALL
            .into_iter()
            .find(|f| f.name() == key)
            .ok_or_else(|| ForecastError::Parse(format!("Unknown numeric field: {}", s)))
    }
}

/// What to do with a numeric value outside its declared range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Fail the forecast with `RangeViolation`
    #[default]
    Reject,
    /// Pull the value back into range (and onto the nearest allowed value)
    Clamp,
}

impl FromStr for RangePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(RangePolicy::Reject),
            "clamp" => Ok(RangePolicy::Clamp),
            _ => Err(format!("Unknown range policy: {}. Use reject or clamp.", s)),
        }
    }
}

/// Raw field values for one forecast request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInput {
    // Product
    pub product_type: String,
    pub product_code: String,
    pub variant: String,
    pub oil_type: String,

    // Market
    pub region: String,
    pub country: String,
    pub customer_segment: String,
    pub channel: String,
    pub application_area: String,

    // Market and operational factors
    pub revenue: f64,
    pub marketing_spend: f64,
    pub discount_percent: f64,
    pub stock_available: f64,
    pub lead_time_days: f64,
    pub competitor_activity: f64,
    pub seasonality_index: f64,
    pub economic_indicator: f64,
    pub failure_rate_pct: f64,
    pub return_units: f64,

    // Technical
    pub pressure_rating_bar: f64,
    pub temperature_rating_c: f64,

    // Date
    pub year: i32,
    pub month: u32,
}

impl ScenarioInput {
    /// The form's initial state: first known class of every categorical
    /// field and the declared default of every numeric one
    pub fn defaults(registry: &EncoderRegistry) -> Self {
        let first = |field| {
            registry
                .classes_of(field)
                .first()
                .cloned()
                .unwrap_or_default()
        };
        let default = |field: NumericField| field.spec().default;

        ScenarioInput {
            product_type: first(CategoricalField::ProductType),
            product_code: first(CategoricalField::ProductCode),
            variant: first(CategoricalField::Variant),
            oil_type: first(CategoricalField::OilType),
            region: first(CategoricalField::Region),
            country: first(CategoricalField::Country),
            customer_segment: first(CategoricalField::CustomerSegment),
            channel: first(CategoricalField::Channel),
            application_area: first(CategoricalField::ApplicationArea),
            revenue: default(NumericField::Revenue),
            marketing_spend: default(NumericField::MarketingSpend),
            discount_percent: default(NumericField::DiscountPercent),
            stock_available: default(NumericField::StockAvailable),
            lead_time_days: default(NumericField::LeadTimeDays),
            competitor_activity: default(NumericField::CompetitorActivity),
            seasonality_index: default(NumericField::SeasonalityIndex),
            economic_indicator: default(NumericField::EconomicIndicator),
            failure_rate_pct: default(NumericField::FailureRatePct),
            return_units: default(NumericField::ReturnUnits),
            pressure_rating_bar: default(NumericField::PressureRatingBar),
            temperature_rating_c: default(NumericField::TemperatureRatingC),
            year: default(NumericField::Year) as i32,
            month: default(NumericField::Month) as u32,
        }
    }

    /// Take year and month from a calendar date
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.year = date.year();
        self.month = date.month();
        self
    }

    pub fn category(&self, field: CategoricalField) -> &str {
        match field {
            CategoricalField::ProductType => &self.product_type,
            CategoricalField::ProductCode => &self.product_code,
            CategoricalField::Variant => &self.variant,
            CategoricalField::OilType => &self.oil_type,
            CategoricalField::Region => &self.region,
            CategoricalField::Country => &self.country,
            CategoricalField::CustomerSegment => &self.customer_segment,
            CategoricalField::Channel => &self.channel,
            CategoricalField::ApplicationArea => &self.application_area,
        }
    }

    pub fn set_category(&mut self, field: CategoricalField, value: impl Into<String>) {
        let slot = match field {
            CategoricalField::ProductType => &mut self.product_type,
            CategoricalField::ProductCode => &mut self.product_code,
            CategoricalField::Variant => &mut self.variant,
            CategoricalField::OilType => &mut self.oil_type,
            CategoricalField::Region => &mut self.region,
            CategoricalField::Country => &mut self.country,
            CategoricalField::CustomerSegment => &mut self.customer_segment,
            CategoricalField::Channel => &mut self.channel,
            CategoricalField::ApplicationArea => &mut self.application_area,
        };
        *slot = value.into();
    }

    pub fn numeric(&self, field: NumericField) -> f64 {
        match field {
            NumericField::Revenue => self.revenue,
            NumericField::MarketingSpend => self.marketing_spend,
            NumericField::DiscountPercent => self.discount_percent,
            NumericField::StockAvailable => self.stock_available,
            NumericField::LeadTimeDays => self.lead_time_days,
            NumericField::CompetitorActivity => self.competitor_activity,
            NumericField::SeasonalityIndex => self.seasonality_index,
            NumericField::EconomicIndicator => self.economic_indicator,
            NumericField::FailureRatePct => self.failure_rate_pct,
            NumericField::ReturnUnits => self.return_units,
            NumericField::PressureRatingBar => self.pressure_rating_bar,
            NumericField::TemperatureRatingC => self.temperature_rating_c,
            NumericField::Year => self.year as f64,
            NumericField::Month => self.month as f64,
        }
    }

    pub fn set_numeric(&mut self, field: NumericField, value: f64) {
        match field {
            NumericField::Revenue => self.revenue = value,
            NumericField::MarketingSpend => self.marketing_spend = value,
            NumericField::DiscountPercent => self.discount_percent = value,
            NumericField::StockAvailable => self.stock_available = value,
            NumericField::LeadTimeDays => self.lead_time_days = value,
            NumericField::CompetitorActivity => self.competitor_activity = value,
            NumericField::SeasonalityIndex => self.seasonality_index = value,
            NumericField::EconomicIndicator => self.economic_indicator = value,
            NumericField::FailureRatePct => self.failure_rate_pct = value,
            NumericField::ReturnUnits => self.return_units = value,
            NumericField::PressureRatingBar => self.pressure_rating_bar = value,
            NumericField::TemperatureRatingC => self.temperature_rating_c = value,
            NumericField::Year => self.year = value as i32,
            NumericField::Month => self.month = value.max(0.0) as u32,
        }
    }

    /// Apply the range policy to every numeric field
    ///
    /// `Reject` returns the first violation; `Clamp` returns a copy with
    /// every value pulled into range.
    pub fn check_ranges(&self, policy: RangePolicy) -> Result<ScenarioInput> {
        let mut checked = self.clone();

        for field in NumericField::ALL {
            let value = self.numeric(field);
            if in_range(field, value) {
                continue;
            }

            let spec = field.spec();
            match policy {
                RangePolicy::Reject => {
                    return Err(ForecastError::RangeViolation {
                        field,
                        value,
                        min: spec.min,
                        max: spec.max,
                    });
                }
                RangePolicy::Clamp => {
                    let clamped = clamp_value(field, value);
                    log::warn!("Clamped {} from {} to {}", field, value, clamped);
                    checked.set_numeric(field, clamped);
                }
            }
        }

        Ok(checked)
    }

    /// Resolve every categorical value against the encoders, in form order
    ///
    /// Fails with `UnknownCategory` on the first value the artifact does
    /// not list.
    pub fn choices(&self, registry: &EncoderRegistry) -> Result<Vec<CategoryChoice>> {
        CategoricalField::ALL
            .into_iter()
            .map(|field| registry.choice(field, self.category(field)))
            .collect()
    }
}

fn in_range(field: NumericField, value: f64) -> bool {
    let spec = field.spec();
    if !value.is_finite() || value < spec.min || value > spec.max {
        return false;
    }
    if let Some(choices) = spec.choices {
        return choices.contains(&value);
    }
    !field.is_integer() || value.fract() == 0.0
}

fn clamp_value(field: NumericField, value: f64) -> f64 {
    let spec = field.spec();
    let value = if value.is_finite() { value } else { spec.default };

    if let Some(choices) = spec.choices {
        return choices
            .iter()
            .copied()
            .min_by(|a, b| (a - value).abs().total_cmp(&(b - value).abs()))
            .unwrap_or(spec.default);
    }

    let clamped = value.clamp(spec.min, spec.max);
    if field.is_integer() {
        clamped.round()
    } else {
        clamped
    }
}

/// Partial scenario: any field left `None` keeps its current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioOverrides {
    pub product_type: Option<String>,
    pub product_code: Option<String>,
    pub variant: Option<String>,
    pub oil_type: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub customer_segment: Option<String>,
    pub channel: Option<String>,
    pub application_area: Option<String>,
    pub revenue: Option<f64>,
    pub marketing_spend: Option<f64>,
    pub discount_percent: Option<f64>,
    pub stock_available: Option<f64>,
    pub lead_time_days: Option<f64>,
    pub competitor_activity: Option<f64>,
    pub seasonality_index: Option<f64>,
    pub economic_indicator: Option<f64>,
    pub failure_rate_pct: Option<f64>,
    pub return_units: Option<f64>,
    pub pressure_rating_bar: Option<f64>,
    pub temperature_rating_c: Option<f64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl ScenarioOverrides {
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Layer `other` on top of `self`; fields set in `other` win
    pub fn merge(self, other: ScenarioOverrides) -> ScenarioOverrides {
        macro_rules! pick {
            ($($f:ident),*) => {
                ScenarioOverrides { $($f: other.$f.or(self.$f)),* }
            };
        }
        pick!(
            product_type, product_code, variant, oil_type, region, country,
            customer_segment, channel, application_area, revenue, marketing_spend,
            discount_percent, stock_available, lead_time_days, competitor_activity,
            seasonality_index, economic_indicator, failure_rate_pct, return_units,
            pressure_rating_bar, temperature_rating_c, year, month
        )
    }

    pub fn apply(self, input: &mut ScenarioInput) {
        let categories = [
            (CategoricalField::ProductType, self.product_type),
            (CategoricalField::ProductCode, self.product_code),
            (CategoricalField::Variant, self.variant),
            (CategoricalField::OilType, self.oil_type),
            (CategoricalField::Region, self.region),
            (CategoricalField::Country, self.country),
            (CategoricalField::CustomerSegment, self.customer_segment),
            (CategoricalField::Channel, self.channel),
            (CategoricalField::ApplicationArea, self.application_area),
        ];
        for (field, value) in categories {
            if let Some(value) = value {
                input.set_category(field, value);
            }
        }

        let numbers = [
            (NumericField::Revenue, self.revenue),
            (NumericField::MarketingSpend, self.marketing_spend),
            (NumericField::DiscountPercent, self.discount_percent),
            (NumericField::StockAvailable, self.stock_available),
            (NumericField::LeadTimeDays, self.lead_time_days),
            (NumericField::CompetitorActivity, self.competitor_activity),
            (NumericField::SeasonalityIndex, self.seasonality_index),
            (NumericField::EconomicIndicator, self.economic_indicator),
            (NumericField::FailureRatePct, self.failure_rate_pct),
            (NumericField::ReturnUnits, self.return_units),
            (NumericField::PressureRatingBar, self.pressure_rating_bar),
            (NumericField::TemperatureRatingC, self.temperature_rating_c),
        ];
        for (field, value) in numbers {
            if let Some(value) = value {
                input.set_numeric(field, value);
            }
        }

        if let Some(year) = self.year {
            input.year = year;
        }
        if let Some(month) = self.month {
            input.month = month;
        }
    }
}
