//! Model inference for forecasts

use serde::Serialize;

use crate::features::{assemble, EncoderRegistry, FeatureVector, RangePolicy, ScenarioInput};
use crate::model::{load_model, ModelInfo, Regressor};
use crate::{Config, ForecastError, Result};

/// Loaded artifacts shared by every forecast in the process
///
/// Built once at startup; nothing in it changes afterwards.
pub struct ForecastContext {
    encoders: EncoderRegistry,
    model: Box<dyn Regressor>,
}

impl ForecastContext {
    pub fn new(encoders: EncoderRegistry, model: Box<dyn Regressor>) -> Self {
        ForecastContext { encoders, model }
    }

    /// Load both artifacts named in the config, failing on the first problem
    pub fn load(config: &Config) -> Result<Self> {
        let encoders = EncoderRegistry::load(&config.artifacts.encoders_path)?;
        let model = load_model(&config.artifacts)?;
        Ok(Self::new(encoders, model))
    }

    pub fn encoders(&self) -> &EncoderRegistry {
        &self.encoders
    }

    pub fn model_info(&self) -> ModelInfo {
        self.model.info()
    }
}

/// A single forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Forecast {
    /// Model output as returned
    pub raw: f64,
    /// Displayed value: `raw` truncated toward zero
    pub units_sold: i64,
}

impl Forecast {
    pub fn from_raw(raw: f64) -> Self {
        Forecast {
            raw,
            units_sold: raw.trunc() as i64,
        }
    }
}

/// Predictor for turning scenarios into forecasts
pub struct Predictor<'a> {
    context: &'a ForecastContext,
    policy: RangePolicy,
}

impl<'a> Predictor<'a> {
    pub fn new(context: &'a ForecastContext, policy: RangePolicy) -> Self {
        Predictor { context, policy }
    }

    /// Range-check a scenario and build its feature row
    pub fn assemble(&self, input: &ScenarioInput) -> Result<FeatureVector> {
        let checked = input.check_ranges(self.policy)?;
        assemble(&self.context.encoders, &checked)
    }

    /// Forecast units sold for one scenario
    pub fn predict(&self, input: &ScenarioInput) -> Result<Forecast> {
        let vector = self.assemble(input)?;
        let outputs = self.context.model.predict(&[vector])?;

        match outputs.as_slice() {
            [raw] if raw.is_finite() => {
                let forecast = Forecast::from_raw(*raw);
                log::debug!("Forecast: {:?}", forecast);
                Ok(forecast)
            }
            [raw] => Err(ForecastError::Model(format!(
                "model returned a non-finite value: {}",
                raw
            ))),
            other => Err(ForecastError::Model(format!(
                "expected 1 prediction, model returned {}",
                other.len()
            ))),
        }
    }

    /// Forecast several scenarios; each keeps its own outcome
    pub fn predict_batch(&self, inputs: &[ScenarioInput]) -> Vec<Result<Forecast>> {
        inputs.iter().map(|input| self.predict(input)).collect()
    }
}

/// Format a forecast for display
pub fn format_forecast(input: &ScenarioInput, forecast: &Forecast) -> String {
    format!(
        r#"
┌─────────────────────────────────────────────────┐
│  {} {} ({}) in {}, {}
├─────────────────────────────────────────────────┤
│  Channel:            {} / {}
│  Period:             {}-{:02}
│  Predicted units:    {}
└─────────────────────────────────────────────────┘
"#,
        input.product_type,
        input.product_code,
        input.variant,
        input.region,
        input.country,
        input.channel,
        input.customer_segment,
        input.year,
        input.month,
        forecast.units_sold,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::encoding::tests::sample_registry;
    use crate::features::scenario::tests::pump_scenario;
    use crate::features::FeatureColumn;
    use crate::model::gbdt::tests::sample_model_json;
    use crate::model::{ModelKind, TreeEnsemble};

    /// Echoes one column back, optionally returning extra outputs
    struct EchoModel {
        column: FeatureColumn,
        extra: usize,
    }

    impl Regressor for EchoModel {
        fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
            let mut out: Vec<f64> = rows.iter().map(|r| r.get(self.column)).collect();
            out.extend(std::iter::repeat(0.0).take(self.extra));
            Ok(out)
        }

        fn info(&self) -> ModelInfo {
            ModelInfo {
                kind: ModelKind::TreeEnsemble,
                n_features: FeatureVector::DIM,
                detail: "echo".to_string(),
            }
        }
    }

    fn echo_context(column: FeatureColumn) -> ForecastContext {
        ForecastContext::new(sample_registry(), Box::new(EchoModel { column, extra: 0 }))
    }

    #[test]
    fn test_forecast_truncates_toward_zero() {
        assert_eq!(Forecast::from_raw(127.9).units_sold, 127);
        assert_eq!(Forecast::from_raw(-3.7).units_sold, -3);
        assert_eq!(Forecast::from_raw(42.0).units_sold, 42);
    }

    #[test]
    fn test_predict_with_tree_ensemble() {
        let model = TreeEnsemble::from_json_str(&sample_model_json()).unwrap();
        let context = ForecastContext::new(sample_registry(), Box::new(model));
        let predictor = Predictor::new(&context, RangePolicy::Reject);

        let forecast = predictor.predict(&pump_scenario()).unwrap();

        assert!((forecast.raw - 127.9).abs() < 1e-9);
        assert_eq!(forecast.units_sold, 127);
    }

    #[test]
    fn test_model_sees_assembled_row() {
        let context = echo_context(FeatureColumn::Revenue);
        let predictor = Predictor::new(&context, RangePolicy::Reject);

        let forecast = predictor.predict(&pump_scenario()).unwrap();
        assert_eq!(forecast.units_sold, 800_000);
    }

    #[test]
    fn test_reject_policy_stops_forecast() {
        let context = echo_context(FeatureColumn::Revenue);
        let predictor = Predictor::new(&context, RangePolicy::Reject);

        let mut input = pump_scenario();
        input.revenue = 10.0;

        assert!(matches!(
            predictor.predict(&input),
            Err(ForecastError::RangeViolation { .. })
        ));
    }

    #[test]
    fn test_clamp_policy_feeds_clamped_value() {
        let context = echo_context(FeatureColumn::Revenue);
        let predictor = Predictor::new(&context, RangePolicy::Clamp);

        let mut input = pump_scenario();
        input.revenue = 10.0;

        let forecast = predictor.predict(&input).unwrap();
        assert_eq!(forecast.units_sold, 250_000);
    }

    #[test]
    fn test_unknown_category_aborts_forecast() {
        let context = echo_context(FeatureColumn::Revenue);
        let predictor = Predictor::new(&context, RangePolicy::Clamp);

        let mut input = pump_scenario();
        input.region = "Atlantis".into();

        assert!(matches!(
            predictor.predict(&input),
            Err(ForecastError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_wrong_output_count_is_model_error() {
        let model = EchoModel {
            column: FeatureColumn::Year,
            extra: 1,
        };
        let context = ForecastContext::new(sample_registry(), Box::new(model));
        let predictor = Predictor::new(&context, RangePolicy::Reject);

        assert!(matches!(
            predictor.predict(&pump_scenario()),
            Err(ForecastError::Model(_))
        ));
    }

    #[test]
    fn test_batch_keeps_individual_failures() {
        let context = echo_context(FeatureColumn::Month);
        let predictor = Predictor::new(&context, RangePolicy::Reject);

        let mut bad = pump_scenario();
        bad.channel = "Fax".into();
        let mut march = pump_scenario();
        march.month = 3;

        let results = predictor.predict_batch(&[pump_scenario(), bad, march]);

        assert_eq!(results[0].as_ref().unwrap().units_sold, 1);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().units_sold, 3);
    }

    #[test]
    fn test_load_fails_fast_on_missing_encoders() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        std::fs::write(&model_path, sample_model_json()).unwrap();

        let mut config = Config::default();
        config.artifacts.encoders_path = dir.path().join("missing.json").display().to_string();
        config.artifacts.model_path = model_path.display().to_string();

        match ForecastContext::load(&config) {
            Err(ForecastError::ArtifactLoad { artifact, .. }) => {
                assert!(artifact.contains("missing.json"));
            }
            Err(e) => panic!("expected ArtifactLoad, got {}", e),
            Ok(_) => panic!("expected ArtifactLoad, got a context"),
        }
    }

    #[test]
    fn test_load_builds_context_from_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let encoders_path = dir.path().join("encoders.json");
        let model_path = dir.path().join("model.json");
        std::fs::write(&encoders_path, crate::features::encoding::tests::SAMPLE_ENCODERS).unwrap();
        std::fs::write(&model_path, sample_model_json()).unwrap();

        let mut config = Config::default();
        config.artifacts.encoders_path = encoders_path.display().to_string();
        config.artifacts.model_path = model_path.display().to_string();

        let context = ForecastContext::load(&config).unwrap();
        assert_eq!(context.model_info().kind, ModelKind::TreeEnsemble);

        let forecast = Predictor::new(&context, RangePolicy::Reject)
            .predict(&pump_scenario())
            .unwrap();
        assert_eq!(forecast.units_sold, 127);
    }

    #[test]
    fn test_format_shows_units() {
        let text = format_forecast(&pump_scenario(), &Forecast::from_raw(127.9));
        assert!(text.contains("Predicted units:    127"));
        assert!(text.contains("2020-01"));
    }
}
