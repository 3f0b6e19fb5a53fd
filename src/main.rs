//! Hydraulic Sales Forecasting CLI
//!
//! Predicts units sold for a product/market/operational scenario using a
//! pre-trained regressor.

use clap::{Args, Parser, Subcommand};
use hydrocast::features::{RangePolicy, ScenarioOverrides};
use hydrocast::{Config, Result};

#[derive(Parser)]
#[command(name = "hydrocast")]
#[command(about = "Hydraulic sales forecasting from a pre-trained model", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Override the configured range policy (reject or clamp)
    #[arg(long)]
    range_policy: Option<RangePolicy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,
    /// List the accepted values of the input fields
    Fields {
        /// Only show this field
        field: Option<String>,
    },
    /// Show the feature row a scenario produces
    Vector {
        #[command(flatten)]
        scenario: ScenarioArgs,
    },
    /// Predict units sold for a scenario
    Predict {
        #[command(flatten)]
        scenario: ScenarioArgs,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show model information
    Info,
}

/// Scenario values; anything not given falls back to the form defaults
#[derive(Args, Debug, Default)]
struct ScenarioArgs {
    /// Scenario file (JSON object with any subset of the fields)
    #[arg(long)]
    input: Option<String>,
    /// Take year and month from a date (YYYY-MM-DD); replaces the year and
    /// month of the input file and cannot be combined with --year/--month
    #[arg(long, conflicts_with_all = ["year", "month"])]
    date: Option<chrono::NaiveDate>,

    #[arg(long)]
    product_type: Option<String>,
    #[arg(long)]
    product_code: Option<String>,
    #[arg(long)]
    variant: Option<String>,
    #[arg(long)]
    oil_type: Option<String>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    customer_segment: Option<String>,
    #[arg(long)]
    channel: Option<String>,
    #[arg(long)]
    application_area: Option<String>,

    #[arg(long)]
    revenue: Option<f64>,
    #[arg(long)]
    marketing_spend: Option<f64>,
    #[arg(long)]
    discount_percent: Option<f64>,
    #[arg(long)]
    stock_available: Option<f64>,
    #[arg(long)]
    lead_time_days: Option<f64>,
    #[arg(long)]
    competitor_activity: Option<f64>,
    #[arg(long)]
    seasonality_index: Option<f64>,
    #[arg(long)]
    economic_indicator: Option<f64>,
    #[arg(long)]
    failure_rate_pct: Option<f64>,
    #[arg(long)]
    return_units: Option<f64>,
    #[arg(long)]
    pressure_rating_bar: Option<f64>,
    #[arg(long)]
    temperature_rating_c: Option<f64>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    month: Option<u32>,
}

impl ScenarioArgs {
    fn overrides(&self) -> ScenarioOverrides {
        ScenarioOverrides {
            product_type: self.product_type.clone(),
            product_code: self.product_code.clone(),
            variant: self.variant.clone(),
            oil_type: self.oil_type.clone(),
            region: self.region.clone(),
            country: self.country.clone(),
            customer_segment: self.customer_segment.clone(),
            channel: self.channel.clone(),
            application_area: self.application_area.clone(),
            revenue: self.revenue,
            marketing_spend: self.marketing_spend,
            discount_percent: self.discount_percent,
            stock_available: self.stock_available,
            lead_time_days: self.lead_time_days,
            competitor_activity: self.competitor_activity,
            seasonality_index: self.seasonality_index,
            economic_indicator: self.economic_indicator,
            failure_rate_pct: self.failure_rate_pct,
            return_units: self.return_units,
            pressure_rating_bar: self.pressure_rating_bar,
            temperature_rating_c: self.temperature_rating_c,
            year: self.year,
            month: self.month,
        }
    }
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let mut config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };
    if let Some(policy) = cli.range_policy {
        config.input.range_policy = policy;
    }

    // Run command
    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Fields { field } => commands::fields(&config, field.as_deref()),
        Commands::Vector { scenario } => commands::vector(&config, &scenario),
        Commands::Predict { scenario, format } => commands::predict(&config, &scenario, format),
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use hydrocast::features::{
        CategoricalField, EncoderRegistry, NumericField, ScenarioInput,
    };
    use hydrocast::predict::{format_forecast, ForecastContext, Predictor};
    use hydrocast::ForecastError;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("models")?;
        println!("Created models/ directory");

        println!("\nNext steps:");
        println!(
            "  1. Export the label encoders to {} as {{\"field\": [classes...]}}",
            config.artifacts.encoders_path
        );
        println!(
            "  2. Dump the trained model to {} (LightGBM: booster.dump_model())",
            config.artifacts.model_path
        );
        println!("  3. Run 'hydrocast predict --product-type <TYPE> ...' to forecast");

        Ok(())
    }

    /// Build the scenario: form defaults, then the input file, then flags
    ///
    /// Every categorical value is checked against the encoders here so a
    /// typo is reported before any model work.
    fn scenario(registry: &EncoderRegistry, args: &ScenarioArgs) -> Result<ScenarioInput> {
        let mut input = ScenarioInput::defaults(registry);

        let mut overrides = match &args.input {
            Some(path) => ScenarioOverrides::load(path)?,
            None => ScenarioOverrides::default(),
        };
        if let Some(date) = args.date {
            input = input.with_date(date);
            // a date replaces whatever year/month the file carried
            overrides.year = None;
            overrides.month = None;
        }
        overrides.merge(args.overrides()).apply(&mut input);

        for choice in input.choices(registry)? {
            log::debug!("{} = {} (code {})", choice.field, choice.value, choice.code);
        }

        Ok(input)
    }

    pub fn fields(config: &Config, field: Option<&str>) -> Result<()> {
        let registry = EncoderRegistry::load(&config.artifacts.encoders_path)?;

        if let Some(name) = field {
            if let Ok(f) = name.parse::<CategoricalField>() {
                print_categorical(&registry, f);
                return Ok(());
            }
            let f = name
                .parse::<NumericField>()
                .map_err(|_| ForecastError::Parse(format!("Unknown field: {}", name)))?;
            print_numeric(f);
            return Ok(());
        }

        println!("Categorical fields");
        println!("───────────────────────────────");
        for f in CategoricalField::ALL {
            print_categorical(&registry, f);
        }

        println!("\nNumeric fields");
        println!("───────────────────────────────");
        for f in NumericField::ALL {
            print_numeric(f);
        }

        Ok(())
    }

    fn print_categorical(registry: &EncoderRegistry, field: CategoricalField) {
        println!(
            "  {:<22} {:<20} {}",
            field.name(),
            field.label(),
            registry.classes_of(field).join(", ")
        );
    }

    fn print_numeric(field: NumericField) {
        let spec = field.spec();
        match spec.choices {
            Some(choices) => {
                let list: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
                println!(
                    "  {:<22} {:<20} one of {} (default {})",
                    field.name(),
                    field.label(),
                    list.join(", "),
                    spec.default
                );
            }
            None => println!(
                "  {:<22} {:<20} {} to {} (default {}, step {})",
                field.name(),
                field.label(),
                spec.min,
                spec.max,
                spec.default,
                spec.step
            ),
        }
    }

    pub fn vector(config: &Config, args: &ScenarioArgs) -> Result<()> {
        let registry = EncoderRegistry::load(&config.artifacts.encoders_path)?;
        let input = scenario(&registry, args)?;

        let checked = input.check_ranges(config.input.range_policy)?;
        let vector = hydrocast::assemble(&registry, &checked)?;

        for (column, value) in vector.named() {
            println!("  {:>2}  {:<22} {}", column.index(), column.name(), value);
        }

        Ok(())
    }

    pub fn predict(config: &Config, args: &ScenarioArgs, format: OutputFormat) -> Result<()> {
        let context = ForecastContext::load(config)?;
        let predictor = Predictor::new(&context, config.input.range_policy);

        let input = scenario(context.encoders(), args)?;
        let forecast = predictor.predict(&input)?;

        match format {
            OutputFormat::Table => {
                print!("{}", format_forecast(&input, &forecast));
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "scenario": input,
                    "raw": forecast.raw,
                    "units_sold": forecast.units_sold,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            OutputFormat::Csv => {
                println!("product_type,product_code,region,country,year,month,units_sold");
                println!(
                    "{},{},{},{},{},{},{}",
                    input.product_type,
                    input.product_code,
                    input.region,
                    input.country,
                    input.year,
                    input.month,
                    forecast.units_sold
                );
            }
        }

        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let context = ForecastContext::load(config)?;
        let info = context.model_info();

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Path:      {}", config.artifacts.model_path);
        println!("  Kind:      {}", info.kind);
        println!("  Features:  {}", info.n_features);
        println!("  Detail:    {}", info.detail);

        Ok(())
    }
}
