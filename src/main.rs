use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use substance_tracker::config::{EngineConfig, Sex, UserProfile};
use substance_tracker::dosing::{filter_substance, load_doses_with_weight, DoseRecord, Substance};
use substance_tracker::output::{self, Exports};
use substance_tracker::residual::ResidualLoadAggregator;
use substance_tracker::simulation::{CombinedCalculator, SubstanceEngine};

const CHART_DAYS_BEFORE: i64 = 7;
const CHART_DAYS_AFTER: i64 = 3;

#[derive(Parser)]
#[command(name = "substance-tracker")]
#[command(about = "Concentration and effect estimates from a personal dose history")]
struct Cli {
    /// Dose history (JSON array of dose records)
    #[arg(short, long)]
    doses: PathBuf,

    /// Substance tag, e.g. caffeine, alcohol, paracetamol
    #[arg(short, long)]
    substance: String,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Engine configuration overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Evaluation instant (RFC 3339), defaults to now
    #[arg(long)]
    at: Option<DateTime<Utc>>,

    /// Body weight in kg, used for doses stored without one
    #[arg(short, long, default_value = "72")]
    weight: f64,

    /// male, female or unspecified
    #[arg(long, default_value = "unspecified")]
    sex: String,

    /// Usual beverage, sets the alcohol absorption time
    #[arg(short, long, default_value = "")]
    beverage: String,

    /// Number of chart intervals
    #[arg(short, long, default_value = "480")]
    points: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let Some(substance) = Substance::from_tag(&cli.substance) else {
        bail!("Unknown substance '{}'", cli.substance);
    };
    let at = cli.at.unwrap_or_else(Utc::now);

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => EngineConfig::default(),
    };
    let profile = UserProfile {
        weight_kg: cli.weight,
        sex: Sex::parse(&cli.sex),
        beverage: cli.beverage.clone(),
    };

    let history = load_doses_with_weight(&cli.doses, profile.weight_kg)
        .with_context(|| format!("Failed to load doses from {:?}", cli.doses))?;
    let doses: Vec<DoseRecord> = filter_substance(&history, substance).cloned().collect();
    if doses.is_empty() {
        warn!("No {} doses in {:?}", substance, cli.doses);
    }
    info!("Evaluating {} {} doses at {}", doses.len(), substance, at);

    let engine = SubstanceEngine::new(substance, &config, &profile)?;
    let status = engine.status(&doses, at);
    let start = at - Duration::days(CHART_DAYS_BEFORE);
    let end = at + Duration::days(CHART_DAYS_AFTER);
    let chart = engine.chart(&doses, start, end, cli.points)?;

    let residual = ResidualLoadAggregator::new(&config)
        .snapshots(&doses, substance, start, at, Duration::hours(1))?;

    let combined = match substance {
        Substance::Paracetamol | Substance::Ibuprofen => {
            let calculator = CombinedCalculator::new(&config, &profile)?;
            let pain_relief: Vec<DoseRecord> = history
                .iter()
                .filter(|dose| dose.is_substance(Substance::Paracetamol) || dose.is_substance(Substance::Ibuprofen))
                .cloned()
                .collect();
            info!(
                "Combined pain relief at {}: {:.1} % ({:?})",
                at,
                calculator.effect_percent(&pain_relief, at),
                calculator.combined_level(&pain_relief, at)
            );
            Some(calculator.effect_series(&pain_relief, start, end, cli.points)?)
        }
        _ => None,
    };

    info!(
        "{}: {:.3} {}, effect {:.1} % ({:?})",
        substance.display_name(),
        status.concentration,
        status.concentration_unit,
        status.effect_percent,
        status.level
    );
    match status.effect_end {
        Some(end) => info!("Effect below threshold from {}", end),
        None => info!("Effect persists beyond the prediction horizon"),
    }

    std::fs::create_dir_all(&cli.output)?;
    let exports = Exports {
        status: &status,
        chart: &chart,
        residual: &residual,
        combined: combined.as_deref(),
    };
    output::save_results(&exports, &cli.output)?;
    info!("Results saved to {:?}", cli.output);

    Ok(())
}
