//! One-shot hour analysis from CSV bar files.
//!
//! Usage: analyze-hour <TICKER> <HOUR_START_MS> <BARS_CSV> [HISTORY_CSV]
//!
//! The scheduler collaborator owns invocation timing; this binary is the
//! trigger contract made concrete for manual runs and operational checks.

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use blockcast::config::AppConfig;
use blockcast::engine::{HourAnalysisRequest, PredictionEngine};
use blockcast::persistence::{CsvPredictionStore, PredictionStore};
use blockcast::types::{Bar, Ticker};

fn read_bars(path: &str) -> Result<Vec<Bar>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open bar file {path}"))?;
    let mut bars = Vec::new();
    for record in reader.deserialize() {
        bars.push(record.with_context(|| format!("Malformed bar row in {path}"))?);
    }
    Ok(bars)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("blockcast=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        bail!("usage: analyze-hour <TICKER> <HOUR_START_MS> <BARS_CSV> [HISTORY_CSV]");
    }
    let ticker = Ticker::from(args[1].as_str());
    let hour_start: i64 = args[2]
        .parse()
        .context("HOUR_START_MS must be a millisecond epoch timestamp")?;
    let bars = read_bars(&args[3])?;
    let history = match args.get(4) {
        Some(path) => read_bars(path)?,
        None => Vec::new(),
    };

    let config = AppConfig::load()?;
    info!(config = %config.digest(), "configuration loaded");

    let engine = PredictionEngine::new(config.engine.clone(), config.volatility.clone());
    let prediction = engine.analyze_hour(&HourAnalysisRequest {
        ticker,
        hour_start,
        bars,
        history,
        reference_levels: None,
    })?;

    info!(
        id = %prediction.id,
        hour = %prediction.hour_start_utc(),
        prediction = %prediction.prediction,
        confidence = prediction.confidence,
        "hour analyzed"
    );
    println!("{}", serde_json::to_string_pretty(&prediction)?);

    if config.persistence.csv_enabled {
        let store = CsvPredictionStore::new(&config.persistence.data_dir)?;
        let inserted = store.insert_if_absent(&prediction).await?;
        info!(
            id = %prediction.id,
            inserted,
            "prediction handed to store"
        );
    }

    Ok(())
}
