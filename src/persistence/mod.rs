//! CSV Persistence Module
//!
//! Storage boundary for BlockPrediction records. The core stays agnostic to
//! whether its output was persisted; the store enforces the one-record-per
//! `(ticker, hour_start)` rule with insert-if-absent semantics. Block and
//! reference-level detail is strongly typed in memory and flattened to JSON
//! columns only here, at the edge.

use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::types::{
    ActualResult, Block, BlockPrediction, Direction, PredictionStrength, ReferenceSnapshot, Ticker,
};

/// Storage port for prediction records
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Insert unless a record for `(ticker, hour_start)` already exists.
    /// Returns false on conflict (first writer wins, no error).
    async fn insert_if_absent(&self, prediction: &BlockPrediction) -> Result<bool>;

    /// Persist the verification fields of an already-stored prediction.
    /// Returns false when the stored record is already verified or missing.
    async fn apply_verification(&self, prediction: &BlockPrediction) -> Result<bool>;

    /// All stored predictions for a ticker, ordered by hour start
    async fn load_ticker(&self, ticker: &Ticker) -> Result<Vec<BlockPrediction>>;
}

/// Flat CSV row; blocks and reference levels ride along as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PredictionRow {
    id: String,
    ticker: String,
    hour_start: i64,
    prediction_timestamp: i64,
    prediction: String,
    confidence: f64,
    prediction_strength: String,
    reference_price: f64,
    early_bias: String,
    early_bias_strength: f64,
    has_sustained_counter: bool,
    counter_direction: Option<String>,
    deviation_at_5_7: f64,
    volatility: f64,
    volatility_is_fallback: bool,
    blocks_json: String,
    reference_levels_json: Option<String>,
    actual_result: String,
    blocks_6_7_close: Option<f64>,
    actual_price_change_pct: Option<f64>,
    verified_at: Option<i64>,
}

impl PredictionRow {
    fn from_prediction(p: &BlockPrediction) -> Result<Self> {
        Ok(Self {
            id: p.id.clone(),
            ticker: p.ticker.to_string(),
            hour_start: p.hour_start,
            prediction_timestamp: p.prediction_timestamp,
            prediction: p.prediction.to_string(),
            confidence: p.confidence,
            prediction_strength: p.prediction_strength.to_string(),
            reference_price: p.reference_price,
            early_bias: p.early_bias.to_string(),
            early_bias_strength: p.early_bias_strength,
            has_sustained_counter: p.has_sustained_counter,
            counter_direction: p.counter_direction.map(|d| d.to_string()),
            deviation_at_5_7: p.deviation_at_5_7,
            volatility: p.volatility,
            volatility_is_fallback: p.volatility_is_fallback,
            blocks_json: serde_json::to_string(&p.blocks)
                .context("Failed to serialize blocks")?,
            reference_levels_json: p
                .reference_levels
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("Failed to serialize reference levels")?,
            actual_result: p.actual_result.to_string(),
            blocks_6_7_close: p.blocks_6_7_close,
            actual_price_change_pct: p.actual_price_change_pct,
            verified_at: p.verified_at,
        })
    }

    fn into_prediction(self) -> Result<BlockPrediction> {
        let blocks: Vec<Block> = serde_json::from_str(&self.blocks_json)
            .context("Failed to deserialize blocks")?;
        let reference_levels: Option<ReferenceSnapshot> = self
            .reference_levels_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("Failed to deserialize reference levels")?;
        Ok(BlockPrediction {
            id: self.id,
            ticker: Ticker::new(self.ticker),
            hour_start: self.hour_start,
            prediction_timestamp: self.prediction_timestamp,
            prediction: parse_direction(&self.prediction)?,
            confidence: self.confidence,
            prediction_strength: parse_strength(&self.prediction_strength)?,
            reference_price: self.reference_price,
            early_bias: parse_direction(&self.early_bias)?,
            early_bias_strength: self.early_bias_strength,
            has_sustained_counter: self.has_sustained_counter,
            counter_direction: self
                .counter_direction
                .as_deref()
                .map(parse_direction)
                .transpose()?,
            deviation_at_5_7: self.deviation_at_5_7,
            volatility: self.volatility,
            volatility_is_fallback: self.volatility_is_fallback,
            blocks,
            reference_levels,
            actual_result: parse_result(&self.actual_result)?,
            blocks_6_7_close: self.blocks_6_7_close,
            actual_price_change_pct: self.actual_price_change_pct,
            verified_at: self.verified_at,
        })
    }
}

fn parse_direction(s: &str) -> Result<Direction> {
    match s {
        "UP" => Ok(Direction::Up),
        "DOWN" => Ok(Direction::Down),
        "NEUTRAL" => Ok(Direction::Neutral),
        other => anyhow::bail!("unknown direction {other:?}"),
    }
}

fn parse_strength(s: &str) -> Result<PredictionStrength> {
    match s {
        "weak" => Ok(PredictionStrength::Weak),
        "moderate" => Ok(PredictionStrength::Moderate),
        "strong" => Ok(PredictionStrength::Strong),
        other => anyhow::bail!("unknown strength {other:?}"),
    }
}

fn parse_result(s: &str) -> Result<ActualResult> {
    match s {
        "PENDING" => Ok(ActualResult::Pending),
        "CORRECT" => Ok(ActualResult::Correct),
        "WRONG" => Ok(ActualResult::Wrong),
        other => anyhow::bail!("unknown result {other:?}"),
    }
}

/// CSV-backed prediction store. One file, rewritten on verification updates,
/// all access serialized through a mutex.
pub struct CsvPredictionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvPredictionStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data dir {}", dir.display()))?;
        Ok(Self {
            path: dir.join("predictions.csv"),
            lock: Mutex::new(()),
        })
    }

    fn read_rows(&self) -> Result<Vec<PredictionRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            match record {
                Ok(row) => rows.push(row),
                Err(e) => warn!(error = %e, "skipping malformed prediction row"),
            }
        }
        Ok(rows)
    }

    fn write_rows(&self, rows: &[PredictionRow]) -> Result<()> {
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = WriterBuilder::new()
                .has_headers(true)
                .from_path(&tmp)
                .with_context(|| format!("Failed to write {}", tmp.display()))?;
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path).context("Failed to replace predictions file")?;
        Ok(())
    }
}

#[async_trait]
impl PredictionStore for CsvPredictionStore {
    async fn insert_if_absent(&self, prediction: &BlockPrediction) -> Result<bool> {
        let _guard = self.lock.lock().expect("store lock poisoned");
        let mut rows = self.read_rows()?;
        let exists = rows.iter().any(|r| {
            r.ticker == prediction.ticker.as_str() && r.hour_start == prediction.hour_start
        });
        if exists {
            info!(
                ticker = %prediction.ticker,
                hour_start = prediction.hour_start,
                "prediction already stored, keeping first writer"
            );
            return Ok(false);
        }
        rows.push(PredictionRow::from_prediction(prediction)?);
        self.write_rows(&rows)?;
        Ok(true)
    }

    async fn apply_verification(&self, prediction: &BlockPrediction) -> Result<bool> {
        let _guard = self.lock.lock().expect("store lock poisoned");
        let mut rows = self.read_rows()?;
        let Some(row) = rows.iter_mut().find(|r| r.id == prediction.id) else {
            warn!(id = %prediction.id, "verification update for unknown prediction");
            return Ok(false);
        };
        if row.actual_result != ActualResult::Pending.to_string() {
            return Ok(false);
        }
        row.actual_result = prediction.actual_result.to_string();
        row.blocks_6_7_close = prediction.blocks_6_7_close;
        row.actual_price_change_pct = prediction.actual_price_change_pct;
        row.verified_at = prediction.verified_at;
        self.write_rows(&rows)?;
        Ok(true)
    }

    async fn load_ticker(&self, ticker: &Ticker) -> Result<Vec<BlockPrediction>> {
        let _guard = self.lock.lock().expect("store lock poisoned");
        let mut predictions: Vec<BlockPrediction> = self
            .read_rows()?
            .into_iter()
            .filter(|r| r.ticker == ticker.as_str())
            .map(PredictionRow::into_prediction)
            .collect::<Result<_>>()?;
        predictions.sort_by_key(|p| p.hour_start);
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_prediction(ticker: &str, hour_start: i64) -> BlockPrediction {
        BlockPrediction {
            id: format!("{ticker}-{hour_start}"),
            ticker: Ticker::from(ticker),
            hour_start,
            prediction_timestamp: hour_start + 2_571_429,
            prediction: Direction::Up,
            confidence: 72.0,
            prediction_strength: PredictionStrength::Moderate,
            reference_price: 100.0,
            early_bias: Direction::Up,
            early_bias_strength: 0.3,
            has_sustained_counter: false,
            counter_direction: None,
            deviation_at_5_7: 0.8,
            volatility: 0.012,
            volatility_is_fallback: false,
            blocks: vec![Block {
                index: 1,
                open: 100.0,
                high: 100.5,
                low: 99.8,
                close: 100.2,
                volume: 1200.0,
                bar_count: 8,
                deviation_from_open: 0.2,
            }],
            reference_levels: Some(ReferenceSnapshot {
                levels: vec![crate::types::ReferenceLevel {
                    name: "prior_day_high".to_string(),
                    price: 101.3,
                }],
            }),
            actual_result: ActualResult::Pending,
            blocks_6_7_close: None,
            actual_price_change_pct: None,
            verified_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = CsvPredictionStore::new(dir.path()).unwrap();

        let pred = sample_prediction("SPY", 1_000_000);
        assert!(store.insert_if_absent(&pred).await.unwrap());

        let loaded = store.load_ticker(&Ticker::from("SPY")).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, pred.id);
        assert_eq!(loaded[0].prediction, Direction::Up);
        assert_eq!(loaded[0].blocks.len(), 1);
        assert_eq!(
            loaded[0].reference_levels.as_ref().unwrap().levels[0].name,
            "prior_day_high"
        );
    }

    #[tokio::test]
    async fn test_duplicate_hour_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = CsvPredictionStore::new(dir.path()).unwrap();

        let first = sample_prediction("SPY", 1_000_000);
        let mut second = sample_prediction("SPY", 1_000_000);
        second.id = "other-id".to_string();
        second.prediction = Direction::Down;

        assert!(store.insert_if_absent(&first).await.unwrap());
        assert!(!store.insert_if_absent(&second).await.unwrap());

        let loaded = store.load_ticker(&Ticker::from("SPY")).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, first.id);
    }

    #[tokio::test]
    async fn test_verification_update_applied_once() {
        let dir = TempDir::new().unwrap();
        let store = CsvPredictionStore::new(dir.path()).unwrap();

        let mut pred = sample_prediction("SPY", 1_000_000);
        store.insert_if_absent(&pred).await.unwrap();

        pred.actual_result = ActualResult::Correct;
        pred.blocks_6_7_close = Some(100.6);
        pred.actual_price_change_pct = Some(0.6);
        pred.verified_at = Some(5_000_000);
        assert!(store.apply_verification(&pred).await.unwrap());

        // Second application is a no-op
        pred.actual_result = ActualResult::Wrong;
        assert!(!store.apply_verification(&pred).await.unwrap());

        let loaded = store.load_ticker(&Ticker::from("SPY")).await.unwrap();
        assert_eq!(loaded[0].actual_result, ActualResult::Correct);
        assert_eq!(loaded[0].verified_at, Some(5_000_000));
    }
}
