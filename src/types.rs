//! Core types used throughout BlockCast
//!
//! Defines the hour/block data model, prediction records, and the
//! verification/accuracy vocabulary shared by every module.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of equal-duration sub-intervals in one trading hour. Fixed by design.
pub const BLOCKS_PER_HOUR: usize = 7;

/// Milliseconds in one trading hour.
pub const HOUR_MS: i64 = 3_600_000;

/// Offset of block boundary `i` (0..=7) from the hour start, in milliseconds.
///
/// Block `i` (1-based) covers `[boundary(i-1), boundary(i))`. Boundary 7 is
/// exactly the hour end.
pub fn block_boundary_ms(i: usize) -> i64 {
    (i as i64 * HOUR_MS) / BLOCKS_PER_HOUR as i64
}

/// Ticker identifier as supplied by the data-ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticker(pub String);

impl Ticker {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Ticker {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Predicted / observed direction of an hourly move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Neutral
    }
}

impl Direction {
    /// Direction matching the sign of a deviation. Exact zero has no sign
    /// and maps to Neutral.
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Direction::Up
        } else if value < 0.0 {
            Direction::Down
        } else {
            Direction::Neutral
        }
    }

    /// The opposing direction. Neutral has no opposite.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Neutral => Direction::Neutral,
        }
    }

    pub fn is_directional(&self) -> bool {
        !matches!(self, Direction::Neutral)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
            Direction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Strength label attached to a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStrength {
    Weak,
    Moderate,
    Strong,
}

impl fmt::Display for PredictionStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionStrength::Weak => write!(f, "weak"),
            PredictionStrength::Moderate => write!(f, "moderate"),
            PredictionStrength::Strong => write!(f, "strong"),
        }
    }
}

/// Verification verdict for a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActualResult {
    Pending,
    Correct,
    Wrong,
}

impl Default for ActualResult {
    fn default() -> Self {
        ActualResult::Pending
    }
}

impl fmt::Display for ActualResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActualResult::Pending => write!(f, "PENDING"),
            ActualResult::Correct => write!(f, "CORRECT"),
            ActualResult::Wrong => write!(f, "WRONG"),
        }
    }
}

/// Intraday OHLCV bar as delivered by the ingestion collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open timestamp in milliseconds (UTC epoch)
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// One of the 7 sub-intervals of a trading hour, aggregated to OHLCV
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Block index, 1..=7
    pub index: usize,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Number of underlying bars that landed in this block. Zero means the
    /// block was forward-filled from the prior close.
    pub bar_count: usize,
    /// Close displacement from the hour's reference price, in σ units
    pub deviation_from_open: f64,
}

impl Block {
    /// True if this block holds at least one real bar (not forward-filled)
    pub fn has_data(&self) -> bool {
        self.bar_count > 0
    }
}

/// Initial directional signal from blocks 1-2, fixed for the hour
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EarlyBias {
    pub direction: Direction,
    /// Signed displacement of block-2 close from the reference, in σ units
    pub strength: f64,
}

/// Persistent opposing move across blocks 3-5
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SustainedCounter {
    pub detected: bool,
    pub direction: Direction,
}

impl SustainedCounter {
    pub fn none() -> Self {
        Self {
            detected: false,
            direction: Direction::Neutral,
        }
    }
}

/// A named reference price level supplied by an external calculator
/// (pivots, session opens, kill-zone ranges). Attached verbatim; this core
/// never interprets or scores these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLevel {
    pub name: String,
    pub price: f64,
}

/// Snapshot of reference levels at prediction time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSnapshot {
    pub levels: Vec<ReferenceLevel>,
}

/// The persisted output of one hour's analysis.
///
/// Unique per `(ticker, hour_start)` - the store enforces this. Created at
/// the 5/7 decision point; mutated exactly once when verification resolves
/// `actual_result` from `Pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockPrediction {
    /// Unique prediction ID
    pub id: String,
    pub ticker: Ticker,
    /// Hour window start, milliseconds UTC epoch
    pub hour_start: i64,
    /// When the prediction was emitted. Always strictly after block-5 close
    /// and before any block-6 data exists.
    pub prediction_timestamp: i64,
    pub prediction: Direction,
    /// Confidence score, 0-100
    pub confidence: f64,
    pub prediction_strength: PredictionStrength,
    /// Hour's opening price (block-1 open)
    pub reference_price: f64,
    pub early_bias: Direction,
    pub early_bias_strength: f64,
    pub has_sustained_counter: bool,
    pub counter_direction: Option<Direction>,
    /// Block-5 close deviation in σ units - the decision-point signal
    pub deviation_at_5_7: f64,
    /// σ of hourly returns used for deviation scaling
    pub volatility: f64,
    /// True when σ came from the fallback constant instead of history
    pub volatility_is_fallback: bool,
    /// Snapshot of the hour's blocks at prediction time. Blocks 6-7 hold no
    /// bars yet (`bar_count` 0); only 1-5 informed the decision.
    pub blocks: Vec<Block>,
    /// Contextual levels attached verbatim
    #[serde(default)]
    pub reference_levels: Option<ReferenceSnapshot>,
    pub actual_result: ActualResult,
    /// Actual close of block 7, set at verification
    pub blocks_6_7_close: Option<f64>,
    /// Actual percent change vs reference, set at verification
    pub actual_price_change_pct: Option<f64>,
    /// Verification timestamp, milliseconds UTC epoch
    pub verified_at: Option<i64>,
}

impl BlockPrediction {
    pub fn is_verified(&self) -> bool {
        !matches!(self.actual_result, ActualResult::Pending)
    }

    pub fn hour_start_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.hour_start)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Per-direction slice of an accuracy summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectionAccuracy {
    pub predictions: usize,
    pub verified: usize,
    pub correct: usize,
    /// Percent correct of verified, None when nothing is verified
    pub accuracy_rate: Option<f64>,
}

/// Rolled-up accuracy over a set of predictions for one ticker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub ticker: Ticker,
    pub total: usize,
    pub verified: usize,
    pub pending: usize,
    pub correct: usize,
    /// Percent correct of verified predictions, None = "no data"
    pub accuracy_rate: Option<f64>,
    pub up: DirectionAccuracy,
    pub down: DirectionAccuracy,
    pub neutral: DirectionAccuracy,
}
