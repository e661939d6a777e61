//! Error taxonomy for the prediction core
//!
//! Every failure carries enough context (ticker, hour, stage) for the caller
//! to log and re-schedule. Volatility shortfall is not an error - it degrades
//! to a flagged fallback constant. Duplicate-prediction conflicts belong to
//! the storage boundary, not this core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Too few usable analysis blocks. Retrying within the same hour will not
    /// produce more data, so the caller should report and move on.
    #[error(
        "insufficient data for {ticker} hour {hour_start}: \
         only {populated_blocks} of 5 analysis blocks contain bars (need at least {required})"
    )]
    DataInsufficient {
        ticker: String,
        hour_start: i64,
        populated_blocks: usize,
        required: usize,
    },

    /// Blocks 6-7 have no close yet. Time-gated: retry once data settles.
    #[error("verification data missing for prediction {prediction_id} ({ticker} hour {hour_start}): retry later")]
    VerificationDataMissing {
        prediction_id: String,
        ticker: String,
        hour_start: i64,
    },

    /// Malformed input: bars outside the half-open hour window or unordered.
    #[error("invalid hour window for {ticker} hour {hour_start}: {detail}")]
    InvalidHourWindow {
        ticker: String,
        hour_start: i64,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
