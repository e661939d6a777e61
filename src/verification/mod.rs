//! Verification Engine - closes the loop once blocks 6-7 settle
//!
//! Compares the actual hour close against the reference price and the
//! predicted direction. Runs externally triggered, typically ~15 minutes
//! after hour end. Idempotent: a verified record is never overwritten.

use tracing::{debug, info};

use crate::config::VerificationConfig;
use crate::error::{EngineError, Result};
use crate::types::{block_boundary_ms, ActualResult, Bar, BlockPrediction, Direction};

/// What a verification call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Record transitioned from Pending to Correct/Wrong
    Verified(ActualResult),
    /// Record was already verified; nothing changed
    AlreadyVerified(ActualResult),
}

#[derive(Debug, Clone)]
pub struct VerificationEngine {
    config: VerificationConfig,
}

impl VerificationEngine {
    pub fn new(config: VerificationConfig) -> Self {
        Self { config }
    }

    /// Verify against the actual block-7 close. Re-invocation on a verified
    /// record is a no-op, not an error.
    pub fn verify(
        &self,
        prediction: &mut BlockPrediction,
        actual_close: f64,
        verified_at: i64,
    ) -> VerificationOutcome {
        if prediction.is_verified() {
            debug!(
                id = %prediction.id,
                result = %prediction.actual_result,
                "prediction already verified, skipping"
            );
            return VerificationOutcome::AlreadyVerified(prediction.actual_result);
        }

        let change_pct =
            (actual_close - prediction.reference_price) / prediction.reference_price * 100.0;
        let result = self.judge(prediction.prediction, change_pct);

        prediction.actual_result = result;
        prediction.blocks_6_7_close = Some(actual_close);
        prediction.actual_price_change_pct = Some(change_pct);
        prediction.verified_at = Some(verified_at);

        info!(
            id = %prediction.id,
            ticker = %prediction.ticker,
            hour_start = prediction.hour_start,
            predicted = %prediction.prediction,
            change_pct,
            result = %result,
            "prediction verified"
        );

        VerificationOutcome::Verified(result)
    }

    /// Verify from the hour's raw bars, taking the last close at or past the
    /// block-6 boundary. Analysis-period bars are ignored, so callers may
    /// pass everything received so far; no settled bar yet means retry later.
    pub fn verify_from_bars(
        &self,
        prediction: &mut BlockPrediction,
        bars: &[Bar],
        verified_at: i64,
    ) -> Result<VerificationOutcome> {
        let block6_open = prediction.hour_start + block_boundary_ms(5);
        let actual_close = bars
            .iter()
            .filter(|b| b.ts >= block6_open)
            .last()
            .map(|b| b.close)
            .ok_or_else(|| EngineError::VerificationDataMissing {
                prediction_id: prediction.id.clone(),
                ticker: prediction.ticker.to_string(),
                hour_start: prediction.hour_start,
            })?;
        Ok(self.verify(prediction, actual_close, verified_at))
    }

    /// Map a directional call plus the realized percent move to a verdict.
    ///
    /// A move inside the neutral band never validates a directional call -
    /// the ambiguous case resolves Wrong.
    fn judge(&self, predicted: Direction, change_pct: f64) -> ActualResult {
        let threshold = self.config.neutral_threshold_pct;
        let correct = match predicted {
            Direction::Up => change_pct > threshold,
            Direction::Down => change_pct < -threshold,
            Direction::Neutral => change_pct.abs() <= threshold,
        };
        if correct {
            ActualResult::Correct
        } else {
            ActualResult::Wrong
        }
    }
}
