//! Sustained Counter Detector - persistent reversal across blocks 3-5
//!
//! A counter is three consecutive blocks all moving against the early bias
//! with non-decreasing magnitude, the last clearing a significance threshold.
//! A later sustained move outranks the earlier bias in the decision engine.

use crate::config::EngineConfig;
use crate::types::{Direction, EarlyBias, SustainedCounter};

/// Inspect the deviation series d3, d4, d5 for a sustained counter-move.
///
/// Skipped entirely when the early bias is Neutral - with no bias there is
/// no opposing direction to detect.
pub fn detect_sustained_counter(
    d3: f64,
    d4: f64,
    d5: f64,
    bias: &EarlyBias,
    config: &EngineConfig,
) -> SustainedCounter {
    if !bias.direction.is_directional() {
        return SustainedCounter::none();
    }

    let opposing = bias.direction.opposite();
    let all_oppose = [d3, d4, d5]
        .iter()
        .all(|d| Direction::from_sign(*d) == opposing);
    let monotonic = d5.abs() >= d4.abs() && d4.abs() >= d3.abs();
    let significant = d5.abs() >= config.counter_significance_threshold;

    if all_oppose && monotonic && significant {
        SustainedCounter {
            detected: true,
            direction: Direction::from_sign(d5),
        }
    } else {
        SustainedCounter::none()
    }
}
