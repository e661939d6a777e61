//! Early Bias Analyzer - directional read on blocks 1-2
//!
//! The bias is the displacement of block 2's close from the hour's reference
//! price in σ units. Computed once per hour and never revised.

use crate::config::EngineConfig;
use crate::types::{Direction, EarlyBias};

/// Derive the early bias from block 2's σ-unit deviation.
///
/// Strengths inside `±neutral_bias_epsilon` read as Neutral: a sub-threshold
/// drift in the first two blocks carries no directional information.
pub fn compute_early_bias(block2_deviation: f64, config: &EngineConfig) -> EarlyBias {
    let eps = config.neutral_bias_epsilon;
    let direction = if block2_deviation >= eps {
        Direction::Up
    } else if block2_deviation <= -eps {
        Direction::Down
    } else {
        Direction::Neutral
    };
    EarlyBias {
        direction,
        strength: block2_deviation,
    }
}
