//! Deviation Scorer & Decision Engine - the 5/7-point call
//!
//! Combines early bias, sustained counter, and block-5 deviation into the
//! final direction / strength / confidence triple. Fixed priority order:
//! counter override, then confirmed bias, then neutral. Pure function.

use crate::config::EngineConfig;
use crate::types::{Direction, EarlyBias, PredictionStrength, SustainedCounter};

/// Final decision emitted at the 5/7 point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub direction: Direction,
    pub strength: PredictionStrength,
    /// 0-100
    pub confidence: f64,
}

/// Evaluate the decision tree for one hour.
///
/// `deviation_at_5_7` is block 5's close deviation in σ units. Confidence is
/// monotone non-decreasing in |d5| for fixed bias/counter inputs.
pub fn decide(
    deviation_at_5_7: f64,
    bias: &EarlyBias,
    counter: &SustainedCounter,
    config: &EngineConfig,
) -> Decision {
    let magnitude = deviation_at_5_7.abs();
    let raw_confidence =
        (config.confidence_base + config.confidence_scale * magnitude).min(100.0);

    // 1. Counter override: the later sustained move outweighs the early bias,
    //    at reduced certainty.
    if counter.detected {
        let confidence = (raw_confidence * config.counter_confidence_discount)
            .max(config.minimum_confidence_floor)
            .min(100.0);
        return Decision {
            direction: counter.direction,
            strength: PredictionStrength::Moderate,
            confidence,
        };
    }

    // 2. Confirmed bias: block 5 still points the way blocks 1-2 did.
    if bias.direction.is_directional()
        && Direction::from_sign(deviation_at_5_7) == bias.direction
    {
        let strength = if magnitude >= config.strong_deviation_threshold {
            PredictionStrength::Strong
        } else {
            PredictionStrength::Moderate
        };
        let confidence = raw_confidence.max(config.minimum_confidence_floor).min(100.0);
        return Decision {
            direction: bias.direction,
            strength,
            confidence,
        };
    }

    // 3. Unconfirmed or neutral: no directional call, no confidence floor.
    Decision {
        direction: Direction::Neutral,
        strength: PredictionStrength::Weak,
        confidence: raw_confidence,
    }
}
