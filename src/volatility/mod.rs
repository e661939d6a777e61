//! Volatility Estimator - σ of hourly close-to-close returns
//!
//! Feeds the σ-unit deviation scale used everywhere else. Never fails: with
//! too little history it degrades to a configured constant and flags the
//! estimate so downstream consumers can discount confidence.

use tracing::debug;

use crate::config::VolatilityConfig;
use crate::types::Bar;

/// σ estimate over a trailing hourly window
#[derive(Debug, Clone, Copy)]
pub struct VolatilityEstimate {
    /// Sample stdev of hourly close-to-close returns (fractional)
    pub sigma: f64,
    /// Returns that entered the estimate
    pub samples: usize,
    /// True when the fallback constant was used instead of history
    pub is_fallback: bool,
}

impl VolatilityEstimate {
    /// σ converted to price units at a given reference price
    pub fn sigma_price(&self, reference_price: f64) -> f64 {
        self.sigma * reference_price
    }
}

/// Estimate σ from trailing hourly bars (ordered oldest-first).
///
/// Uses at most `lookback_hours` returns from the most recent closes. Fewer
/// than `min_history_hours` usable returns triggers the fallback constant.
pub fn estimate(history: &[Bar], config: &VolatilityConfig) -> VolatilityEstimate {
    let closes: Vec<f64> = history
        .iter()
        .map(|b| b.close)
        .filter(|c| c.is_finite() && *c > 0.0)
        .collect();

    // n returns need n+1 closes
    let take = config.lookback_hours + 1;
    let start = closes.len().saturating_sub(take);
    let window = &closes[start..];

    let returns: Vec<f64> = window
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();

    if returns.len() < config.min_history_hours {
        debug!(
            samples = returns.len(),
            required = config.min_history_hours,
            fallback = config.fallback_value,
            "volatility history too short, using fallback"
        );
        return VolatilityEstimate {
            sigma: config.fallback_value,
            samples: returns.len(),
            is_fallback: true,
        };
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let sigma = var.sqrt();

    // A dead-flat window gives σ=0 which would blow up deviation scaling;
    // the negated comparison also catches a NaN σ from degenerate input
    if !(sigma > f64::EPSILON) {
        return VolatilityEstimate {
            sigma: config.fallback_value,
            samples: returns.len(),
            is_fallback: true,
        };
    }

    VolatilityEstimate {
        sigma,
        samples: returns.len(),
        is_fallback: false,
    }
}
