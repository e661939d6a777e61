//! Prediction Engine - one hour, one prediction
//!
//! Wires volatility estimation, segmentation, bias/counter analysis and the
//! decision engine into a single deterministic call. Reads only blocks 1-5
//! plus the trailing history the caller supplies; blocks 6-7 stay untouched
//! until verification. Construction of the output record is all-or-nothing.

use tracing::info;
use uuid::Uuid;

use crate::analysis::{compute_early_bias, decide, detect_sustained_counter};
use crate::config::{EngineConfig, VolatilityConfig};
use crate::error::Result;
use crate::segmenter::segment_hour;
use crate::types::{
    block_boundary_ms, ActualResult, Bar, BlockPrediction, ReferenceSnapshot, Ticker,
};
use crate::volatility;

/// Everything one hour's analysis needs. The engine holds no other state.
#[derive(Debug, Clone)]
pub struct HourAnalysisRequest {
    pub ticker: Ticker,
    /// Hour window start, milliseconds UTC epoch
    pub hour_start: i64,
    /// Intraday bars covering `[hour_start, hour_start + 1h)`, ordered.
    /// Only bars up to the 5/7 point are read; later bars are ignored here.
    pub bars: Vec<Bar>,
    /// Trailing hourly bars for the σ estimate, ordered oldest-first
    pub history: Vec<Bar>,
    /// Optional named price levels, attached verbatim
    pub reference_levels: Option<ReferenceSnapshot>,
}

/// Stateless per-hour analyzer. Cheap to clone; analyses for different
/// tickers or hours may run fully in parallel.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    engine: EngineConfig,
    volatility: VolatilityConfig,
}

impl PredictionEngine {
    pub fn new(engine: EngineConfig, volatility: VolatilityConfig) -> Self {
        Self { engine, volatility }
    }

    /// Analyze one hour and emit its BlockPrediction.
    ///
    /// Deterministic: identical bars + config yield a bit-identical decision.
    /// The prediction timestamp is pinned 1ms past block-5 close, inside the
    /// window before any block-6 bar can exist.
    pub fn analyze_hour(&self, request: &HourAnalysisRequest) -> Result<BlockPrediction> {
        let HourAnalysisRequest {
            ticker,
            hour_start,
            bars,
            history,
            reference_levels,
        } = request;

        // Blocks 6-7 must never leak into the analysis
        let decision_point = hour_start + block_boundary_ms(5);
        let analysis_bars: Vec<Bar> = bars
            .iter()
            .filter(|b| b.ts < decision_point)
            .cloned()
            .collect();

        let vol = volatility::estimate(history, &self.volatility);

        // σ in price units needs the reference price, which segmentation
        // derives. First bar's open is that price by construction.
        let reference_hint = analysis_bars.first().map(|b| b.open).unwrap_or(0.0);
        let sigma_price = vol.sigma_price(reference_hint);

        let hour = segment_hour(ticker, *hour_start, &analysis_bars, sigma_price, &self.engine)?;

        let bias = compute_early_bias(hour.block(2).deviation_from_open, &self.engine);
        let counter = detect_sustained_counter(
            hour.block(3).deviation_from_open,
            hour.block(4).deviation_from_open,
            hour.block(5).deviation_from_open,
            &bias,
            &self.engine,
        );
        let deviation_at_5_7 = hour.deviation_at_5_7();
        let decision = decide(deviation_at_5_7, &bias, &counter, &self.engine);

        info!(
            ticker = %ticker,
            hour_start,
            prediction = %decision.direction,
            confidence = decision.confidence,
            strength = %decision.strength,
            bias = %bias.direction,
            counter = counter.detected,
            deviation_at_5_7,
            volatility = vol.sigma,
            fallback = vol.is_fallback,
            "hourly prediction emitted"
        );

        Ok(BlockPrediction {
            id: Uuid::new_v4().to_string(),
            ticker: ticker.clone(),
            hour_start: *hour_start,
            prediction_timestamp: decision_point + 1,
            prediction: decision.direction,
            confidence: decision.confidence,
            prediction_strength: decision.strength,
            reference_price: hour.reference_price,
            early_bias: bias.direction,
            early_bias_strength: bias.strength,
            has_sustained_counter: counter.detected,
            counter_direction: counter.detected.then_some(counter.direction),
            deviation_at_5_7,
            volatility: vol.sigma,
            volatility_is_fallback: vol.is_fallback,
            blocks: hour.blocks,
            reference_levels: reference_levels.clone(),
            actual_result: ActualResult::Pending,
            blocks_6_7_close: None,
            actual_price_change_pct: None,
            verified_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, HOUR_MS};

    fn make_bar(ts: i64, price: f64) -> Bar {
        Bar {
            ts,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 50.0,
        }
    }

    /// One flat bar near the middle of each of blocks 1-5
    fn bars_with_block_closes(hour_start: i64, closes: [f64; 5]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .flat_map(|(i, close)| {
                let start = hour_start + block_boundary_ms(i);
                // Two bars per block so min_bars_per_block is satisfied
                vec![
                    make_bar(start + 1_000, *close),
                    make_bar(start + 2_000, *close),
                ]
            })
            .collect()
    }

    fn engine() -> PredictionEngine {
        PredictionEngine::new(EngineConfig::default(), VolatilityConfig::default())
    }

    fn request(hour_start: i64, closes: [f64; 5]) -> HourAnalysisRequest {
        HourAnalysisRequest {
            ticker: Ticker::from("SPY"),
            hour_start,
            bars: bars_with_block_closes(hour_start, closes),
            history: Vec::new(), // short history -> deterministic 1% fallback σ
            reference_levels: None,
        }
    }

    #[test]
    fn test_prediction_timestamp_in_decision_window() {
        let hour_start = 1_700_000_400_000i64;
        let pred = engine()
            .analyze_hour(&request(hour_start, [100.0, 100.3, 100.4, 100.5, 100.9]))
            .unwrap();
        let block5_close = hour_start + block_boundary_ms(5);
        let block6_end = hour_start + block_boundary_ms(6);
        assert!(pred.prediction_timestamp > block5_close);
        assert!(pred.prediction_timestamp < block6_end);
    }

    #[test]
    fn test_block_6_7_bars_ignored() {
        let hour_start = 0i64;
        let mut req = request(hour_start, [100.0, 100.3, 100.4, 100.5, 100.9]);
        let baseline = engine().analyze_hour(&req).unwrap();

        // A violent late move must not change the decision
        req.bars.push(make_bar(block_boundary_ms(6) + 1_000, 50.0));
        let with_late_bars = engine().analyze_hour(&req).unwrap();

        assert_eq!(baseline.prediction, with_late_bars.prediction);
        assert_eq!(baseline.confidence, with_late_bars.confidence);
        assert_eq!(baseline.deviation_at_5_7, with_late_bars.deviation_at_5_7);
    }

    #[test]
    fn test_deterministic_given_same_input() {
        let req = request(0, [100.0, 99.6, 99.5, 99.3, 99.0]);
        let a = engine().analyze_hour(&req).unwrap();
        let b = engine().analyze_hour(&req).unwrap();
        assert_eq!(a.prediction, b.prediction);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.early_bias, b.early_bias);
        assert_eq!(a.has_sustained_counter, b.has_sustained_counter);
        assert_eq!(a.prediction_timestamp, b.prediction_timestamp);
    }

    #[test]
    fn test_fallback_volatility_flagged() {
        let pred = engine()
            .analyze_hour(&request(0, [100.0, 100.5, 100.6, 100.7, 101.0]))
            .unwrap();
        assert!(pred.volatility_is_fallback);
        assert_eq!(pred.volatility, VolatilityConfig::default().fallback_value);
    }

    #[test]
    fn test_counter_override_scenario() {
        // Reference 100, fallback σ gives σ_price = 1.0: bias UP at 0.30,
        // blocks 3-5 slide to -0.90.
        let pred = engine()
            .analyze_hour(&request(0, [100.0, 100.30, 99.80, 99.50, 99.10]))
            .unwrap();
        assert_eq!(pred.early_bias, Direction::Up);
        assert!((pred.early_bias_strength - 0.30).abs() < 1e-9);
        assert!(pred.has_sustained_counter);
        assert_eq!(pred.counter_direction, Some(Direction::Down));
        assert_eq!(pred.prediction, Direction::Down);
    }

    #[test]
    fn test_history_drives_sigma() {
        let mut history = Vec::new();
        let mut close = 100.0;
        for i in 0..30i64 {
            history.push(Bar {
                ts: i * HOUR_MS,
                open: close,
                high: close,
                low: close,
                close,
                volume: 10.0,
            });
            close *= if i % 2 == 0 { 1.02 } else { 0.98 };
        }
        let mut req = request(0, [100.0, 100.3, 100.4, 100.5, 100.9]);
        req.history = history;
        let pred = engine().analyze_hour(&req).unwrap();
        assert!(!pred.volatility_is_fallback);
        // Wilder history -> bigger σ -> smaller deviations than fallback case
        assert!(pred.deviation_at_5_7 < 0.9);
    }
}
