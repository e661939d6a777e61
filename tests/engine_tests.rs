//! End-to-end tests for the hourly prediction pipeline
//!
//! Drives full hours of synthetic bars through analyze -> verify -> aggregate
//! and checks the documented decision scenarios.

use blockcast::accuracy;
use blockcast::config::{EngineConfig, VerificationConfig, VolatilityConfig};
use blockcast::engine::{HourAnalysisRequest, PredictionEngine};
use blockcast::error::EngineError;
use blockcast::types::{
    block_boundary_ms, ActualResult, Bar, Direction, PredictionStrength, ReferenceLevel,
    ReferenceSnapshot, Ticker, HOUR_MS,
};
use blockcast::verification::{VerificationEngine, VerificationOutcome};

fn flat_bar(ts: i64, price: f64) -> Bar {
    Bar {
        ts,
        open: price,
        high: price,
        low: price,
        close: price,
        volume: 100.0,
    }
}

/// Two flat bars inside each of blocks 1-5, closing at the given prices.
/// With no history the σ fallback is 1% -> σ_price = 1.0 at reference 100,
/// so block closes translate directly into σ deviations.
fn analysis_bars(hour_start: i64, closes: [f64; 5]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .flat_map(|(i, close)| {
            let start = hour_start + block_boundary_ms(i);
            vec![flat_bar(start + 30_000, *close), flat_bar(start + 60_000, *close)]
        })
        .collect()
}

fn engine() -> PredictionEngine {
    PredictionEngine::new(EngineConfig::default(), VolatilityConfig::default())
}

fn verifier() -> VerificationEngine {
    VerificationEngine::new(VerificationConfig::default())
}

fn request(hour_start: i64, closes: [f64; 5]) -> HourAnalysisRequest {
    HourAnalysisRequest {
        ticker: Ticker::from("SPY"),
        hour_start,
        bars: analysis_bars(hour_start, closes),
        history: Vec::new(),
        reference_levels: None,
    }
}

#[test]
fn counter_override_flips_up_bias_to_down() {
    // Reference 100, bias UP at 0.30σ, blocks 3-5 slide -0.20/-0.50/-0.90
    let pred = engine()
        .analyze_hour(&request(0, [100.0, 100.30, 99.80, 99.50, 99.10]))
        .unwrap();

    assert_eq!(pred.early_bias, Direction::Up);
    assert!((pred.early_bias_strength - 0.30).abs() < 1e-9);
    assert!(pred.has_sustained_counter);
    assert_eq!(pred.counter_direction, Some(Direction::Down));
    assert_eq!(pred.prediction, Direction::Down);
    assert_eq!(pred.prediction_strength, PredictionStrength::Moderate);
    assert!((pred.deviation_at_5_7 - (-0.90)).abs() < 1e-9);
}

#[test]
fn confirmed_bias_at_high_deviation_is_strong() {
    // Bias UP at 0.40σ, block 5 pushes to +1.20σ with no counter
    let pred = engine()
        .analyze_hour(&request(0, [100.0, 100.40, 100.60, 100.80, 101.20]))
        .unwrap();

    assert_eq!(pred.early_bias, Direction::Up);
    assert!(!pred.has_sustained_counter);
    assert_eq!(pred.prediction, Direction::Up);
    assert_eq!(pred.prediction_strength, PredictionStrength::Strong);
    assert!(pred.confidence >= 50.0);
    // base 40 + scale 40 * 1.2 = 88
    assert!((pred.confidence - 88.0).abs() < 1e-9);
}

#[test]
fn verification_verdicts_respect_neutral_band() {
    let mut pred = engine()
        .analyze_hour(&request(0, [100.0, 100.40, 100.60, 100.80, 101.20]))
        .unwrap();
    assert_eq!(pred.prediction, Direction::Up);

    // +0.5% actual move clears the 0.1% neutral band
    let outcome = verifier().verify(&mut pred, 100.5, HOUR_MS + 900_000);
    assert_eq!(outcome, VerificationOutcome::Verified(ActualResult::Correct));
    assert!((pred.actual_price_change_pct.unwrap() - 0.5).abs() < 1e-9);

    // Same prediction, -0.05% move inside the band resolves Wrong
    let mut pred = engine()
        .analyze_hour(&request(0, [100.0, 100.40, 100.60, 100.80, 101.20]))
        .unwrap();
    verifier().verify(&mut pred, 99.95, HOUR_MS + 900_000);
    assert_eq!(pred.actual_result, ActualResult::Wrong);
}

#[test]
fn verification_is_idempotent_across_engines() {
    let mut pred = engine()
        .analyze_hour(&request(0, [100.0, 100.40, 100.60, 100.80, 101.20]))
        .unwrap();
    verifier().verify(&mut pred, 100.5, HOUR_MS);
    let snapshot = (pred.actual_result, pred.verified_at, pred.blocks_6_7_close);

    verifier().verify(&mut pred, 80.0, HOUR_MS * 2);
    assert_eq!(
        snapshot,
        (pred.actual_result, pred.verified_at, pred.blocks_6_7_close)
    );
}

#[test]
fn counter_priority_holds_across_inputs() {
    // Whenever a counter is detected the final call follows it
    let cases = [
        [100.0, 100.30, 99.80, 99.50, 99.10], // UP bias, DOWN counter
        [100.0, 99.70, 100.20, 100.50, 100.90], // DOWN bias, UP counter
    ];
    for closes in cases {
        let pred = engine().analyze_hour(&request(0, closes)).unwrap();
        assert!(pred.has_sustained_counter);
        assert_eq!(Some(pred.prediction), pred.counter_direction);
    }
}

#[test]
fn confidence_monotone_under_growing_deviation() {
    let mut last = 0.0;
    for step in 0..12 {
        // Growing confirmed-UP deviation at block 5
        let d5 = 100.3 + step as f64 * 0.2;
        let pred = engine()
            .analyze_hour(&request(0, [100.0, 100.30, 100.40, 100.50, d5]))
            .unwrap();
        assert!(pred.confidence >= last);
        last = pred.confidence;
    }
    assert!(last <= 100.0);
}

#[test]
fn prediction_timestamp_sits_in_decision_window() {
    let hour_start = 1_700_003_600_000i64;
    let pred = engine()
        .analyze_hour(&request(hour_start, [100.0, 100.3, 100.4, 100.5, 100.9]))
        .unwrap();
    assert!(pred.prediction_timestamp > hour_start + block_boundary_ms(5));
    assert!(pred.prediction_timestamp < hour_start + block_boundary_ms(6));
}

#[test]
fn thin_hours_fail_with_data_insufficient() {
    let req = HourAnalysisRequest {
        ticker: Ticker::from("SPY"),
        hour_start: 0,
        bars: vec![flat_bar(1_000, 100.0)], // single bar, block 1 only
        history: Vec::new(),
        reference_levels: None,
    };
    let err = engine().analyze_hour(&req).unwrap_err();
    match err {
        EngineError::DataInsufficient {
            ticker,
            populated_blocks,
            ..
        } => {
            assert_eq!(ticker, "SPY");
            assert_eq!(populated_blocks, 1);
        }
        other => panic!("expected DataInsufficient, got {other:?}"),
    }
}

#[test]
fn reference_levels_attached_verbatim() {
    let snapshot = ReferenceSnapshot {
        levels: vec![
            ReferenceLevel {
                name: "prior_day_high".to_string(),
                price: 102.4,
            },
            ReferenceLevel {
                name: "killzone_london_low".to_string(),
                price: 99.1,
            },
        ],
    };
    let mut req = request(0, [100.0, 100.3, 100.4, 100.5, 100.9]);
    req.reference_levels = Some(snapshot.clone());
    let pred = engine().analyze_hour(&req).unwrap();
    assert_eq!(pred.reference_levels, Some(snapshot));
}

#[test]
fn aggregates_across_verified_hours() {
    let ticker = Ticker::from("SPY");
    let mut predictions = Vec::new();

    // Ten confirmed-UP hours; verify 7 up, 3 flat-to-down
    for i in 0..10i64 {
        let hour_start = i * HOUR_MS;
        let mut pred = engine()
            .analyze_hour(&request(hour_start, [100.0, 100.40, 100.60, 100.80, 101.20]))
            .unwrap();
        let actual_close = if i < 7 { 100.5 } else { 99.95 };
        verifier().verify(&mut pred, actual_close, hour_start + HOUR_MS + 900_000);
        predictions.push(pred);
    }

    let summary = accuracy::summarize(&ticker, &predictions);
    assert_eq!(summary.total, 10);
    assert_eq!(summary.verified, 10);
    assert_eq!(summary.pending, 0);
    assert_eq!(summary.accuracy_rate, Some(70.0));
    assert_eq!(summary.up.predictions, 10);
    assert_eq!(summary.up.accuracy_rate, Some(70.0));

    // Empty input reports no data instead of dividing by zero
    let empty = accuracy::summarize(&ticker, &[]);
    assert_eq!(empty.accuracy_rate, None);
}

#[test]
fn full_cycle_with_late_blocks_from_bars() {
    let hour_start = 0i64;
    let mut bars = analysis_bars(hour_start, [100.0, 100.40, 100.60, 100.80, 101.20]);
    // Blocks 6-7 data arrives later
    let late = vec![
        flat_bar(hour_start + block_boundary_ms(5) + 60_000, 101.0),
        flat_bar(hour_start + block_boundary_ms(6) + 60_000, 100.9),
    ];

    let mut pred = engine()
        .analyze_hour(&HourAnalysisRequest {
            ticker: Ticker::from("SPY"),
            hour_start,
            bars: bars.clone(),
            history: Vec::new(),
            reference_levels: None,
        })
        .unwrap();

    // Before settlement only analysis-period bars exist: nothing to verify
    // against, even though those bars carry closes
    let err = verifier()
        .verify_from_bars(&mut pred, &bars, hour_start + HOUR_MS)
        .unwrap_err();
    assert!(matches!(err, EngineError::VerificationDataMissing { .. }));
    assert_eq!(pred.actual_result, ActualResult::Pending);

    // After settlement the last block-6/7 close decides
    bars.extend(late);
    verifier()
        .verify_from_bars(&mut pred, &bars, hour_start + HOUR_MS + 900_000)
        .unwrap();
    assert_eq!(pred.blocks_6_7_close, Some(100.9));
    assert_eq!(pred.actual_result, ActualResult::Correct); // +0.9% on an UP call
}
