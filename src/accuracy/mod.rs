//! Accuracy Aggregator - stateless rollup of verified predictions
//!
//! Pending records are counted but excluded from the rate; zero verified
//! records report as "no data" (None) rather than dividing by zero.

use crate::types::{AccuracySummary, ActualResult, BlockPrediction, Direction, DirectionAccuracy, Ticker};

/// Summarize accuracy for one ticker over a set of predictions.
///
/// Predictions for other tickers are ignored so callers can pass a mixed
/// batch straight from the store.
pub fn summarize(ticker: &Ticker, predictions: &[BlockPrediction]) -> AccuracySummary {
    let mut summary = AccuracySummary {
        ticker: ticker.clone(),
        total: 0,
        verified: 0,
        pending: 0,
        correct: 0,
        accuracy_rate: None,
        up: DirectionAccuracy::default(),
        down: DirectionAccuracy::default(),
        neutral: DirectionAccuracy::default(),
    };

    for pred in predictions.iter().filter(|p| &p.ticker == ticker) {
        summary.total += 1;
        let slot = match pred.prediction {
            Direction::Up => &mut summary.up,
            Direction::Down => &mut summary.down,
            Direction::Neutral => &mut summary.neutral,
        };
        slot.predictions += 1;

        match pred.actual_result {
            ActualResult::Pending => summary.pending += 1,
            ActualResult::Correct => {
                summary.verified += 1;
                summary.correct += 1;
                slot.verified += 1;
                slot.correct += 1;
            }
            ActualResult::Wrong => {
                summary.verified += 1;
                slot.verified += 1;
            }
        }
    }

    summary.accuracy_rate = rate(summary.correct, summary.verified);
    for slot in [&mut summary.up, &mut summary.down, &mut summary.neutral] {
        slot.accuracy_rate = rate(slot.correct, slot.verified);
    }
    summary
}

/// Summarize only predictions inside `[from_ms, to_ms)` by hour start.
pub fn summarize_window(
    ticker: &Ticker,
    predictions: &[BlockPrediction],
    from_ms: i64,
    to_ms: i64,
) -> AccuracySummary {
    let windowed: Vec<BlockPrediction> = predictions
        .iter()
        .filter(|p| p.hour_start >= from_ms && p.hour_start < to_ms)
        .cloned()
        .collect();
    summarize(ticker, &windowed)
}

fn rate(correct: usize, verified: usize) -> Option<f64> {
    if verified == 0 {
        None
    } else {
        Some(correct as f64 / verified as f64 * 100.0)
    }
}
