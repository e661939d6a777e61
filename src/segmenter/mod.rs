//! Block Segmenter - partitions one trading hour into 7 OHLC blocks
//!
//! Each block covers `[hour_start + i*3600/7, hour_start + (i+1)*3600/7)` and
//! aggregates every intraday bar whose timestamp falls inside it. Empty blocks
//! are forward-filled from the prior close so thin data degrades gracefully
//! instead of failing; the hour only errors out when blocks 1-5 are almost
//! entirely empty.

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::types::{block_boundary_ms, Bar, Block, Ticker, BLOCKS_PER_HOUR, HOUR_MS};

/// One hour's bars cut into 7 blocks, deviations already in σ units
#[derive(Debug, Clone)]
pub struct SegmentedHour {
    pub ticker: Ticker,
    /// Hour window start, milliseconds UTC epoch
    pub hour_start: i64,
    /// Hour's opening price = block-1 open
    pub reference_price: f64,
    /// Exactly 7 blocks, index 1..=7
    pub blocks: Vec<Block>,
    /// Analysis blocks (1-5) holding real bars
    pub populated_analysis_blocks: usize,
    /// Analysis blocks below the min-bars threshold (thin but usable)
    pub thin_blocks: usize,
}

impl SegmentedHour {
    /// Block by 1-based index
    pub fn block(&self, index: usize) -> &Block {
        &self.blocks[index - 1]
    }

    /// Deviation of block 5's close - the 5/7 decision-point signal
    pub fn deviation_at_5_7(&self) -> f64 {
        self.block(5).deviation_from_open
    }
}

/// Partition an hour's bars into 7 blocks.
///
/// `sigma_price` is the volatility estimate already scaled to price units;
/// block deviations are `(close - reference) / sigma_price`. Bars must be
/// ordered by timestamp and lie within `[hour_start, hour_start + 1h)`.
pub fn segment_hour(
    ticker: &Ticker,
    hour_start: i64,
    bars: &[Bar],
    sigma_price: f64,
    config: &EngineConfig,
) -> Result<SegmentedHour> {
    validate_bars(ticker, hour_start, bars)?;

    // Bucket bars per block without copying
    let mut buckets: Vec<&[Bar]> = Vec::with_capacity(BLOCKS_PER_HOUR);
    let mut lo = 0;
    for i in 1..=BLOCKS_PER_HOUR {
        let end = hour_start + block_boundary_ms(i);
        let hi = lo + bars[lo..].partition_point(|b| b.ts < end);
        buckets.push(&bars[lo..hi]);
        lo = hi;
    }

    let populated_analysis_blocks = buckets[..5].iter().filter(|b| !b.is_empty()).count();
    if populated_analysis_blocks < config.min_populated_blocks {
        warn!(
            ticker = %ticker,
            hour_start,
            populated = populated_analysis_blocks,
            "hour rejected: too few populated analysis blocks"
        );
        return Err(EngineError::DataInsufficient {
            ticker: ticker.to_string(),
            hour_start,
            populated_blocks: populated_analysis_blocks,
            required: config.min_populated_blocks,
        });
    }

    // Reference price: open of the first real bar of the hour. Leading empty
    // blocks carry this price until data appears.
    let first_open = bars[0].open;
    let mut carry = first_open;
    let mut blocks = Vec::with_capacity(BLOCKS_PER_HOUR);
    let mut thin_blocks = 0;

    for (i, bucket) in buckets.iter().enumerate() {
        let index = i + 1;
        let block = if bucket.is_empty() {
            // Forward-fill: flat block at the carried close, zero volume
            Block {
                index,
                open: carry,
                high: carry,
                low: carry,
                close: carry,
                volume: 0.0,
                bar_count: 0,
                deviation_from_open: 0.0,
            }
        } else {
            aggregate(index, bucket)
        };
        if index <= 5 && block.bar_count > 0 && block.bar_count < config.min_bars_per_block {
            thin_blocks += 1;
        }
        carry = block.close;
        blocks.push(block);
    }

    let reference_price = blocks[0].open;
    for block in &mut blocks {
        block.deviation_from_open = if sigma_price > 0.0 {
            (block.close - reference_price) / sigma_price
        } else {
            0.0
        };
    }

    debug!(
        ticker = %ticker,
        hour_start,
        reference_price,
        populated = populated_analysis_blocks,
        thin = thin_blocks,
        "hour segmented into 7 blocks"
    );

    Ok(SegmentedHour {
        ticker: ticker.clone(),
        hour_start,
        reference_price,
        blocks,
        populated_analysis_blocks,
        thin_blocks,
    })
}

fn aggregate(index: usize, bars: &[Bar]) -> Block {
    let open = bars[0].open;
    let close = bars[bars.len() - 1].close;
    let mut high = f64::MIN;
    let mut low = f64::MAX;
    let mut volume = 0.0;
    for bar in bars {
        high = high.max(bar.high);
        low = low.min(bar.low);
        volume += bar.volume;
    }
    Block {
        index,
        open,
        high,
        low,
        close,
        volume,
        bar_count: bars.len(),
        deviation_from_open: 0.0,
    }
}

fn validate_bars(ticker: &Ticker, hour_start: i64, bars: &[Bar]) -> Result<()> {
    if bars.is_empty() {
        return Err(EngineError::DataInsufficient {
            ticker: ticker.to_string(),
            hour_start,
            populated_blocks: 0,
            required: 1,
        });
    }
    let hour_end = hour_start + HOUR_MS;
    if bars[0].ts < hour_start || bars[bars.len() - 1].ts >= hour_end {
        return Err(EngineError::InvalidHourWindow {
            ticker: ticker.to_string(),
            hour_start,
            detail: format!(
                "bars span [{}, {}] outside [{}, {})",
                bars[0].ts,
                bars[bars.len() - 1].ts,
                hour_start,
                hour_end
            ),
        });
    }
    if bars.windows(2).any(|w| w[0].ts > w[1].ts) {
        return Err(EngineError::InvalidHourWindow {
            ticker: ticker.to_string(),
            hour_start,
            detail: "bars are not ordered by timestamp".to_string(),
        });
    }
    Ok(())
}
