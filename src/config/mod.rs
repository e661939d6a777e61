//! Configuration management for BlockCast
//!
//! Loads from YAML files + environment variables via .env

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::types::BLOCKS_PER_HOUR;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSection,
    pub engine: EngineConfig,
    pub volatility: VolatilityConfig,
    pub verification: VerificationConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    /// Version tag for logging and CSV
    pub tag: String,
    /// Tickers to analyze
    pub tickers: Vec<String>,
}

/// Decision-engine parameters. All thresholds are in σ units unless noted;
/// treat them as tunable, validated empirically rather than fixed constants.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Number of sub-intervals per hour. Recognized for forward compatibility
    /// but must equal 7.
    pub blocks_per_hour: usize,
    /// Dead zone around zero for the early bias direction
    pub neutral_bias_epsilon: f64,
    /// Minimum |d5| for a sustained counter to register
    pub counter_significance_threshold: f64,
    /// |d5| at which a confirmed bias is labeled strong
    pub strong_deviation_threshold: f64,
    /// Confidence multiplier applied on a counter override (mid-hour reversal)
    pub counter_confidence_discount: f64,
    /// Minimum confidence reported for non-NEUTRAL predictions
    pub minimum_confidence_floor: f64,
    /// Confidence intercept: confidence = base + scale * |d5|, capped at 100
    pub confidence_base: f64,
    /// Confidence slope per σ of |d5|
    pub confidence_scale: f64,
    /// Bars required for a block to count as statistically usable
    pub min_bars_per_block: usize,
    /// Analysis blocks (1-5) that must hold real bars, else DataInsufficient
    pub min_populated_blocks: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolatilityConfig {
    /// Trailing hours of close-to-close returns for the σ estimate
    pub lookback_hours: usize,
    /// Minimum usable returns before falling back to the constant
    pub min_history_hours: usize,
    /// Fallback σ (fractional hourly return, e.g. 0.01 = 1%)
    pub fallback_value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// Neutral band around the reference, in percent (0.1 = 0.1%)
    pub neutral_threshold_pct: f64,
    /// Suggested settle delay after hour end before verifying, seconds.
    /// The scheduler owns the actual timing; this is advisory only.
    pub settle_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory for CSV output
    pub data_dir: String,
    /// Enable CSV prediction logging
    pub csv_enabled: bool,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // App defaults
            .set_default("app.tag", env!("CARGO_PKG_VERSION"))?
            .set_default("app.tickers", vec!["SPY"])?
            // Engine defaults
            .set_default("engine.blocks_per_hour", 7)?
            .set_default("engine.neutral_bias_epsilon", 0.15)?
            .set_default("engine.counter_significance_threshold", 0.3)?
            .set_default("engine.strong_deviation_threshold", 0.75)?
            .set_default("engine.counter_confidence_discount", 0.8)?
            .set_default("engine.minimum_confidence_floor", 50.0)?
            .set_default("engine.confidence_base", 40.0)?
            .set_default("engine.confidence_scale", 40.0)?
            .set_default("engine.min_bars_per_block", 2)?
            .set_default("engine.min_populated_blocks", 2)?
            // Volatility defaults
            .set_default("volatility.lookback_hours", 20)?
            .set_default("volatility.min_history_hours", 5)?
            .set_default("volatility.fallback_value", 0.01)?
            // Verification defaults
            .set_default("verification.neutral_threshold_pct", 0.1)?
            .set_default("verification.settle_delay_secs", 900)?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.csv_enabled", true)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (BLOCKCAST_*)
            .add_source(Environment::with_prefix("BLOCKCAST").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject values the analysis cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.engine.blocks_per_hour != BLOCKS_PER_HOUR {
            bail!(
                "engine.blocks_per_hour must be {} (got {})",
                BLOCKS_PER_HOUR,
                self.engine.blocks_per_hour
            );
        }
        if self.engine.neutral_bias_epsilon < 0.0 {
            bail!("engine.neutral_bias_epsilon must be non-negative");
        }
        if !(0.0..=1.0).contains(&self.engine.counter_confidence_discount) {
            bail!("engine.counter_confidence_discount must be within 0..=1");
        }
        if self.volatility.min_history_hours < 2 {
            bail!("volatility.min_history_hours must be at least 2 (sample stdev needs two returns)");
        }
        if self.volatility.fallback_value <= 0.0 {
            bail!("volatility.fallback_value must be positive");
        }
        if self.verification.neutral_threshold_pct < 0.0 {
            bail!("verification.neutral_threshold_pct must be non-negative");
        }
        Ok(())
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "tag={} tickers={:?} eps={:.2} counter_sig={:.2} strong={:.2} floor={:.0}",
            self.app.tag,
            self.app.tickers,
            self.engine.neutral_bias_epsilon,
            self.engine.counter_significance_threshold,
            self.engine.strong_deviation_threshold,
            self.engine.minimum_confidence_floor
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blocks_per_hour: BLOCKS_PER_HOUR,
            neutral_bias_epsilon: 0.15,
            counter_significance_threshold: 0.3,
            strong_deviation_threshold: 0.75,
            counter_confidence_discount: 0.8,
            minimum_confidence_floor: 50.0,
            confidence_base: 40.0,
            confidence_scale: 40.0,
            min_bars_per_block: 2,
            min_populated_blocks: 2,
        }
    }
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            lookback_hours: 20,
            min_history_hours: 5,
            fallback_value: 0.01,
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            neutral_threshold_pct: 0.1,
            settle_delay_secs: 900,
        }
    }
}
