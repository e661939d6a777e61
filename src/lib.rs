//! BlockCast Library
//!
//! 7-block hourly prediction engine: segments a trading hour into 7 blocks,
//! calls the hour's direction at the 5/7 point, then verifies the call and
//! tracks accuracy once the hour completes.

pub mod accuracy;
pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod segmenter;
pub mod types;
pub mod verification;
pub mod volatility;

pub use config::AppConfig;
pub use engine::{HourAnalysisRequest, PredictionEngine};
pub use error::EngineError;
pub use verification::{VerificationEngine, VerificationOutcome};
