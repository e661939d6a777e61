//! Hour-level signal analysis
//!
//! The three pure stages between segmentation and the emitted prediction:
//! - early bias from blocks 1-2
//! - sustained counter detection over blocks 3-5
//! - the deviation-scored decision at the 5/7 point
//!
//! Everything here is a pure function of block data plus config - no I/O,
//! no hidden state - so each stage is independently unit-testable.

pub mod counter;
pub mod decision;
pub mod early_bias;

pub use counter::detect_sustained_counter;
pub use decision::{decide, Decision};
pub use early_bias::compute_early_bias;
