//! Statistical building blocks.
//!
//! - Descriptive statistics with explicit Bessel correction
//! - Streaming per-group summaries
//! - Counter-based RNG streams for reproducible, order-independent simulation

mod descriptive;
mod rng;

pub use descriptive::{
    correct_std, correct_variance, mean, population_variance, sample_variance, GroupSummary,
};
pub use rng::{counter_rng_seed, stream_rng};
