//! # mixedpower
//!
//! Simulation-based power analysis for experiments where participants are
//! nested in groups and groups are assigned to one of two conditions.
//!
//! The pipeline:
//! - estimates between-group and within-group variance from pilot data
//!   ([`estimation`]), either from an outcome column or from game payoffs
//!   derived from contribution and punishment records ([`data`])
//! - draws many synthetic experiments from a two-level normal model with a
//!   planned condition difference ([`sampling`])
//! - fits a random-intercept mixed model to every experiment and tests the
//!   condition effect ([`mixed`], [`evaluation`])
//! - reports the share of significant experiments next to an analytic
//!   t-test upper bound ([`power`], [`output`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use mixedpower::{Config, PowerAnalysis, VarianceParameters};
//! use mixedpower::sampling::SamplingDesign;
//!
//! let config = Config::new().with_groups_per_condition(60).with_seed(42);
//! let design = SamplingDesign::from_config(&config).unwrap();
//! let variances = VarianceParameters::from_std(1.5, 4.0).unwrap();
//!
//! let evaluation = mixedpower::estimate_power(variances, design, &config);
//! println!("power: {:?}", evaluation.power());
//! ```
//!
//! Results are deterministic for a given seed: every experiment draws from
//! its own counter-seeded stream, with or without the `parallel` feature.

#![warn(clippy::all)]

mod config;
mod constants;
mod error;
mod types;

pub mod data;
pub mod estimation;
pub mod evaluation;
pub mod mixed;
pub mod output;
pub mod power;
pub mod sampling;
pub mod statistics;

pub use config::{Config, FitFailurePolicy, MissingInputPolicy, PayoffRules};
pub use constants::{
    session_label, ALGOINST_EXPERIMENT, DEFAULT_ALPHA, DEFAULT_EXPERIMENTS,
    DEFAULT_GROUPS_PER_CONDITION, DEFAULT_GROUP_SIZE, DEFAULT_MEAN_DIFF, DEFAULT_SEED,
    DEFAULT_SESSION, DEFAULT_TARGET_POWER, SESSION_LABELS,
};
pub use error::{ConfigError, DataError, Error, EstimationError, FitError, Result};
pub use estimation::DataStatistics;
pub use evaluation::{Evaluation, SignificanceEvaluator};
pub use mixed::{FitMethod, MixedFit, MixedModel, WaldReference};
pub use power::{estimate_power, PowerAnalysis, PowerReport};
pub use types::{Condition, TrialOutcome, TrialResult, VarianceParameters};
