//! Power estimation.
//!
//! - [`analytic`]: closed-form two-sample t-test power and its inverse
//! - [`cluster`]: design-effect sample size for cluster-randomized trials
//! - [`PowerAnalysis`]: the simulation pipeline producing a [`PowerReport`]
//!
//! The analytic figures treat group means as independent units and ignore
//! the within-group variance, so they bound the simulated power from above.

mod aggregate;
pub mod analytic;
pub mod cluster;
mod report;

pub use aggregate::{estimate_power, pilot_row_label, PowerAnalysis, NEW_PILOT_ROW};
pub use analytic::{solve_power, ttest_ind_power, Alternative, AnalyticEstimate};
pub use cluster::ClusterSampleSize;
pub use report::{PowerReport, SummaryRow, Tallies, OLD_PILOT_ROW, SAMPLED_ROW};
