//! Output records of a power analysis run.

use serde::{Deserialize, Serialize};

use super::analytic::AnalyticEstimate;
use super::cluster::ClusterSampleSize;
use crate::config::Config;
use crate::estimation::DataStatistics;
use crate::evaluation::Evaluation;

/// Row label of the first pilot's statistics.
pub const OLD_PILOT_ROW: &str = "old_pilot";

/// Row label of the re-estimated simulated data.
pub const SAMPLED_ROW: &str = "sampled";

/// Statistics of one data source in the summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Row label (`old_pilot`, a pilot label, or `sampled`).
    pub source: String,
    /// Statistics of that source.
    pub statistics: DataStatistics,
}

impl SummaryRow {
    /// Label a statistics record.
    pub fn new(source: impl Into<String>, statistics: DataStatistics) -> Self {
        Self {
            source: source.into(),
            statistics,
        }
    }
}

/// Experiment tallies kept in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tallies {
    /// Experiments simulated.
    pub experiments: usize,
    /// Significant condition effects.
    pub significant: usize,
    /// Non-significant condition effects.
    pub not_significant: usize,
    /// Failed fits.
    pub failed: usize,
}

impl From<&Evaluation> for Tallies {
    fn from(e: &Evaluation) -> Self {
        Self {
            experiments: e.n_experiments(),
            significant: e.significant,
            not_significant: e.not_significant,
            failed: e.failed,
        }
    }
}

/// Result of a full power analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerReport {
    /// Configuration the run used.
    pub config: Config,
    /// Seed the simulation used.
    pub seed: u64,
    /// Cohen's d of the planned difference.
    pub effect_size: f64,
    /// Analytic t-test bound on group means.
    pub analytic: AnalyticEstimate,
    /// Design-effect sample size from the sampling variances.
    pub cluster: ClusterSampleSize,
    /// Share of simulated experiments with a significant effect.
    pub empirical_power: Option<f64>,
    /// Experiment tallies.
    pub tallies: Tallies,
    /// Statistics per data source.
    pub summary: Vec<SummaryRow>,
}

impl PowerReport {
    /// Analytic power at the planned number of groups, an upper bound on the
    /// empirical power.
    pub fn analytic_power_upper_bound(&self) -> f64 {
        self.analytic.power_at_design
    }

    /// Summary row by label.
    pub fn row(&self, source: &str) -> Option<&SummaryRow> {
        self.summary.iter().find(|r| r.source == source)
    }
}
