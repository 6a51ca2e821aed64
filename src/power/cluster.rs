//! Sample size for cluster-randomized designs via the design effect.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::types::VarianceParameters;

/// Required size of a two-arm cluster-randomized trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterSampleSize {
    /// `σ_b² / (σ_b² + σ_w²)`.
    pub icc: f64,
    /// `1 + (g − 1)·ICC`.
    pub design_effect: f64,
    /// Participants needed per condition (may be infinite).
    pub participants_per_condition: f64,
    /// Groups needed per condition, `⌈participants / g⌉` (may be infinite).
    pub groups_per_condition: f64,
}

impl ClusterSampleSize {
    /// Normal-approximation sample size for detecting `mean_diff`.
    ///
    /// ```text
    /// n = 2·(z_{1−α/2} + z_{power})²·(σ_b² + σ_w²) / δ² · DE
    /// ```
    ///
    /// One-tailed tests use `z_{1−α}`. A zero `mean_diff` needs infinitely
    /// many participants.
    pub fn new(
        variances: &VarianceParameters,
        group_size: usize,
        mean_diff: f64,
        alpha: f64,
        power: f64,
        two_tailed: bool,
    ) -> Self {
        let icc = variances.icc();
        let design_effect = variances.design_effect(group_size);

        let z = |p: f64| Normal::new(0.0, 1.0).map_or(f64::NAN, |n| n.inverse_cdf(p));
        let z_alpha = if two_tailed { z(1.0 - alpha / 2.0) } else { z(1.0 - alpha) };
        let z_total = z_alpha + z(power);

        let participants = if mean_diff == 0.0 {
            f64::INFINITY
        } else {
            2.0 * z_total * z_total * variances.total_variance() / (mean_diff * mean_diff) * design_effect
        };
        let groups = if participants.is_finite() {
            (participants / group_size.max(1) as f64).ceil()
        } else {
            f64::INFINITY
        };

        Self {
            icc,
            design_effect,
            participants_per_condition: participants,
            groups_per_condition: groups,
        }
    }
}
