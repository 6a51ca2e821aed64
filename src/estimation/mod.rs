//! Variance decomposition of pilot and simulated data.
//!
//! Two entry points produce the same [`DataStatistics`] record:
//!
//! - [`estimate_direct`] / [`estimate_dataset`]: the outcome is already a
//!   column of a long table (experiment, condition, group, participant, value)
//! - [`estimate_payoffs`]: the outcome is a game payoff derived from raw
//!   contribution and punishment records, averaged per participant
//!
//! Between-group variance is the Bessel-corrected variance of group means;
//! within-group variance is the mean of per-group sample variances. Groups
//! with fewer than two observations have no sample variance and are left out
//! of the within-group mean (and counted in `degenerate_groups`).

mod direct;
mod payoff;

pub use direct::{estimate_dataset, estimate_direct};
pub use payoff::{derive_payoffs, estimate_payoffs, round_payoffs, ParticipantPayoff};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, EstimationError};
use crate::statistics::{mean, sample_variance, GroupSummary};
use crate::types::VarianceParameters;

/// Summary statistics of one data source.
///
/// Per-condition fields are `None` for pilot data without conditions, and the
/// model-based fields are `None` for direct-mode estimates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataStatistics {
    /// Sample variance of group means.
    pub between_group_sample_variance: f64,
    /// Sample variance of condition-0 group means.
    pub c0_between_group_sample_variance: Option<f64>,
    /// Sample variance of condition-1 group means.
    pub c1_between_group_sample_variance: Option<f64>,
    /// Mean of per-group sample variances.
    pub within_group_variance: f64,
    /// Mean of per-group sample variances in condition 0.
    pub c0_within_group_variance: Option<f64>,
    /// Mean of per-group sample variances in condition 1.
    pub c1_within_group_variance: Option<f64>,
    /// Random-intercept variance from a mixed-model fit.
    pub between_group_variance: Option<f64>,
    /// Square root of `between_group_variance`.
    pub between_group_std: Option<f64>,
    /// Square root of `between_group_sample_variance`.
    pub between_group_sample_std: f64,
    /// Square root of `within_group_variance`.
    pub within_group_std: f64,
    /// Mean outcome in condition 0.
    pub condition_0_mean: Option<f64>,
    /// Mean outcome in condition 1.
    pub condition_1_mean: Option<f64>,
    /// Experiments whose condition-0 mean exceeds the condition-1 mean.
    pub condition_0_higher: Option<usize>,
    /// Experiments whose condition-1 mean exceeds the condition-0 mean.
    pub condition_1_higher: Option<usize>,
    /// Observations that entered the decomposition.
    pub n_observations: usize,
    /// Groups that entered the between-group variance.
    pub n_groups: usize,
    /// Groups left out of the within-group variance.
    pub degenerate_groups: usize,
}

impl DataStatistics {
    /// Variance components for the sampler.
    ///
    /// Prefers the model-based between-group variance, falling back to the
    /// sample variance of group means when no model fit is available.
    pub fn sampling_parameters(&self) -> Result<VarianceParameters, ConfigError> {
        let between = self
            .between_group_variance
            .unwrap_or(self.between_group_sample_variance);
        VarianceParameters::new(between, self.within_group_variance)
    }

    /// Variance fed to the analytic t-test bound.
    pub fn analytic_variance(&self) -> f64 {
        self.between_group_sample_variance
    }

    /// Attach a model-based between-group variance.
    pub(crate) fn with_model_variance(mut self, variance: Option<f64>) -> Self {
        self.between_group_variance = variance;
        self.between_group_std = variance.map(|v| v.max(0.0).sqrt());
        self
    }
}

/// Between/within decomposition of a set of groups.
pub(crate) struct Decomposition {
    pub between: f64,
    pub within: f64,
    pub n_groups: usize,
    pub degenerate: usize,
}

/// Decompose labelled group summaries.
///
/// Needs at least two non-empty groups for the between-group variance and one
/// group with two or more observations for the within-group variance.
pub(crate) fn decompose<'a, L, I>(groups: I) -> Result<Decomposition, EstimationError>
where
    L: std::fmt::Display + 'a,
    I: IntoIterator<Item = (L, &'a GroupSummary)>,
{
    let mut means = Vec::new();
    let mut variances = Vec::new();
    let mut first_degenerate: Option<(String, usize)> = None;

    for (label, summary) in groups {
        let Some(m) = summary.mean() else { continue };
        means.push(m);
        match summary.variance() {
            Some(v) => variances.push(v),
            None => {
                first_degenerate.get_or_insert_with(|| (label.to_string(), summary.count()));
            }
        }
    }

    let n_groups = means.len();
    let between = sample_variance(&means).ok_or(EstimationError::TooFewGroups {
        groups: n_groups,
        required: 2,
    })?;

    let degenerate = n_groups - variances.len();
    let within = match mean(&variances) {
        Some(w) => w,
        None => {
            let (group, observations) = first_degenerate.unwrap_or_default();
            return Err(EstimationError::DegenerateGroup {
                group,
                observations,
            });
        }
    };

    if let Some((group, observations)) = &first_degenerate {
        warn!(
            excluded = degenerate,
            first = %group,
            observations,
            "groups with fewer than two observations left out of within-group variance"
        );
    }

    Ok(Decomposition {
        between,
        within,
        n_groups,
        degenerate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose_excludes_singletons() {
        let a: GroupSummary = [1.0, 3.0].into_iter().collect();
        let b: GroupSummary = [5.0, 9.0].into_iter().collect();
        let c: GroupSummary = [7.0].into_iter().collect();
        let d = decompose([("a", &a), ("b", &b), ("c", &c)]).unwrap();

        // group means 2, 7, 7
        assert!((d.between - sample_variance(&[2.0, 7.0, 7.0]).unwrap()).abs() < 1e-12);
        // within variances 2 and 8
        assert!((d.within - 5.0).abs() < 1e-12);
        assert_eq!(d.n_groups, 3);
        assert_eq!(d.degenerate, 1);
    }

    #[test]
    fn test_decompose_errors() {
        let a: GroupSummary = [1.0, 2.0].into_iter().collect();
        assert!(matches!(
            decompose([("a", &a)]),
            Err(EstimationError::TooFewGroups { groups: 1, required: 2 })
        ));

        let x: GroupSummary = [1.0].into_iter().collect();
        let y: GroupSummary = [2.0].into_iter().collect();
        match decompose([("x", &x), ("y", &y)]) {
            Err(EstimationError::DegenerateGroup { group, observations }) => {
                assert_eq!(group, "x");
                assert_eq!(observations, 1);
            }
            other => panic!("expected DegenerateGroup, got {:?}", other.map(|d| d.within)),
        }
    }

    #[test]
    fn test_sampling_parameters_prefer_model() {
        let stats = DataStatistics {
            between_group_sample_variance: 4.0,
            within_group_variance: 1.0,
            ..Default::default()
        };
        assert_eq!(stats.sampling_parameters().unwrap().between_group_variance(), 4.0);

        let stats = stats.with_model_variance(Some(2.25));
        assert_eq!(stats.between_group_std, Some(1.5));
        assert_eq!(stats.sampling_parameters().unwrap().between_group_variance(), 2.25);
        assert_eq!(stats.analytic_variance(), 4.0);
    }
}
