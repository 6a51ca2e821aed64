//! Core value types shared by the estimation, sampling and evaluation stages.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Experimental condition of a two-arm design.
///
/// `Control` carries no offset; `Treatment` is shifted by the hypothesized
/// mean difference in simulations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Condition {
    /// Condition 0.
    Control,
    /// Condition 1.
    Treatment,
}

impl Condition {
    /// Both conditions in index order.
    pub const ALL: [Condition; 2] = [Condition::Control, Condition::Treatment];

    /// Zero-based index (0 for control, 1 for treatment).
    pub fn index(self) -> usize {
        match self {
            Condition::Control => 0,
            Condition::Treatment => 1,
        }
    }

    /// Condition from its zero-based index.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Condition::Control),
            1 => Some(Condition::Treatment),
            _ => None,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Between-group and within-group variance components.
///
/// Variances are non-negative and finite; standard deviations are their
/// principal square roots. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceParameters {
    between_group_variance: f64,
    within_group_variance: f64,
}

impl VarianceParameters {
    /// Build from variances.
    pub fn new(between_group_variance: f64, within_group_variance: f64) -> Result<Self, ConfigError> {
        check_variance("between_group_variance", between_group_variance)?;
        check_variance("within_group_variance", within_group_variance)?;
        Ok(Self {
            between_group_variance,
            within_group_variance,
        })
    }

    /// Build from standard deviations.
    pub fn from_std(between_group_std: f64, within_group_std: f64) -> Result<Self, ConfigError> {
        check_variance("between_group_std", between_group_std)?;
        check_variance("within_group_std", within_group_std)?;
        Ok(Self {
            between_group_variance: between_group_std * between_group_std,
            within_group_variance: within_group_std * within_group_std,
        })
    }

    /// Variance of the true group means around the grand mean.
    pub fn between_group_variance(&self) -> f64 {
        self.between_group_variance
    }

    /// Variance of observations around their own group mean.
    pub fn within_group_variance(&self) -> f64 {
        self.within_group_variance
    }

    /// Square root of the between-group variance.
    pub fn between_group_std(&self) -> f64 {
        self.between_group_variance.sqrt()
    }

    /// Square root of the within-group variance.
    pub fn within_group_std(&self) -> f64 {
        self.within_group_variance.sqrt()
    }

    /// Total variance of a single observation.
    pub fn total_variance(&self) -> f64 {
        self.between_group_variance + self.within_group_variance
    }

    /// Intra-class correlation, `σ_b² / (σ_b² + σ_w²)`.
    ///
    /// Zero when both components are zero.
    pub fn icc(&self) -> f64 {
        let total = self.total_variance();
        if total > 0.0 {
            self.between_group_variance / total
        } else {
            0.0
        }
    }

    /// Variance inflation from clustered sampling, `1 + (g − 1)·ICC`.
    pub fn design_effect(&self, group_size: usize) -> f64 {
        1.0 + (group_size.saturating_sub(1)) as f64 * self.icc()
    }
}

fn check_variance(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::invalid(name, format!("must be finite, got {}", value)));
    }
    if value < 0.0 {
        return Err(ConfigError::invalid(name, format!("must be non-negative, got {}", value)));
    }
    Ok(())
}

/// Classification of one simulated experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialOutcome {
    /// Condition effect p-value below alpha.
    Significant,
    /// Condition effect p-value at or above alpha.
    NotSignificant,
    /// The mixed-model fit failed for this experiment.
    FitFailed,
}

/// Per-experiment outcome of the significance test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Index of the simulated experiment.
    pub experiment: usize,
    /// p-value of the condition coefficient, `None` when the fit failed.
    pub p_value: Option<f64>,
    /// Classification at the configured alpha.
    pub outcome: TrialOutcome,
}

impl TrialResult {
    /// True if the condition effect was detected.
    pub fn is_significant(&self) -> bool {
        self.outcome == TrialOutcome::Significant
    }
}
