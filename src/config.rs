//! Run configuration for the power analysis pipeline.
//!
//! A single immutable [`Config`] is passed by reference through estimation,
//! sampling and evaluation, so one run's full parameter set can be logged and
//! reproduced.

use serde::{Deserialize, Serialize};

use crate::constants::{
    ALGOINST_EXPERIMENT, DEFAULT_ALPHA, DEFAULT_EXPERIMENTS, DEFAULT_GROUPS_PER_CONDITION,
    DEFAULT_GROUP_SIZE, DEFAULT_MEAN_DIFF, DEFAULT_SEED, DEFAULT_SESSION, DEFAULT_TARGET_POWER,
    PAYOFF_BASE, PAYOFF_GROUP_SIZE, PAYOFF_MULTIPLIER,
};
use crate::error::ConfigError;
use crate::mixed::{FitMethod, WaldReference};

/// How an observation from a participant without input is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissingInputPolicy {
    /// Keep the round with a payoff of zero.
    #[default]
    ZeroPayoff,
    /// Drop the round from the participant's average.
    Exclude,
}

impl std::fmt::Display for MissingInputPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingInputPolicy::ZeroPayoff => write!(f, "zero-payoff"),
            MissingInputPolicy::Exclude => write!(f, "exclude"),
        }
    }
}

/// How failed model fits enter the power estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FitFailurePolicy {
    /// Failed fits count as experiments without a detected effect.
    #[default]
    CountAsNotSignificant,
    /// Failed fits are left out of the denominator.
    Exclude,
}

/// Payoff rules of the public-goods game with punishment.
///
/// `payoff = base − contribution − punishment + common_good / (group_size − missing)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoffRules {
    /// Endowment per round.
    pub base: f64,
    /// Multiplier on the group's total contribution.
    pub multiplier: f64,
    /// Participant slots per group.
    pub group_size: usize,
}

impl Default for PayoffRules {
    fn default() -> Self {
        Self {
            base: PAYOFF_BASE,
            multiplier: PAYOFF_MULTIPLIER,
            group_size: PAYOFF_GROUP_SIZE,
        }
    }
}

/// Configuration for a power analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Significance level for the condition effect.
    ///
    /// Default: 0.05
    pub alpha: f64,

    /// Target power for the analytic sample-size bound.
    ///
    /// Default: 0.8
    pub target_power: f64,

    /// Hypothesized difference between the condition means.
    ///
    /// Default: 2.0
    pub mean_diff: f64,

    /// Participants per simulated group. At least 2.
    ///
    /// Default: 4
    pub group_size: usize,

    /// Groups sampled per condition in each simulated experiment.
    ///
    /// Default: 60
    pub groups_per_condition: usize,

    /// Number of simulated experiments.
    ///
    /// Default: 1000
    pub n_experiments: usize,

    /// Use the second pilot's variance for condition 1.
    ///
    /// Default: false
    pub consider_new_pilot: bool,

    /// Seed for the simulation streams.
    ///
    /// Default: None (uses [`DEFAULT_SEED`])
    pub seed: Option<u64>,

    /// Likelihood used to fit the mixed models.
    pub fit_method: FitMethod,

    /// Reference distribution for the Wald test of the condition effect.
    pub wald_reference: WaldReference,

    /// Treatment of failed fits in the power estimate.
    pub failure_policy: FitFailurePolicy,

    /// Payoff rules for derived-payoff pilot data.
    pub payoff: PayoffRules,

    /// Treatment of rounds without participant input.
    pub missing_inputs: MissingInputPolicy,

    /// Experiment name kept from algoinst-format pilot data.
    pub experiment_name: String,

    /// Sessions kept from session-log pilot data.
    pub sessions: Vec<String>,

    /// Draw a progress bar while fitting.
    ///
    /// Default: false
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            target_power: DEFAULT_TARGET_POWER,
            mean_diff: DEFAULT_MEAN_DIFF,
            group_size: DEFAULT_GROUP_SIZE,
            groups_per_condition: DEFAULT_GROUPS_PER_CONDITION,
            n_experiments: DEFAULT_EXPERIMENTS,
            consider_new_pilot: false,
            seed: None,
            fit_method: FitMethod::default(),
            wald_reference: WaldReference::default(),
            failure_policy: FitFailurePolicy::default(),
            payoff: PayoffRules::default(),
            missing_inputs: MissingInputPolicy::default(),
            experiment_name: ALGOINST_EXPERIMENT.to_string(),
            sessions: vec![DEFAULT_SESSION.to_string()],
            show_progress: false,
        }
    }
}

impl Config {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the significance level.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the target power of the analytic bound.
    pub fn with_target_power(mut self, power: f64) -> Self {
        self.target_power = power;
        self
    }

    /// Set the hypothesized mean difference.
    pub fn with_mean_diff(mut self, mean_diff: f64) -> Self {
        self.mean_diff = mean_diff;
        self
    }

    /// Set the number of participants per group.
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    /// Set the number of groups per condition.
    pub fn with_groups_per_condition(mut self, groups: usize) -> Self {
        self.groups_per_condition = groups;
        self
    }

    /// Set the number of simulated experiments.
    pub fn with_experiments(mut self, n_experiments: usize) -> Self {
        self.n_experiments = n_experiments;
        self
    }

    /// Use the second pilot's variance for condition 1.
    pub fn with_new_pilot(mut self, consider: bool) -> Self {
        self.consider_new_pilot = consider;
        self
    }

    /// Set a random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the likelihood used for fitting.
    pub fn with_fit_method(mut self, method: FitMethod) -> Self {
        self.fit_method = method;
        self
    }

    /// Set the reference distribution of the Wald test.
    pub fn with_wald_reference(mut self, reference: WaldReference) -> Self {
        self.wald_reference = reference;
        self
    }

    /// Set how failed fits enter the power estimate.
    pub fn with_failure_policy(mut self, policy: FitFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set how rounds without input are treated.
    pub fn with_missing_inputs(mut self, policy: MissingInputPolicy) -> Self {
        self.missing_inputs = policy;
        self
    }

    /// Set the sessions kept from session-log data.
    pub fn with_sessions<I, S>(mut self, sessions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sessions = sessions.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable the progress bar.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Seed actually used for the simulation.
    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_SEED)
    }

    /// Check that all parameters are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::invalid(
                "alpha",
                format!("must be in (0, 1), got {}", self.alpha),
            ));
        }
        if !(self.target_power > 0.0 && self.target_power < 1.0) {
            return Err(ConfigError::invalid(
                "target_power",
                format!("must be in (0, 1), got {}", self.target_power),
            ));
        }
        if !self.mean_diff.is_finite() {
            return Err(ConfigError::invalid(
                "mean_diff",
                format!("must be finite, got {}", self.mean_diff),
            ));
        }
        if self.group_size < 2 {
            return Err(ConfigError::invalid("group_size", "must be at least 2"));
        }
        if self.groups_per_condition == 0 {
            return Err(ConfigError::invalid("groups_per_condition", "must be at least 1"));
        }
        if self.n_experiments == 0 {
            return Err(ConfigError::invalid("n_experiments", "must be at least 1"));
        }
        if self.payoff.group_size == 0 {
            return Err(ConfigError::invalid("payoff.group_size", "must be at least 1"));
        }
        Ok(())
    }
}
