//! End-to-end power analysis.
//!
//! ```text
//! pilot statistics ─┬─> analytic bound (t-test on group means)
//!                   └─> sampler ─> synthetic experiments ─┬─> re-estimated statistics
//!                                                          └─> mixed-model tests ─> power
//! ```

use tracing::{info, warn};

use super::analytic::AnalyticEstimate;
use super::cluster::ClusterSampleSize;
use super::report::{PowerReport, SummaryRow, Tallies, OLD_PILOT_ROW, SAMPLED_ROW};
use crate::config::Config;
use crate::constants::session_label;
use crate::data::PilotData;
use crate::error::{ConfigError, Result};
use crate::estimation::{estimate_dataset, estimate_payoffs, DataStatistics};
use crate::evaluation::{Evaluation, SignificanceEvaluator};
use crate::sampling::{HierarchicalSampler, SamplingDesign};
use crate::types::VarianceParameters;

/// Row label used for a second pilot without a known session label.
pub const NEW_PILOT_ROW: &str = "new_pilot";

/// Simulate and test experiments for known variance components.
///
/// Single-call form of the sampler and evaluator: condition 1 is shifted by
/// `design.mean_diff`, both conditions share `variances`.
///
/// `design` alone sets the shape of each experiment and the shift. From
/// `config` only the experiment count, seed, alpha and fit settings are read;
/// its `group_size`, `groups_per_condition` and `mean_diff` are ignored (a
/// mismatch is logged). Use [`SamplingDesign::from_config`] to take them
/// from the configuration instead.
pub fn estimate_power(variances: VarianceParameters, design: SamplingDesign, config: &Config) -> Evaluation {
    if SamplingDesign::from_config(config).ok() != Some(design) {
        warn!(
            ?design,
            config_group_size = config.group_size,
            config_groups_per_condition = config.groups_per_condition,
            config_mean_diff = config.mean_diff,
            "design differs from the configured one, using the explicit design"
        );
    }
    let sampler = HierarchicalSampler::new(design, variances);
    let dataset = sampler.sample(config.n_experiments, config.effective_seed());
    SignificanceEvaluator::new(config).evaluate(&dataset)
}

/// Summary-row label of a second pilot.
///
/// The manager label of its single known session (up to the first comma),
/// otherwise [`NEW_PILOT_ROW`].
pub fn pilot_row_label(pilot: &PilotData) -> String {
    match pilot.sessions.as_slice() {
        [only] => session_label(only)
            .and_then(|label| label.split(',').next())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| NEW_PILOT_ROW.to_string()),
        _ => NEW_PILOT_ROW.to_string(),
    }
}

/// A configured power analysis.
#[derive(Debug, Clone)]
pub struct PowerAnalysis {
    config: Config,
}

impl PowerAnalysis {
    /// Validate `config` and build the analysis.
    pub fn new(config: Config) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration of this analysis.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Estimate pilot statistics and run the analysis.
    pub fn run_pilots(&self, old_pilot: &PilotData, new_pilot: Option<&PilotData>) -> Result<PowerReport> {
        let old = estimate_payoffs(old_pilot, &self.config)?;
        let new = match new_pilot {
            Some(pilot) => Some((pilot_row_label(pilot), estimate_payoffs(pilot, &self.config)?)),
            None => None,
        };
        self.run(&old, new.as_ref().map(|(label, stats)| (label.as_str(), stats)))
    }

    /// Run the analysis from pilot statistics.
    ///
    /// `new_pilot` is reported in the summary table; its variances are used
    /// for condition 1 only when `consider_new_pilot` is set.
    pub fn run(&self, old_pilot: &DataStatistics, new_pilot: Option<(&str, &DataStatistics)>) -> Result<PowerReport> {
        let config = &self.config;
        let seed = config.effective_seed();
        info!(
            alpha = config.alpha,
            target_power = config.target_power,
            mean_diff = config.mean_diff,
            group_size = config.group_size,
            groups_per_condition = config.groups_per_condition,
            experiments = config.n_experiments,
            consider_new_pilot = config.consider_new_pilot,
            seed,
            "starting power analysis"
        );

        let treatment_pilot = match (config.consider_new_pilot, new_pilot) {
            (true, Some((_, stats))) => Some(stats),
            (true, None) => {
                return Err(ConfigError::invalid(
                    "consider_new_pilot",
                    "requires statistics of a second pilot",
                )
                .into())
            }
            (false, _) => None,
        };

        let analytic = AnalyticEstimate::new(
            config.mean_diff,
            old_pilot.analytic_variance(),
            treatment_pilot.map(|s| s.analytic_variance()),
            config.alpha,
            config.target_power,
            config.groups_per_condition,
        );
        info!(
            effect_size = analytic.effect_size,
            required_groups = analytic.required_n_per_condition,
            power_at_design = analytic.power_at_design,
            "analytic upper bound"
        );

        let control = old_pilot.sampling_parameters()?;
        let design = SamplingDesign::from_config(config)?;
        let sampler = match treatment_pilot {
            Some(stats) => HierarchicalSampler::heterogeneous(design, control, stats.sampling_parameters()?),
            None => HierarchicalSampler::new(design, control),
        };

        let cluster = ClusterSampleSize::new(
            &control,
            config.group_size,
            config.mean_diff,
            config.alpha,
            config.target_power,
            true,
        );

        let dataset = sampler.sample(config.n_experiments, seed);
        let sampled = estimate_dataset(&dataset)?;
        let evaluation = SignificanceEvaluator::new(config).evaluate(&dataset);
        let empirical_power = evaluation.power();
        info!(
            empirical_power = empirical_power.unwrap_or(f64::NAN),
            significant = evaluation.significant,
            failed = evaluation.failed,
            "power analysis complete"
        );

        let mut summary = vec![SummaryRow::new(OLD_PILOT_ROW, old_pilot.clone())];
        if let Some((label, stats)) = new_pilot {
            summary.push(SummaryRow::new(label, stats.clone()));
        }
        summary.push(SummaryRow::new(SAMPLED_ROW, sampled));

        Ok(PowerReport {
            config: config.clone(),
            seed,
            effect_size: analytic.effect_size,
            analytic,
            cluster,
            empirical_power,
            tallies: Tallies::from(&evaluation),
            summary,
        })
    }
}
