//! Per-experiment significance testing of the condition effect.
//!
//! Each experiment is one work unit: relabel its groups so they are unique
//! across conditions, fit `value ~ condition` with a random intercept per
//! group, and classify the condition p-value against alpha. Work units share
//! no state and each returns its own [`TrialResult`]; tallies are computed
//! afterwards.

use std::collections::BTreeMap;

use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, FitFailurePolicy};
use crate::error::FitError;
use crate::mixed::{FitMethod, MixedModel, WaldReference};
use crate::sampling::{LongRow, LongTable, SyntheticDataset};
use crate::types::{TrialOutcome, TrialResult};

/// Name of the condition coefficient in the fitted model.
pub const CONDITION_TERM: &str = "condition";

/// Make group ids unique across conditions.
///
/// Condition-1 groups are shifted by one past the largest condition-0 group
/// id, so both conditions form a single grouping factor.
pub fn relabel_groups(rows: &mut [LongRow]) {
    let offset = rows
        .iter()
        .filter(|r| r.condition == 0)
        .map(|r| r.group + 1)
        .max()
        .unwrap_or(0);
    for row in rows.iter_mut().filter(|r| r.condition == 1) {
        row.group += offset;
    }
}

/// Tallies over all experiments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// One result per experiment, in experiment order.
    pub trials: Vec<TrialResult>,
    /// Experiments with a significant condition effect.
    pub significant: usize,
    /// Experiments without a significant condition effect.
    pub not_significant: usize,
    /// Experiments whose fit failed.
    pub failed: usize,
    /// Treatment of failed fits in [`Evaluation::power`].
    pub failure_policy: FitFailurePolicy,
}

impl Evaluation {
    fn from_trials(trials: Vec<TrialResult>, failure_policy: FitFailurePolicy) -> Self {
        let count = |o: TrialOutcome| trials.iter().filter(|t| t.outcome == o).count();
        let significant = count(TrialOutcome::Significant);
        let not_significant = count(TrialOutcome::NotSignificant);
        let failed = count(TrialOutcome::FitFailed);
        Self {
            trials,
            significant,
            not_significant,
            failed,
            failure_policy,
        }
    }

    /// Number of experiments evaluated.
    pub fn n_experiments(&self) -> usize {
        self.trials.len()
    }

    /// Empirical power: share of experiments with a significant effect.
    ///
    /// Failed fits count as not significant or are left out of the
    /// denominator, per the failure policy. `None` when the denominator is 0.
    pub fn power(&self) -> Option<f64> {
        let denominator = match self.failure_policy {
            FitFailurePolicy::CountAsNotSignificant => self.significant + self.not_significant + self.failed,
            FitFailurePolicy::Exclude => self.significant + self.not_significant,
        };
        (denominator > 0).then(|| self.significant as f64 / denominator as f64)
    }

    /// Share of experiments whose fit failed.
    pub fn failure_rate(&self) -> f64 {
        if self.trials.is_empty() {
            0.0
        } else {
            self.failed as f64 / self.trials.len() as f64
        }
    }
}

/// Fits the mixed model to every simulated experiment.
#[derive(Debug, Clone)]
pub struct SignificanceEvaluator {
    alpha: f64,
    method: FitMethod,
    reference: WaldReference,
    failure_policy: FitFailurePolicy,
    show_progress: bool,
}

impl SignificanceEvaluator {
    /// Evaluator with the run's alpha, fit method and failure policy.
    pub fn new(config: &Config) -> Self {
        Self {
            alpha: config.alpha,
            method: config.fit_method,
            reference: config.wald_reference,
            failure_policy: config.failure_policy,
            show_progress: config.show_progress,
        }
    }

    /// Significance level.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Fit one experiment's rows and classify its condition effect.
    ///
    /// Rows may come in any order; group ids are relabelled internally.
    pub fn evaluate_experiment(&self, experiment: usize, rows: &[LongRow]) -> TrialResult {
        let mut rows = rows.to_vec();
        relabel_groups(&mut rows);

        match self.fit_condition_p_value(&rows) {
            Ok(p_value) => TrialResult {
                experiment,
                p_value: Some(p_value),
                outcome: if p_value < self.alpha {
                    TrialOutcome::Significant
                } else {
                    TrialOutcome::NotSignificant
                },
            },
            Err(error) => {
                warn!(experiment, %error, "mixed-model fit failed");
                TrialResult {
                    experiment,
                    p_value: None,
                    outcome: TrialOutcome::FitFailed,
                }
            }
        }
    }

    fn fit_condition_p_value(&self, rows: &[LongRow]) -> Result<f64, FitError> {
        let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
        let condition: Vec<f64> = rows.iter().map(|r| r.condition as f64).collect();
        let groups: Vec<usize> = rows.iter().map(|r| r.group).collect();

        let fit = MixedModel::with_predictor(&values, &condition, CONDITION_TERM, &groups)?
            .fit(self.method, self.reference)?;
        debug!(
            group_variance = fit.group_variance,
            residual_variance = fit.residual_variance,
            iterations = fit.iterations,
            "experiment fit"
        );
        fit.p_value(CONDITION_TERM).ok_or(FitError::NonFinite)
    }

    /// Evaluate every experiment of a synthetic dataset.
    pub fn evaluate(&self, dataset: &SyntheticDataset) -> Evaluation {
        let n = dataset.n_experiments();
        self.run(n, |e| {
            let rows: Vec<LongRow> = dataset.experiment_rows(e).collect();
            self.evaluate_experiment(e, &rows)
        })
    }

    /// Evaluate every experiment of a long table.
    ///
    /// Experiments are identified by their `experiment` column; results are
    /// ordered by experiment id.
    pub fn evaluate_long(&self, table: &LongTable) -> Evaluation {
        let mut by_experiment: BTreeMap<usize, Vec<LongRow>> = BTreeMap::new();
        for row in &table.rows {
            by_experiment.entry(row.experiment).or_default().push(*row);
        }
        let experiments: Vec<(usize, Vec<LongRow>)> = by_experiment.into_iter().collect();
        self.run(experiments.len(), |i| {
            let (id, rows) = &experiments[i];
            self.evaluate_experiment(*id, rows)
        })
    }

    fn run<F>(&self, n: usize, unit: F) -> Evaluation
    where
        F: Fn(usize) -> TrialResult + Sync + Send,
    {
        info!(
            experiments = n,
            alpha = self.alpha,
            method = %self.method,
            "fitting mixed models"
        );

        let progress = self.progress_bar(n);

        #[cfg(feature = "parallel")]
        let trials: Vec<TrialResult> = (0..n)
            .into_par_iter()
            .map(|i| {
                let result = unit(i);
                progress.inc(1);
                result
            })
            .collect();

        #[cfg(not(feature = "parallel"))]
        let trials: Vec<TrialResult> = (0..n)
            .map(|i| {
                let result = unit(i);
                progress.inc(1);
                result
            })
            .collect();

        progress.finish_and_clear();

        let evaluation = Evaluation::from_trials(trials, self.failure_policy);
        if evaluation.failed > 0 {
            warn!(
                failed = evaluation.failed,
                experiments = n,
                "some experiments could not be fitted"
            );
        }
        evaluation
    }

    fn progress_bar(&self, n: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(n as u64).with_message("Fitting models");
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::{HierarchicalSampler, SamplingDesign};
    use crate::types::VarianceParameters;

    fn row(condition: usize, group: usize, value: f64) -> LongRow {
        LongRow {
            experiment: 0,
            condition,
            group,
            participant: 0,
            value,
        }
    }

    #[test]
    fn test_relabel_offsets_second_condition() {
        let mut rows = vec![row(0, 0, 0.0), row(0, 2, 0.0), row(1, 0, 0.0), row(1, 2, 0.0)];
        relabel_groups(&mut rows);
        let groups: Vec<usize> = rows.iter().map(|r| r.group).collect();
        assert_eq!(groups, vec![0, 2, 3, 5]);
    }

    #[test]
    fn test_power_policies() {
        let trial = |e, outcome| TrialResult {
            experiment: e,
            p_value: None,
            outcome,
        };
        let trials = vec![
            trial(0, TrialOutcome::Significant),
            trial(1, TrialOutcome::NotSignificant),
            trial(2, TrialOutcome::FitFailed),
            trial(3, TrialOutcome::Significant),
        ];
        let counted = Evaluation::from_trials(trials.clone(), FitFailurePolicy::CountAsNotSignificant);
        assert_eq!(counted.power(), Some(0.5));
        assert_eq!(counted.failure_rate(), 0.25);

        let excluded = Evaluation::from_trials(trials, FitFailurePolicy::Exclude);
        assert!((excluded.power().unwrap() - 2.0 / 3.0).abs() < 1e-12);

        let empty = Evaluation::from_trials(Vec::new(), FitFailurePolicy::Exclude);
        assert_eq!(empty.power(), None);
    }

    #[test]
    fn test_large_effect_is_detected() {
        let design = SamplingDesign::new(4, 20, 10.0).unwrap();
        let sampler = HierarchicalSampler::new(design, VarianceParameters::from_std(1.0, 1.0).unwrap());
        let data = sampler.sample(20, 3);

        let evaluation = SignificanceEvaluator::new(&Config::default()).evaluate(&data);
        assert_eq!(evaluation.n_experiments(), 20);
        assert_eq!(evaluation.significant, 20);
        assert_eq!(evaluation.trials[7].experiment, 7);
    }

    #[test]
    fn test_strongly_clustered_experiments_fit() {
        // ICC above 0.999 still leaves the within-group variance identifiable
        let design = SamplingDesign::new(4, 20, 1.0).unwrap();
        let sampler = HierarchicalSampler::new(design, VarianceParameters::from_std(50.0, 0.1).unwrap());
        let data = sampler.sample(20, 8);

        let evaluation = SignificanceEvaluator::new(&Config::default()).evaluate(&data);
        assert_eq!(evaluation.failed, 0);
        assert_eq!(evaluation.n_experiments(), 20);
    }

    #[test]
    fn test_long_table_matches_dataset() {
        let design = SamplingDesign::new(3, 8, 1.0).unwrap();
        let sampler = HierarchicalSampler::new(design, VarianceParameters::from_std(1.0, 2.0).unwrap());
        let data = sampler.sample(6, 17);
        let evaluator = SignificanceEvaluator::new(&Config::default());

        let mut long = data.to_long();
        long.rows.reverse();
        let a = evaluator.evaluate(&data);
        let b = evaluator.evaluate_long(&long);
        assert_eq!(a.significant, b.significant);
        for (x, y) in a.trials.iter().zip(&b.trials) {
            assert_eq!(x.experiment, y.experiment);
            assert!((x.p_value.unwrap() - y.p_value.unwrap()).abs() < 1e-8);
        }
    }

    #[test]
    fn test_unfittable_experiment_is_recorded() {
        // a single group cannot identify a between-group variance
        let rows = vec![row(0, 0, 1.0), row(0, 0, 2.0), row(0, 0, 3.0)];
        let result = SignificanceEvaluator::new(&Config::default()).evaluate_experiment(0, &rows);
        assert_eq!(result.outcome, TrialOutcome::FitFailed);
        assert_eq!(result.p_value, None);
    }
}
