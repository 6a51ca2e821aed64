//! Direct-mode estimation on long tables.

use std::collections::BTreeMap;

use tracing::debug;

use super::{decompose, DataStatistics};
use crate::error::EstimationError;
use crate::sampling::{LongRow, LongTable, SyntheticDataset, CONDITIONS};
use crate::statistics::GroupSummary;

/// Group key: (experiment, condition, group).
type GroupKey = (usize, usize, usize);

/// Estimate statistics from a long table.
pub fn estimate_direct(table: &LongTable) -> Result<DataStatistics, EstimationError> {
    estimate_rows(table.rows.iter().copied())
}

/// Estimate statistics from a synthetic dataset without building its long form.
pub fn estimate_dataset(dataset: &SyntheticDataset) -> Result<DataStatistics, EstimationError> {
    estimate_rows((0..dataset.n_experiments()).flat_map(|e| dataset.experiment_rows(e)))
}

fn estimate_rows<I>(rows: I) -> Result<DataStatistics, EstimationError>
where
    I: IntoIterator<Item = LongRow>,
{
    let mut groups: BTreeMap<GroupKey, GroupSummary> = BTreeMap::new();
    let mut conditions = [GroupSummary::new(); CONDITIONS];
    let mut experiments: BTreeMap<usize, [GroupSummary; CONDITIONS]> = BTreeMap::new();
    let mut n_observations = 0;

    for row in rows {
        if row.condition >= CONDITIONS {
            return Err(EstimationError::UnknownCondition {
                condition: row.condition,
            });
        }
        groups
            .entry((row.experiment, row.condition, row.group))
            .or_default()
            .update(row.value);
        conditions[row.condition].update(row.value);
        experiments.entry(row.experiment).or_default()[row.condition].update(row.value);
        n_observations += 1;
    }

    for (condition, summary) in conditions.iter().enumerate() {
        if summary.count() == 0 {
            return Err(EstimationError::EmptyCondition { condition });
        }
    }

    let labelled = |condition: Option<usize>| {
        groups
            .iter()
            .filter(move |((_, c, _), _)| condition.map_or(true, |want| *c == want))
            .map(|((e, c, g), s)| (GroupLabel(*e, *c, *g), s))
    };

    let all = decompose(labelled(None))?;
    let per_condition: Vec<_> = (0..CONDITIONS)
        .map(|c| decompose(labelled(Some(c))).ok())
        .collect();

    let (mut condition_0_higher, mut condition_1_higher) = (0, 0);
    for means in experiments.values() {
        if let (Some(m0), Some(m1)) = (means[0].mean(), means[1].mean()) {
            if m0 > m1 {
                condition_0_higher += 1;
            } else if m1 > m0 {
                condition_1_higher += 1;
            }
        }
    }

    debug!(
        observations = n_observations,
        groups = all.n_groups,
        experiments = experiments.len(),
        between = all.between,
        within = all.within,
        "direct variance decomposition"
    );

    Ok(DataStatistics {
        between_group_sample_variance: all.between,
        c0_between_group_sample_variance: per_condition[0].as_ref().map(|d| d.between),
        c1_between_group_sample_variance: per_condition[1].as_ref().map(|d| d.between),
        within_group_variance: all.within,
        c0_within_group_variance: per_condition[0].as_ref().map(|d| d.within),
        c1_within_group_variance: per_condition[1].as_ref().map(|d| d.within),
        between_group_variance: None,
        between_group_std: None,
        between_group_sample_std: all.between.sqrt(),
        within_group_std: all.within.sqrt(),
        condition_0_mean: conditions[0].mean(),
        condition_1_mean: conditions[1].mean(),
        condition_0_higher: Some(condition_0_higher),
        condition_1_higher: Some(condition_1_higher),
        n_observations,
        n_groups: all.n_groups,
        degenerate_groups: all.degenerate,
    })
}

/// Display form of a group key for diagnostics.
struct GroupLabel(usize, usize, usize);

impl std::fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "experiment {} condition {} group {}", self.0, self.1, self.2)
    }
}
