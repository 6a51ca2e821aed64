//! Synthetic datasets and their long (tabular) form.

use serde::{Deserialize, Serialize};

use crate::types::Condition;

/// Number of conditions in every synthetic dataset.
pub const CONDITIONS: usize = 2;

/// Shape of a balanced synthetic dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    /// Independent simulated experiments.
    pub experiments: usize,
    /// Groups per condition.
    pub groups: usize,
    /// Participants per group.
    pub group_size: usize,
}

impl Shape {
    /// Values per experiment.
    pub fn experiment_len(&self) -> usize {
        CONDITIONS * self.groups * self.group_size
    }

    /// Total number of values.
    pub fn len(&self) -> usize {
        self.experiments * self.experiment_len()
    }

    /// True when the dataset holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn offset(&self, experiment: usize, condition: usize, group: usize, participant: usize) -> usize {
        ((experiment * CONDITIONS + condition) * self.groups + group) * self.group_size + participant
    }
}

/// One row of the long form: `(experiment, condition, group, participant, value)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongRow {
    pub experiment: usize,
    pub condition: usize,
    pub group: usize,
    pub participant: usize,
    pub value: f64,
}

/// Values indexed by (experiment, condition, group, participant).
///
/// Exactly two conditions; every (experiment, condition) has the same number
/// of groups and every group the same number of participants. Stored
/// row-major so each experiment is one contiguous slice.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticDataset {
    shape: Shape,
    values: Vec<f64>,
}

impl SyntheticDataset {
    /// Wrap row-major values.
    ///
    /// # Panics
    /// If `values.len()` differs from `shape.len()`.
    pub fn from_values(shape: Shape, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), shape.len(), "value count must match shape");
        Self { shape, values }
    }

    /// Dataset shape.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Number of experiments.
    pub fn n_experiments(&self) -> usize {
        self.shape.experiments
    }

    /// Value at a 4-D index.
    pub fn get(&self, experiment: usize, condition: usize, group: usize, participant: usize) -> Option<f64> {
        let s = self.shape;
        if experiment >= s.experiments || condition >= CONDITIONS || group >= s.groups || participant >= s.group_size {
            return None;
        }
        Some(self.values[s.offset(experiment, condition, group, participant)])
    }

    /// Flat row-major values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Values of a single experiment, row-major over (condition, group, participant).
    ///
    /// # Panics
    /// If `experiment >= self.n_experiments()`. Use [`get`](Self::get) for a
    /// checked lookup.
    pub fn experiment(&self, experiment: usize) -> &[f64] {
        let len = self.shape.experiment_len();
        &self.values[experiment * len..(experiment + 1) * len]
    }

    /// Values of one group in one experiment and condition.
    ///
    /// # Panics
    /// If `experiment` or `group` is out of range.
    pub fn group(&self, experiment: usize, condition: Condition, group: usize) -> &[f64] {
        let start = self.shape.offset(experiment, condition.index(), group, 0);
        &self.values[start..start + self.shape.group_size]
    }

    /// Iterate one experiment as long rows.
    pub fn experiment_rows(&self, experiment: usize) -> impl Iterator<Item = LongRow> + '_ {
        let s = self.shape;
        self.experiment(experiment)
            .iter()
            .enumerate()
            .map(move |(i, &value)| {
                let participant = i % s.group_size;
                let group = (i / s.group_size) % s.groups;
                let condition = i / (s.group_size * s.groups);
                LongRow {
                    experiment,
                    condition,
                    group,
                    participant,
                    value,
                }
            })
    }

    /// Long form of the whole dataset.
    pub fn to_long(&self) -> LongTable {
        let rows = (0..self.shape.experiments)
            .flat_map(|e| self.experiment_rows(e))
            .collect();
        LongTable { rows }
    }
}

/// Errors converting a long table back into a balanced dataset.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LongTableError {
    #[error("condition index {0} out of range")]
    ConditionOutOfRange(usize),

    #[error("table is not balanced: expected {expected} rows for the inferred shape, got {got}")]
    Unbalanced { expected: usize, got: usize },

    #[error("duplicate row at experiment {experiment}, condition {condition}, group {group}, participant {participant}")]
    Duplicate {
        experiment: usize,
        condition: usize,
        group: usize,
        participant: usize,
    },
}

/// Long-form table, one row per observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongTable {
    pub rows: Vec<LongRow>,
}

impl LongTable {
    /// Wrap rows.
    pub fn new(rows: Vec<LongRow>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rebuild the 4-D dataset.
    ///
    /// The shape is inferred from the largest indices; every cell must appear
    /// exactly once. Row order does not matter.
    pub fn to_dataset(&self) -> Result<SyntheticDataset, LongTableError> {
        if let Some(row) = self.rows.iter().find(|r| r.condition >= CONDITIONS) {
            return Err(LongTableError::ConditionOutOfRange(row.condition));
        }

        let extent = |f: fn(&LongRow) -> usize| self.rows.iter().map(f).max().map_or(0, |m| m + 1);
        let shape = Shape {
            experiments: extent(|r| r.experiment),
            groups: extent(|r| r.group),
            group_size: extent(|r| r.participant),
        };
        if shape.len() != self.rows.len() {
            return Err(LongTableError::Unbalanced {
                expected: shape.len(),
                got: self.rows.len(),
            });
        }

        let mut values = vec![0.0; shape.len()];
        let mut seen = vec![false; shape.len()];
        for row in &self.rows {
            let i = shape.offset(row.experiment, row.condition, row.group, row.participant);
            if seen[i] {
                return Err(LongTableError::Duplicate {
                    experiment: row.experiment,
                    condition: row.condition,
                    group: row.group,
                    participant: row.participant,
                });
            }
            seen[i] = true;
            values[i] = row.value;
        }

        Ok(SyntheticDataset { shape, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_dataset() -> SyntheticDataset {
        let shape = Shape {
            experiments: 2,
            groups: 3,
            group_size: 2,
        };
        SyntheticDataset::from_values(shape, (0..shape.len()).map(|i| i as f64).collect())
    }

    #[test]
    fn test_indexing_is_row_major() {
        let data = counting_dataset();
        assert_eq!(data.get(0, 0, 0, 0), Some(0.0));
        assert_eq!(data.get(0, 0, 0, 1), Some(1.0));
        assert_eq!(data.get(0, 0, 1, 0), Some(2.0));
        assert_eq!(data.get(0, 1, 0, 0), Some(6.0));
        assert_eq!(data.get(1, 0, 0, 0), Some(12.0));
        assert_eq!(data.get(2, 0, 0, 0), None);
        assert_eq!(data.get(0, 2, 0, 0), None);
        assert_eq!(data.group(1, Condition::Treatment, 2), &[22.0, 23.0]);
    }

    #[test]
    #[should_panic(expected = "value count must match shape")]
    fn test_from_values_rejects_wrong_length() {
        let shape = Shape {
            experiments: 1,
            groups: 2,
            group_size: 2,
        };
        SyntheticDataset::from_values(shape, vec![0.0; 3]);
    }

    #[test]
    #[should_panic]
    fn test_experiment_out_of_range_panics() {
        counting_dataset().experiment(2);
    }

    #[test]
    fn test_long_rows_carry_indices() {
        let data = counting_dataset();
        let long = data.to_long();
        assert_eq!(long.len(), 24);
        for row in &long.rows {
            assert_eq!(
                data.get(row.experiment, row.condition, row.group, row.participant),
                Some(row.value)
            );
        }
    }

    #[test]
    fn test_shuffled_long_table_rebuilds() {
        let data = counting_dataset();
        let mut long = data.to_long();
        long.rows.reverse();
        assert_eq!(long.to_dataset().unwrap(), data);
    }

    #[test]
    fn test_unbalanced_long_table_rejected() {
        let mut long = counting_dataset().to_long();
        long.rows.pop();
        assert!(matches!(long.to_dataset(), Err(LongTableError::Unbalanced { .. })));

        let mut dup = counting_dataset().to_long();
        let first = dup.rows[0];
        dup.rows[1] = first;
        assert!(matches!(dup.to_dataset(), Err(LongTableError::Duplicate { .. })));

        let mut bad = counting_dataset().to_long();
        bad.rows[0].condition = 2;
        assert_eq!(bad.to_dataset(), Err(LongTableError::ConditionOutOfRange(2)));
    }
}
