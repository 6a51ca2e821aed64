//! Hierarchical data-generating process for two-condition group designs.
//!
//! Every simulated value is
//!
//! ```text
//! value = offset(condition) + u_group + ε_participant
//! u_group       ~ N(0, between_std(condition))
//! ε_participant ~ N(0, within_std(condition))
//! ```
//!
//! with `offset = 0` for condition 0 and `mean_diff` for condition 1.
//!
//! Each experiment draws from its own counter-seeded RNG stream, so experiments
//! are IID and the output does not depend on the `parallel` feature or on the
//! order in which experiments are generated.

mod dataset;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::ConfigError;
use crate::statistics::stream_rng;
use crate::types::{Condition, VarianceParameters};

pub use dataset::{LongRow, LongTable, LongTableError, Shape, SyntheticDataset, CONDITIONS};

/// Design of one simulated experiment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingDesign {
    /// Participants per group.
    pub group_size: usize,
    /// Groups per condition.
    pub groups_per_condition: usize,
    /// Offset added to every condition-1 value.
    pub mean_diff: f64,
}

impl SamplingDesign {
    /// Build a design, rejecting non-finite offsets and groups too small to
    /// separate the between-group and within-group variance.
    pub fn new(group_size: usize, groups_per_condition: usize, mean_diff: f64) -> Result<Self, ConfigError> {
        if group_size < 2 {
            return Err(ConfigError::invalid("group_size", "must be at least 2"));
        }
        if groups_per_condition == 0 {
            return Err(ConfigError::invalid("groups_per_condition", "must be at least 1"));
        }
        if !mean_diff.is_finite() {
            return Err(ConfigError::invalid("mean_diff", format!("must be finite, got {mean_diff}")));
        }
        Ok(Self {
            group_size,
            groups_per_condition,
            mean_diff,
        })
    }

    /// The design named by a run configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(config.group_size, config.groups_per_condition, config.mean_diff)
    }

    fn offset(&self, condition: Condition) -> f64 {
        match condition {
            Condition::Control => 0.0,
            Condition::Treatment => self.mean_diff,
        }
    }
}

/// Samples synthetic datasets from per-condition variance components.
#[derive(Debug, Clone)]
pub struct HierarchicalSampler {
    design: SamplingDesign,
    variances: [VarianceParameters; CONDITIONS],
}

impl HierarchicalSampler {
    /// Sampler where both conditions share the same variance components.
    pub fn new(design: SamplingDesign, variances: VarianceParameters) -> Self {
        Self {
            design,
            variances: [variances; CONDITIONS],
        }
    }

    /// Sampler where condition 1 has its own variance components.
    pub fn heterogeneous(
        design: SamplingDesign,
        control: VarianceParameters,
        treatment: VarianceParameters,
    ) -> Self {
        Self {
            design,
            variances: [control, treatment],
        }
    }

    /// Sampling design.
    pub fn design(&self) -> &SamplingDesign {
        &self.design
    }

    /// Variance components used for `condition`.
    pub fn variances(&self, condition: Condition) -> &VarianceParameters {
        &self.variances[condition.index()]
    }

    /// Draw `n_experiments` independent experiments.
    pub fn sample(&self, n_experiments: usize, seed: u64) -> SyntheticDataset {
        let shape = Shape {
            experiments: n_experiments,
            groups: self.design.groups_per_condition,
            group_size: self.design.group_size,
        };
        let mut values = vec![0.0; shape.len()];
        let chunk = shape.experiment_len();

        debug!(
            experiments = n_experiments,
            groups = shape.groups,
            group_size = shape.group_size,
            mean_diff = self.design.mean_diff,
            "sampling synthetic experiments"
        );

        if chunk > 0 {
            #[cfg(feature = "parallel")]
            values
                .par_chunks_mut(chunk)
                .enumerate()
                .for_each(|(e, slot)| self.fill_experiment(seed, e, slot));

            #[cfg(not(feature = "parallel"))]
            values
                .chunks_mut(chunk)
                .enumerate()
                .for_each(|(e, slot)| self.fill_experiment(seed, e, slot));
        }

        SyntheticDataset::from_values(shape, values)
    }

    /// Fill one experiment, laid out as (condition, group, participant).
    fn fill_experiment(&self, seed: u64, experiment: usize, slot: &mut [f64]) {
        let mut rng = stream_rng(seed, experiment as u64);
        let g = self.design.group_size;
        let per_condition = self.design.groups_per_condition * g;

        for condition in Condition::ALL {
            let params = &self.variances[condition.index()];
            let offset = self.design.offset(condition);
            let cells = &mut slot[condition.index() * per_condition..][..per_condition];

            for group in cells.chunks_mut(g) {
                let z: f64 = rng.sample(StandardNormal);
                let group_effect = z * params.between_group_std();
                for cell in group {
                    let z: f64 = rng.sample(StandardNormal);
                    *cell = offset + group_effect + z * params.within_group_std();
                }
            }
        }
    }
}
