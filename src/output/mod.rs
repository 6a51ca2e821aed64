//! Output formatting for power analysis reports.
//!
//! - Terminal: human-readable report with colors and box drawing
//! - CSV: the summary table, one row per data source
//! - JSON: machine-readable serialization of the whole report

mod csv;
mod json;
mod terminal;

pub use self::csv::{write_summary, write_summary_to, SummaryRecord};
pub use json::{to_json, to_json_pretty};
pub use terminal::format_report;

#[cfg(test)]
pub(crate) mod tests {
    use crate::config::Config;
    use crate::estimation::DataStatistics;
    use crate::power::{
        AnalyticEstimate, ClusterSampleSize, PowerReport, SummaryRow, Tallies, OLD_PILOT_ROW,
        SAMPLED_ROW,
    };

    pub(crate) fn make_report() -> PowerReport {
        let pilot = DataStatistics {
            between_group_sample_variance: 4.0,
            within_group_variance: 9.0,
            between_group_sample_std: 2.0,
            within_group_std: 3.0,
            n_observations: 40,
            n_groups: 10,
            ..Default::default()
        };
        let sampled = DataStatistics {
            c0_between_group_sample_variance: Some(4.1),
            c1_between_group_sample_variance: Some(3.9),
            condition_0_mean: Some(0.1),
            condition_1_mean: Some(2.1),
            condition_0_higher: Some(10),
            condition_1_higher: Some(90),
            ..pilot.clone()
        };
        PowerReport {
            config: Config::default(),
            seed: 7,
            effect_size: 1.0,
            analytic: AnalyticEstimate {
                effect_size: 1.0,
                pooled_std: 2.0,
                required_n_per_condition: 16.71,
                power_at_design: 0.99,
            },
            cluster: ClusterSampleSize {
                icc: 0.3,
                design_effect: 1.9,
                participants_per_condition: 47.0,
                groups_per_condition: 12.0,
            },
            empirical_power: Some(0.8),
            tallies: Tallies {
                experiments: 100,
                significant: 80,
                not_significant: 20,
                failed: 0,
            },
            summary: vec![
                SummaryRow::new(OLD_PILOT_ROW, pilot.clone()),
                SummaryRow::new("pgh", pilot),
                SummaryRow::new(SAMPLED_ROW, sampled),
            ],
        }
    }
}
