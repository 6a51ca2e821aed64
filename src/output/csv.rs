//! Summary table persisted as delimited text.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::DataError;
use crate::power::{PowerReport, SummaryRow};

/// One flat CSV record of the summary table.
///
/// Absent values are written as empty cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord<'a> {
    pub source: &'a str,
    pub between_group_sample_variance: f64,
    pub c0_between_group_sample_variance: Option<f64>,
    pub c1_between_group_sample_variance: Option<f64>,
    pub within_group_variance: f64,
    pub c0_within_group_variance: Option<f64>,
    pub c1_within_group_variance: Option<f64>,
    pub between_group_variance: Option<f64>,
    pub between_group_std: Option<f64>,
    pub between_group_sample_std: f64,
    pub within_group_std: f64,
    pub condition_0_mean: Option<f64>,
    pub condition_1_mean: Option<f64>,
    pub condition_0_higher: Option<usize>,
    pub condition_1_higher: Option<usize>,
    pub n_observations: usize,
    pub n_groups: usize,
    pub degenerate_groups: usize,
}

impl<'a> From<&'a SummaryRow> for SummaryRecord<'a> {
    fn from(row: &'a SummaryRow) -> Self {
        let s = &row.statistics;
        Self {
            source: &row.source,
            between_group_sample_variance: s.between_group_sample_variance,
            c0_between_group_sample_variance: s.c0_between_group_sample_variance,
            c1_between_group_sample_variance: s.c1_between_group_sample_variance,
            within_group_variance: s.within_group_variance,
            c0_within_group_variance: s.c0_within_group_variance,
            c1_within_group_variance: s.c1_within_group_variance,
            between_group_variance: s.between_group_variance,
            between_group_std: s.between_group_std,
            between_group_sample_std: s.between_group_sample_std,
            within_group_std: s.within_group_std,
            condition_0_mean: s.condition_0_mean,
            condition_1_mean: s.condition_1_mean,
            condition_0_higher: s.condition_0_higher,
            condition_1_higher: s.condition_1_higher,
            n_observations: s.n_observations,
            n_groups: s.n_groups,
            degenerate_groups: s.degenerate_groups,
        }
    }
}

/// Write the summary table of `report` to any writer.
pub fn write_summary_to<W: Write>(report: &PowerReport, writer: W) -> Result<(), DataError> {
    let mut csv = ::csv::Writer::from_writer(writer);
    for row in &report.summary {
        csv.serialize(SummaryRecord::from(row))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the summary table of `report` to `path`, creating parent directories.
pub fn write_summary(report: &PowerReport, path: &Path) -> Result<(), DataError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    write_summary_to(report, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::make_report;
    use tempfile::tempdir;

    #[test]
    fn test_summary_header_and_rows() {
        let mut buf = Vec::new();
        write_summary_to(&make_report(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("source,between_group_sample_variance,"));
        assert!(lines[0].ends_with(",n_observations,n_groups,degenerate_groups"));
        assert!(lines[1].starts_with("old_pilot,4.0,"));
        assert!(lines[2].starts_with("pgh,"));
        assert!(lines[3].starts_with("sampled,"));
    }

    #[test]
    fn test_absent_values_are_empty() {
        let mut buf = Vec::new();
        write_summary_to(&make_report(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        // old_pilot has no per-condition fields
        assert!(text.lines().nth(1).unwrap().contains(",,"));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("stats.csv");
        write_summary(&make_report(), &path).unwrap();

        let mut reader = ::csv::Reader::from_path(&path).unwrap();
        let sources: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[0].to_string())
            .collect();
        assert_eq!(sources, vec!["old_pilot", "pgh", "sampled"]);
    }
}
