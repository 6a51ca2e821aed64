//! JSON serialization for power reports.

use crate::power::PowerReport;

/// Serialize a report to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (non-finite floats are written as
/// `null`, so this should not happen for a [`PowerReport`]).
pub fn to_json(report: &PowerReport) -> Result<String, serde_json::Error> {
    serde_json::to_string(report)
}

/// Serialize a report to a pretty-printed JSON string.
///
/// # Errors
///
/// See [`to_json`].
pub fn to_json_pretty(report: &PowerReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::make_report;

    #[test]
    fn test_json_contains_summary_rows() {
        let json = to_json(&make_report()).unwrap();
        assert!(json.contains("\"old_pilot\""));
        assert!(json.contains("\"sampled\""));
        assert!(json.contains("\"empirical_power\":0.8"));
    }

    #[test]
    fn test_json_pretty_roundtrips() {
        let report = make_report();
        let json = to_json_pretty(&report).unwrap();
        assert!(json.contains('\n'));
        let back: PowerReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary, report.summary);
        assert_eq!(back.tallies, report.tallies);
    }
}
