//! Loader for algoinst-format pilot exports.
//!
//! Required columns: `experiment_name, session, global_group_id,
//! round_number, episode, participant_code, player_no_input, contribution,
//! punishment, common_good`. Extra columns are ignored.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use super::{rows, Columns, PilotData, PilotFormat, RoundObservation};
use crate::error::DataError;

const EXPERIMENT_NAME: &str = "experiment_name";
const SESSION: &str = "session";
const GROUP: &str = "global_group_id";
const ROUND: &str = "round_number";
const EPISODE: &str = "episode";
const PARTICIPANT: &str = "participant_code";
const NO_INPUT: &str = "player_no_input";
const CONTRIBUTION: &str = "contribution";
const PUNISHMENT: &str = "punishment";
const COMMON_GOOD: &str = "common_good";

/// Load an algoinst-format CSV, keeping rows of `experiment_name` only.
///
/// # Errors
/// Fails on the first missing column or unparseable value, or if no row
/// belongs to `experiment_name`.
pub fn load_algoinst_csv(path: &Path, experiment_name: &str) -> Result<PilotData, DataError> {
    let file = File::open(path)?;
    let data = read_algoinst(file, experiment_name)?;
    debug!(
        path = %path.display(),
        rows = data.len(),
        groups = data.n_groups(),
        "loaded algoinst pilot data"
    );
    Ok(data)
}

/// Read algoinst-format CSV from any reader.
pub fn read_algoinst<R: Read>(reader: R, experiment_name: &str) -> Result<PilotData, DataError> {
    let mut reader = ::csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let header = reader.headers()?.clone();
    let columns = Columns::new(&header);

    let experiment_col = columns.require(EXPERIMENT_NAME)?;
    let session_col = columns.require(SESSION)?;
    let group_col = columns.require(GROUP)?;
    let round_col = columns.require(ROUND)?;
    let episode_col = columns.require(EPISODE)?;
    let participant_col = columns.require(PARTICIPANT)?;
    let no_input_col = columns.require(NO_INPUT)?;
    let contribution_col = columns.require(CONTRIBUTION)?;
    let punishment_col = columns.require(PUNISHMENT)?;
    let common_good_col = columns.require(COMMON_GOOD)?;

    let mut observations = Vec::new();
    for row in rows(reader.records()) {
        let row = row?;
        if row.field(experiment_col) != experiment_name {
            continue;
        }

        let session = row.field(session_col).to_string();
        // Rounds repeat across episodes and sessions.
        let round = format!(
            "{}:{}:{}",
            session,
            row.field(round_col),
            row.field(episode_col)
        );

        observations.push(RoundObservation {
            group: row.field(group_col).to_string(),
            participant: row.field(participant_col).to_string(),
            round,
            contribution: row.number(contribution_col, CONTRIBUTION)?,
            punishment: row.number(punishment_col, PUNISHMENT)?,
            missing: row.flag(no_input_col, NO_INPUT)?,
            common_good: Some(row.number(common_good_col, COMMON_GOOD)?),
            session,
        });
    }

    if observations.is_empty() {
        return Err(DataError::NoRows {
            filter: format!("{EXPERIMENT_NAME} == {experiment_name:?}"),
        });
    }

    Ok(PilotData::new(PilotFormat::Algoinst, observations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "experiment_name,session,global_group_id,round_number,episode,participant_code,player_no_input,contribution,punishment,common_good";

    #[test]
    fn test_load_filters_experiment() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "trail_rounds_2,s1,g1,1,1,p1,False,10,0,32").unwrap();
        writeln!(file, "trail_rounds_2,s1,g1,1,1,p2,True,0,0,32").unwrap();
        writeln!(file, "other,s1,g1,1,1,p3,False,5,1,32").unwrap();
        writeln!(file, "trail_rounds_2,s1,g1,1,2,p1,0,7.5,2,12").unwrap();
        file.flush().unwrap();

        let data = load_algoinst_csv(file.path(), "trail_rounds_2").unwrap();
        assert_eq!(data.format, PilotFormat::Algoinst);
        assert_eq!(data.len(), 3);
        assert_eq!(data.sessions, vec!["s1".to_string()]);

        let first = &data.observations[0];
        assert_eq!(first.group, "g1");
        assert_eq!(first.participant, "p1");
        assert_eq!(first.contribution, 10.0);
        assert_eq!(first.common_good, Some(32.0));
        assert!(!first.missing);
        assert!(data.observations[1].missing);

        // episodes separate rounds with the same number
        assert_ne!(data.observations[0].round, data.observations[2].round);
        assert_eq!(data.observations[0].round, data.observations[1].round);
    }

    #[test]
    fn test_missing_column() {
        let csv = "experiment_name,session,global_group_id\ntrail_rounds_2,s1,g1\n";
        match read_algoinst(csv.as_bytes(), "trail_rounds_2") {
            Err(DataError::MissingColumn { column, found }) => {
                assert_eq!(column, "round_number");
                assert_eq!(found.len(), 3);
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_value_reports_line() {
        let csv = format!("{HEADER}\ntrail_rounds_2,s1,g1,1,1,p1,False,10,0,32\ntrail_rounds_2,s1,g1,1,1,p2,False,lots,0,32\n");
        match read_algoinst(csv.as_bytes(), "trail_rounds_2") {
            Err(DataError::InvalidValue { line, column, value }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "contribution");
                assert_eq!(value, "lots");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_no_matching_rows() {
        let csv = format!("{HEADER}\nother,s1,g1,1,1,p1,False,10,0,32\n");
        assert!(matches!(
            read_algoinst(csv.as_bytes(), "trail_rounds_2"),
            Err(DataError::NoRows { .. })
        ));
    }
}
