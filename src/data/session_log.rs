//! Loader for session-log pilot exports.
//!
//! Each row is one round of one session. The list columns hold one entry
//! per participant and are exploded into one [`RoundObservation`] each.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use super::{parse_bool, parse_list, rows, Columns, PilotData, PilotFormat, Row, RoundObservation};
use crate::constants::session_label;
use crate::error::DataError;

const SESSION: &str = "session";
const ROUND: &str = "round";
const GROUP_IDX: &str = "group_idx";
const CONTRIBUTIONS: &str = "contributions";
const GROUPS: &str = "groups";
const PUNISHMENTS: &str = "punishments";
const PARTICIPANTS: &str = "participant_codes";
const MISSING: &str = "missing_inputs";

/// Load a session-log CSV, keeping the given sessions.
///
/// An empty `sessions` slice keeps every session.
pub fn load_session_log_csv(path: &Path, sessions: &[String]) -> Result<PilotData, DataError> {
    let file = File::open(path)?;
    let data = read_session_log(file, sessions)?;
    for session in &data.sessions {
        debug!(
            session = %session,
            label = session_label(session).unwrap_or("unlabelled"),
            "loaded pilot session"
        );
    }
    Ok(data)
}

/// Read session-log CSV from any reader.
pub fn read_session_log<R: Read>(reader: R, sessions: &[String]) -> Result<PilotData, DataError> {
    let mut reader = ::csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let header = reader.headers()?.clone();
    let columns = Columns::new(&header);

    let session_col = columns.require(SESSION)?;
    let round_col = columns.require(ROUND)?;
    let list_cols = [
        (CONTRIBUTIONS, columns.require(CONTRIBUTIONS)?),
        (GROUPS, columns.require(GROUPS)?),
        (PUNISHMENTS, columns.require(PUNISHMENTS)?),
        (PARTICIPANTS, columns.require(PARTICIPANTS)?),
        (MISSING, columns.require(MISSING)?),
    ];
    let group_idx_col = columns.find(GROUP_IDX);
    if group_idx_col.is_none() {
        warn!("session log has no '{GROUP_IDX}' column; group keys use group and session only");
    }

    let mut observations = Vec::new();
    for row in rows(reader.records()) {
        let row = row?;
        let session = row.field(session_col);
        if !sessions.is_empty() && !sessions.iter().any(|s| s == session) {
            continue;
        }
        explode(&row, session_col, round_col, group_idx_col, &list_cols, &mut observations)?;
    }

    if observations.is_empty() {
        return Err(DataError::NoRows {
            filter: format!("{SESSION} in {sessions:?}"),
        });
    }

    Ok(PilotData::new(PilotFormat::SessionLog, observations))
}

/// Turn one session-round row into per-participant observations.
fn explode(
    row: &Row,
    session_col: usize,
    round_col: usize,
    group_idx_col: Option<usize>,
    list_cols: &[(&str, usize); 5],
    out: &mut Vec<RoundObservation>,
) -> Result<(), DataError> {
    let parse = |&(name, col): &(&str, usize)| {
        parse_list(row.field(col)).map_err(|message| DataError::MalformedList {
            line: row.line,
            column: name.to_string(),
            message,
        })
    };
    let contributions = parse(&list_cols[0])?;
    let groups = parse(&list_cols[1])?;
    let punishments = parse(&list_cols[2])?;
    let participants = parse(&list_cols[3])?;
    let missing = parse(&list_cols[4])?;

    let lengths = [
        contributions.len(),
        groups.len(),
        punishments.len(),
        participants.len(),
        missing.len(),
    ];
    if lengths.iter().any(|&n| n != lengths[0]) {
        return Err(DataError::ListLengthMismatch {
            line: row.line,
            lengths: list_cols
                .iter()
                .zip(lengths)
                .map(|(&(name, _), n)| (name.to_string(), n))
                .collect(),
        });
    }

    let session = row.field(session_col);
    let round = format!("{}:{}", session, row.field(round_col));
    let group_idx = group_idx_col.map_or("", |c| row.field(c));

    let number = |column: &str, raw: &str| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| row.invalid(column, raw))
    };

    for i in 0..contributions.len() {
        out.push(RoundObservation {
            session: session.to_string(),
            group: format!("{}_{}{}", groups[i], session, group_idx),
            participant: participants[i].clone(),
            round: round.clone(),
            contribution: number(CONTRIBUTIONS, &contributions[i])?,
            punishment: number(PUNISHMENTS, &punishments[i])?,
            missing: parse_bool(&missing[i]).ok_or_else(|| row.invalid(MISSING, &missing[i]))?,
            common_good: None,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "session,round,group_idx,contributions,groups,punishments,participant_codes,missing_inputs";

    fn write_log(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_explodes_lists_per_participant() {
        let file = write_log(&[
            r#"85dlorg9,1,0,"[10, 5]","['a', 'a']","[0, 2]","['p1', 'p2']","[False, True]""#,
            r#"other,1,0,"[1]","['a']","[0]","['p9']","[False]""#,
        ]);
        let data = load_session_log_csv(file.path(), &["85dlorg9".to_string()]).unwrap();

        assert_eq!(data.format, PilotFormat::SessionLog);
        assert_eq!(data.len(), 2);
        assert_eq!(data.sessions, vec!["85dlorg9".to_string()]);

        let p2 = &data.observations[1];
        assert_eq!(p2.group, "a_85dlorg90");
        assert_eq!(p2.participant, "p2");
        assert_eq!(p2.contribution, 5.0);
        assert_eq!(p2.punishment, 2.0);
        assert!(p2.missing);
        assert_eq!(p2.common_good, None);
    }

    #[test]
    fn test_empty_session_filter_keeps_all() {
        let file = write_log(&[
            r#"s1,1,0,"[1]","['a']","[0]","['p1']","[False]""#,
            r#"s2,1,0,"[1]","['a']","[0]","['p2']","[False]""#,
        ]);
        let data = load_session_log_csv(file.path(), &[]).unwrap();
        assert_eq!(data.sessions.len(), 2);
        assert_eq!(data.n_groups(), 2);
    }

    #[test]
    fn test_list_length_mismatch() {
        let csv = format!("{HEADER}\n\"s1\",1,0,\"[1, 2]\",\"['a']\",\"[0, 0]\",\"['p1', 'p2']\",\"[False, False]\"\n");
        match read_session_log(csv.as_bytes(), &[]) {
            Err(DataError::ListLengthMismatch { line, lengths }) => {
                assert_eq!(line, 2);
                assert_eq!(lengths[1], ("groups".to_string(), 1));
            }
            other => panic!("expected ListLengthMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_list() {
        let csv = format!("{HEADER}\ns1,1,0,\"[1\",\"['a']\",\"[0]\",\"['p1']\",\"[False]\"\n");
        assert!(matches!(
            read_session_log(csv.as_bytes(), &[]),
            Err(DataError::MalformedList { .. })
        ));
    }

    #[test]
    fn test_missing_group_idx_column() {
        let csv = "session,round,contributions,groups,punishments,participant_codes,missing_inputs\n\
                   s1,1,\"[3]\",\"['g']\",\"[0]\",\"['p']\",\"[0]\"\n";
        let data = read_session_log(csv.as_bytes(), &[]).unwrap();
        assert_eq!(data.observations[0].group, "g_s1");
    }
}
