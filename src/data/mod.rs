//! Pilot data loading.
//!
//! Pilot studies record one row per participant and round of a public-goods
//! game with punishment. Two export formats are supported:
//!
//! - **algoinst**: one row per participant-round with a precomputed
//!   `common_good` column, filtered by `experiment_name`
//! - **session log**: one row per session-round with Python-literal list
//!   cells (`contributions`, `groups`, `punishments`, `participant_codes`,
//!   `missing_inputs`) holding one entry per participant
//!
//! Both loaders produce [`RoundObservation`]s; payoffs are derived later by
//! [`crate::estimation`].
//!
//! # Example
//!
//! ```ignore
//! use mixedpower::data::{load_algoinst_csv, load_session_log_csv};
//! use std::path::Path;
//!
//! let old = load_algoinst_csv(Path::new("pilot_old.csv"), "trail_rounds_2")?;
//! let new = load_session_log_csv(Path::new("pilot_new.csv"), &["85dlorg9".to_string()])?;
//! println!("{} + {} observations", old.len(), new.len());
//! ```

mod algoinst;
mod list;
mod session_log;

pub use algoinst::{load_algoinst_csv, read_algoinst};
pub use list::parse_list;
pub use session_log::{load_session_log_csv, read_session_log};

use std::collections::HashSet;

use ::csv::{StringRecord, StringRecordsIter};
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Layout of a pilot export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PilotFormat {
    /// One row per participant-round.
    Algoinst,
    /// One row per session-round with list-encoded participants.
    SessionLog,
}

/// One participant's record for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundObservation {
    /// Session identifier.
    pub session: String,
    /// Group key, unique across sessions.
    pub group: String,
    /// Participant identifier.
    pub participant: String,
    /// Round key, unique within a group.
    pub round: String,
    /// Own contribution to the common pot.
    pub contribution: f64,
    /// Own punishment spending.
    pub punishment: f64,
    /// Participant gave no input this round.
    pub missing: bool,
    /// Common good of the group this round, when the export carries it.
    pub common_good: Option<f64>,
}

/// Observations loaded from one pilot export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotData {
    /// Export layout the rows came from.
    pub format: PilotFormat,
    /// Rows in file order.
    pub observations: Vec<RoundObservation>,
    /// Sessions present after filtering.
    pub sessions: Vec<String>,
}

impl PilotData {
    pub(crate) fn new(format: PilotFormat, observations: Vec<RoundObservation>) -> Self {
        let sessions = {
            let mut seen = HashSet::new();
            observations
                .iter()
                .filter(|o| seen.insert(o.session.as_str()))
                .map(|o| o.session.clone())
                .collect()
        };
        Self {
            format,
            observations,
            sessions,
        }
    }

    /// Number of participant-round rows.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// True when no rows survived filtering.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Number of distinct groups.
    pub fn n_groups(&self) -> usize {
        self.observations
            .iter()
            .map(|o| o.group.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Column positions resolved from a header row.
pub(crate) struct Columns<'h> {
    header: &'h StringRecord,
}

impl<'h> Columns<'h> {
    pub(crate) fn new(header: &'h StringRecord) -> Self {
        Self { header }
    }

    /// Index of a required column.
    pub(crate) fn require(&self, name: &str) -> Result<usize, DataError> {
        self.find(name).ok_or_else(|| DataError::MissingColumn {
            column: name.to_string(),
            found: self.header.iter().map(str::to_string).collect(),
        })
    }

    /// Index of an optional column.
    pub(crate) fn find(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h.trim() == name)
    }
}

/// A data record with its 1-indexed file line.
pub(crate) struct Row {
    pub(crate) line: usize,
    pub(crate) record: StringRecord,
}

impl Row {
    pub(crate) fn field(&self, index: usize) -> &str {
        self.record.get(index).unwrap_or("").trim()
    }

    pub(crate) fn invalid(&self, column: &str, value: &str) -> DataError {
        DataError::InvalidValue {
            line: self.line,
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn number(&self, index: usize, column: &str) -> Result<f64, DataError> {
        let raw = self.field(index);
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.invalid(column, raw))
    }

    pub(crate) fn flag(&self, index: usize, column: &str) -> Result<bool, DataError> {
        let raw = self.field(index);
        parse_bool(raw).ok_or_else(|| self.invalid(column, raw))
    }
}

/// Iterate records with line numbers, stopping at the first CSV error.
pub(crate) fn rows<'r, R: std::io::Read + 'r>(
    records: StringRecordsIter<'r, R>,
) -> impl Iterator<Item = Result<Row, DataError>> + 'r {
    records.map(|result| {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        Ok(Row { line, record })
    })
}

/// Parse a boolean cell: `True`/`False`, `true`/`false` or `1`/`0`.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "True" | "true" | "TRUE" | "1" | "1.0" => Some(true),
        "False" | "false" | "FALSE" | "0" | "0.0" => Some(false),
        _ => None,
    }
}
