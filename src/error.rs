//! Error types.
//!
//! Each pipeline stage has its own error enum; [`Error`] aggregates them for
//! callers that drive the whole pipeline.
//!
//! - [`DataError`]: pilot data does not match the expected schema (fatal)
//! - [`EstimationError`]: variance decomposition is undefined for the input
//! - [`FitError`]: a mixed-model fit failed (recovered per experiment)
//! - [`ConfigError`]: a run parameter is out of range

use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Estimation(#[from] EstimationError),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading pilot data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{column}' (found: {found:?})")]
    MissingColumn { column: String, found: Vec<String> },

    #[error("invalid value in column '{column}' at line {line}: '{value}'")]
    InvalidValue {
        line: usize,
        column: String,
        value: String,
    },

    #[error("malformed list in column '{column}' at line {line}: {message}")]
    MalformedList {
        line: usize,
        column: String,
        message: String,
    },

    #[error("list columns at line {line} disagree in length: {lengths:?}")]
    ListLengthMismatch {
        line: usize,
        lengths: Vec<(String, usize)>,
    },

    #[error("no rows left after filtering ({filter})")]
    NoRows { filter: String },
}

/// Errors raised while decomposing variance.
#[derive(Debug, Error)]
pub enum EstimationError {
    #[error("condition {condition} has no observations")]
    EmptyCondition { condition: usize },

    #[error("condition index {condition} is not 0 or 1")]
    UnknownCondition { condition: usize },

    #[error("group '{group}' has {observations} observation(s); at least 2 are required")]
    DegenerateGroup { group: String, observations: usize },

    #[error("{groups} usable group(s) found; at least {required} are required")]
    TooFewGroups { groups: usize, required: usize },

    #[error("group '{group}' in round '{round}' has no participants left to share the common good")]
    EmptyGroupRound { group: String, round: String },
}

/// Errors raised by the mixed-model fit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("{observations} observation(s) cannot identify {parameters} fixed effect(s)")]
    TooFewObservations {
        observations: usize,
        parameters: usize,
    },

    #[error("{what} has length {got}, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{groups} group(s) cannot identify a between-group variance")]
    TooFewGroups { groups: usize },

    #[error("fixed-effect design is singular")]
    SingularDesign,

    #[error("variance optimizer did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("objective is not finite at the optimum")]
    NonFinite,

    #[error("residual variance collapsed to zero")]
    DegenerateResidual,
}

/// Errors raised when validating a run configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
