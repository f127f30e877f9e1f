//! Error types for censusdb.
//!
//! Every failure surfaces immediately to the caller; nothing here is retried.
//! [`CensusError::kind`] separates bad input from backend or resource trouble
//! so a request layer can map errors onto 4xx and 5xx responses.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CensusError>;

#[derive(Debug, Error)]
pub enum CensusError {
    /// A category name outside the closed set.
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),

    #[error("geometry has no coordinates")]
    EmptyGeometry,

    #[error("invalid code pattern {pattern:?}: {reason}")]
    PatternSyntax { pattern: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No pooled connection became free before the acquisition timeout.
    #[error("connection pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Stored data failed the typed row decoder.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`CensusError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something unusable.
    BadInput,
    /// The backend or one of its resources failed.
    Backend,
}

impl CensusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CensusError::UnknownCategory(_)
            | CensusError::MalformedGeometry(_)
            | CensusError::EmptyGeometry
            | CensusError::PatternSyntax { .. }
            | CensusError::InvalidInput(_) => ErrorKind::BadInput,
            CensusError::PoolExhausted(_)
            | CensusError::BackendUnavailable(_)
            | CensusError::InvalidRow(_)
            | CensusError::Config(_) => ErrorKind::Backend,
        }
    }

    pub fn is_bad_input(&self) -> bool {
        self.kind() == ErrorKind::BadInput
    }

    pub(crate) fn pattern(pattern: &str, reason: impl Into<String>) -> Self {
        CensusError::PatternSyntax {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for CensusError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::InvalidColumnName(_)
            | rusqlite::Error::IntegralValueOutOfRange(..) => {
                CensusError::InvalidRow(err.to_string())
            }
            other => CensusError::BackendUnavailable(other.to_string()),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<postgres::Error> for CensusError {
    fn from(err: postgres::Error) -> Self {
        CensusError::BackendUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for CensusError {
    fn from(err: serde_json::Error) -> Self {
        CensusError::MalformedGeometry(err.to_string())
    }
}
