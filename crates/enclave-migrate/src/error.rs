//! Error types for record decoding.

use std::fmt;

/// Errors from the migration protocol.
///
/// Every variant is per-record: the caller drops the record, logs a
/// warning and carries on with the rest of the tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationError {
    /// A record could not be decoded (truncated, wrong version, or a field
    /// outside its domain).
    CorruptAgentRecord {
        /// Human-readable description of what went wrong.
        detail: String,
    },
}

impl MigrationError {
    pub(crate) fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptAgentRecord {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CorruptAgentRecord { detail } => write!(f, "corrupt agent record: {detail}"),
        }
    }
}

impl std::error::Error for MigrationError {}
