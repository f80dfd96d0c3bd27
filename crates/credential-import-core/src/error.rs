//! Error types for reading and importing credential files.

use thiserror::Error;

use crate::models::EntityCounts;
use crate::validate::ValidationReport;

/// Errors raised while reading the tabular input.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The stream was read from without being rewound first.
    #[error("input stream is at byte {position}, rewind it before reading rows")]
    StreamPosition { position: u64 },

    /// Tabular syntax is broken.
    #[error("malformed CSV near line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReadError {
    pub(crate) fn malformed(line: u64, reason: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            reason: reason.into(),
        }
    }
}

impl From<csv::Error> for ReadError {
    fn from(err: csv::Error) -> Self {
        let line_of = |pos: Option<csv::Position>| pos.map(|p| p.line()).unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(e) => ReadError::Io(e),
            csv::ErrorKind::UnequalLengths {
                pos,
                expected_len,
                len,
            } => ReadError::malformed(
                line_of(pos),
                format!("expected {} fields, found {}", expected_len, len),
            ),
            csv::ErrorKind::Utf8 { pos, err } => {
                ReadError::malformed(line_of(pos), format!("invalid UTF-8: {}", err))
            }
            other => ReadError::malformed(0, format!("{:?}", other)),
        }
    }
}

/// Errors raised by [`CoreImporter`](crate::importer::CoreImporter).
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Read(#[from] ReadError),

    /// Validation reported errors; nothing was written.
    #[error("input failed validation: {}", .0.error_keys().join(", "))]
    Invalid(ValidationReport),

    /// The store rejected a write. Records created before the failure remain.
    #[error("store write failed at line {line} after creating {} records: {cause:#}", .created.total())]
    Store {
        line: u64,
        created: EntityCounts,
        cause: anyhow::Error,
    },
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::Read(ReadError::Io(err))
    }
}
