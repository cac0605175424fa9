//! Ingress error taxonomy for the bulk load phase.
//!
//! Any of these aborts the whole load: the surrounding transaction is rolled
//! back and no partial rows remain visible. Optimization and provisioning
//! failures are plain `anyhow` errors because they never undo committed data.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("header has {found} columns, expected {expected}")]
    HeaderLength { expected: usize, found: usize },

    #[error("header mismatch at column {position}: expected \"{expected}\", found \"{found}\"")]
    HeaderMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}, column \"{column}\": cannot convert \"{value}\" to {expected}")]
    TypeCoercion {
        line: u64,
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("line {line}, column \"{column}\": null value in non-nullable column")]
    NullViolation { line: u64, column: String },

    #[error("line {line}: input is not valid UTF-8")]
    Encoding { line: u64 },

    #[error("line {line}: malformed record: {message}")]
    Malformed { line: u64, message: String },
}

impl IngestError {
    /// File line the error was detected at, for operator-facing reports.
    pub fn line(&self) -> Option<u64> {
        match self {
            IngestError::HeaderLength { .. } | IngestError::HeaderMismatch { .. } => Some(1),
            IngestError::ColumnCount { line, .. }
            | IngestError::TypeCoercion { line, .. }
            | IngestError::NullViolation { line, .. }
            | IngestError::Encoding { line }
            | IngestError::Malformed { line, .. } => Some(*line),
        }
    }
}
