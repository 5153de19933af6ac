//! Error types for tablepatch-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tablepatch-core
#[derive(Debug, Error)]
pub enum Error {
    /// A required source table is malformed or empty after filtering
    #[error("malformed table '{path}': {message}")]
    Format { path: PathBuf, message: String },

    /// A column a step depends on is absent from a table's header
    #[error("table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    /// A foreign-key lookup failed while in strict mode
    #[error("no row with {key_column}='{key}' in table '{table}'")]
    Referential {
        table: String,
        key_column: String,
        key: String,
    },

    /// Post-pipeline structural drift detected by the integrity gate
    #[error(transparent)]
    Integrity(#[from] IntegrityViolation),

    /// A step referenced a table the plan never loaded
    #[error("table '{0}' is not loaded in the registry")]
    TableNotLoaded(String),

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV-level error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Soft errors are caught at the step boundary, logged to the report,
    /// and the run continues. Everything else aborts the run.
    pub fn is_soft(&self) -> bool {
        matches!(self, Error::MissingColumn { .. })
    }
}

/// Structural drift found when comparing a mutated table to its reference
/// snapshot. Always terminal: the gate rejects, it never repairs.
#[derive(Debug, Error)]
pub enum IntegrityViolation {
    /// Header sequences no longer match order-for-order
    #[error("header drift in '{table}': expected {expected} columns, found {found}")]
    HeaderDrift {
        table: String,
        expected: usize,
        found: usize,
    },

    /// Record counts diverged
    #[error("row count drift in '{table}': expected {expected}, actual {actual}")]
    RowCountDrift {
        table: String,
        expected: usize,
        actual: usize,
    },

    /// An append-only table mutated one of its pre-existing records
    #[error("record {index} of append-only table '{table}' was mutated")]
    RowDrift { table: String, index: usize },

    /// A key column carries duplicate non-empty values
    #[error("duplicate values in key column '{column}' of '{table}': {examples:?}")]
    DuplicateKey {
        table: String,
        column: String,
        examples: Vec<DuplicateExample>,
    },
}

/// One offending duplicate: the value and the two record indices carrying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateExample {
    pub value: String,
    pub first: usize,
    pub second: usize,
}
