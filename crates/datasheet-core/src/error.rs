//! Error types for datasheet-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in datasheet-core
#[derive(Debug, Error)]
pub enum Error {
    /// A field with this id already exists in the field map
    #[error("Duplicate field id: {0}")]
    DuplicateField(String),

    /// Field id not present in the field map
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Record id not present in the datasheet
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Cell data does not have the shape the field's type requires
    #[error("Invalid cell data for field {field}: expected {expected}, got {actual}")]
    InvalidCellData {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}
