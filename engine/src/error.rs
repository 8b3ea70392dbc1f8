//! Error types for the rowmirror engine.

use thiserror::Error;

/// All possible errors from the rowmirror engine.
///
/// Every variant maps onto a numeric status code so a host can report the
/// failure without re-deriving the taxonomy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Query errors
    #[error("invalid query parameter - {0}")]
    InvalidQueryParameter(String),

    #[error("invalid query operand - {0}")]
    InvalidQueryOperand(String),

    #[error("unknown sort parameter - {0}")]
    UnknownSortParameter(String),

    #[error("page[number] must be a number")]
    InvalidPageNumber,

    #[error("page[size] must be a number")]
    InvalidPageSize,

    // Input errors
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Numeric status code for this error.
    pub fn status_code(&self) -> u16 {
        400
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
