//! Unified error handling for the worker.

use crate::config::ConfigError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] rowmirror_engine::Error),

    #[error("an error occurred while requesting to the database")]
    DatabaseRequestFailed(#[source] Option<sqlx::Error>),

    #[error("resource not found")]
    ResourceNotFound,

    #[error("no content")]
    NoContent,

    #[error("method not allowed")]
    MethodNotAllowed,

    /// A step inside a transaction failed; the transaction was rolled back.
    #[error("database transaction error")]
    Transaction(#[source] Box<AppError>),

    #[error("undefined account type")]
    UndefinedAccountType,

    #[error("source row has no id")]
    MissingSourceId,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] std::io::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseRequestFailed(Some(err))
    }
}

impl AppError {
    /// Status code of this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Engine(e) => e.status_code(),
            AppError::ResourceNotFound => 404,
            AppError::NoContent => 204,
            AppError::MethodNotAllowed => 405,
            AppError::Config(_) | AppError::Schema(_) => 500,
            AppError::DatabaseRequestFailed(_)
            | AppError::Transaction(_)
            | AppError::UndefinedAccountType
            | AppError::MissingSourceId => 400,
        }
    }

    /// The innermost error, unwrapping transaction failures.
    pub fn root_cause(&self) -> &AppError {
        match self {
            AppError::Transaction(inner) => inner.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for the worker.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(AppError::ResourceNotFound.status_code(), 404);
        assert_eq!(AppError::NoContent.status_code(), 204);
        assert_eq!(AppError::MethodNotAllowed.status_code(), 405);
        assert_eq!(AppError::DatabaseRequestFailed(None).status_code(), 400);
        assert_eq!(
            AppError::from(rowmirror_engine::Error::InvalidPageSize).status_code(),
            400
        );
    }

    #[test]
    fn transaction_error_hides_cause() {
        let err = AppError::Transaction(Box::new(AppError::UndefinedAccountType));
        assert_eq!(err.to_string(), "database transaction error");
        assert_eq!(err.status_code(), 400);
        assert!(matches!(err.root_cause(), AppError::UndefinedAccountType));
    }

    #[test]
    fn engine_messages_pass_through() {
        let err = AppError::from(rowmirror_engine::Error::InvalidQueryOperand("between".into()));
        assert_eq!(err.to_string(), "invalid query operand - between");
    }
}
