//! Error types for authdb.

use thiserror::Error;

/// Common error type for authdb.
///
/// Every variant except `Config` and `Validation` is a storage-layer failure
/// and is treated as transient by callers.
#[derive(Error, Debug)]
pub enum AuthDbError {
    /// Database error.
    ///
    /// Errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// A storage call did not finish within its time bound.
    #[error("storage operation timed out after {0} ms")]
    Timeout(u64),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for user-supplied input or configuration values.
    #[error("validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for AuthDbError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AuthDbError::DatabaseConnection(e.to_string())
            }
            other => AuthDbError::Database(other.to_string()),
        }
    }
}

/// Result type alias for authdb operations.
pub type Result<T> = std::result::Result<T, AuthDbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_display() {
        let err = AuthDbError::Database("no such table: accounts".to_string());
        assert_eq!(err.to_string(), "database error: no such table: accounts");
    }

    #[test]
    fn test_timeout_error_display() {
        let err = AuthDbError::Timeout(250);
        assert_eq!(err.to_string(), "storage operation timed out after 250 ms");
    }

    #[test]
    fn test_validation_error_display() {
        let err = AuthDbError::Validation("session secret is empty".to_string());
        assert_eq!(err.to_string(), "validation error: session secret is empty");
    }

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let err: AuthDbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, AuthDbError::DatabaseConnection(_)));
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        let err: AuthDbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AuthDbError::Database(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AuthDbError = io_err.into();
        assert!(matches!(err, AuthDbError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
