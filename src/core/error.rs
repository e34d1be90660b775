/// Error Module
///
/// Defines the error type shared by every layer of postfix-forward, from
/// statement construction down to the database drivers and the external
/// `postconf` process.
use thiserror::Error;

/// Error type for postfix-forward.
///
/// Driver errors are carried unchanged so callers can inspect them; the
/// remaining variants describe failures raised by this crate itself.
#[derive(Error, Debug)]
pub enum ForwardError {
    /// Errors reported by the SQLite driver
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Errors reported by the MySQL driver
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql::Error),

    /// Statement construction errors (invalid identifiers, empty column lists)
    #[error("Query error: {0}")]
    Query(String),

    /// Transactional scope misuse
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// The selected backend cannot perform the requested operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// No backend is registered under the requested identifier
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and terminal I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON rendering errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// External command failures (spawn errors and non-zero exits)
    #[error("Command error: {0}")]
    Command(String),

    /// Password prompt failures
    #[error("Prompt error: {0}")]
    Prompt(String),
}

/// Result alias using `ForwardError` as the error type.
pub type Result<T> = std::result::Result<T, ForwardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let db_err = ForwardError::Database(rusqlite::Error::ExecuteReturnedResults);
        assert!(db_err.to_string().contains("Database error"));

        let query_err = ForwardError::Query("invalid identifier".to_string());
        assert!(query_err.to_string().contains("Query error"));

        let backend_err = ForwardError::UnknownBackend("oracle".to_string());
        assert_eq!(backend_err.to_string(), "Unknown backend: oracle");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ForwardError = io_err.into();
        match err {
            ForwardError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let json_err = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let err: ForwardError = json_err.into();
        match err {
            ForwardError::Json(_) => {}
            _ => panic!("Expected JSON error"),
        }
    }
}
