//! Domain error types for the contact enrichment server.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Column mapping configuration is invalid or resolves to zero supported columns
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Filesystem operation failed
    #[error("Filesystem error: {0}")]
    FileSystem(String),

    /// Archive extraction or packaging failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// CSV parsing or serialization failed
    #[error("CSV error: {0}")]
    Csv(String),

    /// Job was cancelled cooperatively
    #[error("cancelled")]
    Cancelled,
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("Invalid UUID: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Csv(err.to_string())
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        AppError::Archive(err.to_string())
    }
}
