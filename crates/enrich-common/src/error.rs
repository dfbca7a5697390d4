//! Error types for the enrichment backfill.

use thiserror::Error;

/// Result type alias using EnrichError.
pub type EnrichResult<T> = Result<T, EnrichError>;

/// Primary error type for backfill operations.
#[derive(Debug, Error)]
pub enum EnrichError {
    // === Request Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Storage Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl EnrichError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            EnrichError::MissingParameter(_) | EnrichError::InvalidParameter { .. } => 400,
            _ => 500,
        }
    }

    /// True when the error means the environment itself is unreachable.
    pub fn is_environment_failure(&self) -> bool {
        matches!(
            self,
            EnrichError::DatabaseError(_) | EnrichError::StorageError(_)
        )
    }
}

impl From<serde_json::Error> for EnrichError {
    fn from(err: serde_json::Error) -> Self {
        EnrichError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for EnrichError {
    fn from(err: std::io::Error) -> Self {
        EnrichError::InternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err = EnrichError::InvalidParameter {
            param: "kind".to_string(),
            message: "unknown".to_string(),
        };
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(EnrichError::DatabaseError("down".into()).http_status_code(), 500);
        assert_eq!(EnrichError::InternalError("x".into()).http_status_code(), 500);
    }

    #[test]
    fn test_environment_failure() {
        assert!(EnrichError::DatabaseError("x".into()).is_environment_failure());
        assert!(EnrichError::StorageError("x".into()).is_environment_failure());
        assert!(!EnrichError::MissingParameter("kind".into()).is_environment_failure());
        assert!(!EnrichError::SerializationError("x".into()).is_environment_failure());
    }
}
