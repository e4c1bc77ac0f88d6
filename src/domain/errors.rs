//! Domain errors for the nightpatch reviewer.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors raised by ports and their adapters.
///
/// These are infrastructure failures: they fail a single repository task
/// (or abort startup) but never describe a problem with a proposed fix.
/// Rejections of a fix's content are values, see
/// [`RejectionReason`](crate::domain::models::RejectionReason).
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Review run not found: {0}")]
    RunNotFound(Uuid),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}
