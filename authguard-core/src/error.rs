use thiserror::Error;

use crate::response::AuthError;

/// Top-level error type for the authguard core.
///
/// Business failures that already carry a safe user-facing rendering are
/// wrapped in [`Error::Auth`]; everything else is internal detail that must
/// only ever reach the operational log, never a response body.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    /// A value thrown by a collaborator that no one classified.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Record not found")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Invalid rate limit rule: {0}")]
    InvalidRule(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event sink error: {0}")]
    Sink(String),

    #[error("Event query error: {0}")]
    Query(String),
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Unexpected(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Unexpected(value.to_string())
    }
}

impl Error {
    /// Whether this error is a business failure with a safe rendering.
    pub fn is_classified(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
