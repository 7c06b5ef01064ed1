//! Error types for quire.

use thiserror::Error;
use uuid::Uuid;

use crate::models::JobStatus;

/// Result type alias using quire's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for quire operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Job kind is not known to the handler registry
    #[error("Unknown job kind: {0}")]
    UnknownJobKind(String),

    /// Submission arguments failed validation
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Execution backend cannot accept work
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Status change that violates the job state machine
    #[error("Invalid transition for job {job_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    /// Content store query failed
    #[error("Content store error: {0}")]
    Store(String),

    /// Provider call (embedding, podcast, ingestion) failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP-equivalent status code for surfacing this error to callers.
    ///
    /// | Error | Status |
    /// |-------|--------|
    /// | `NotFound` | 404 |
    /// | `UnknownJobKind`, `InvalidArguments` | 400 |
    /// | `BackendUnavailable` | 503 |
    /// | everything else | 500 |
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::UnknownJobKind(_) | Error::InvalidArguments(_) => 400,
            Error::BackendUnavailable(_) => 503,
            _ => 500,
        }
    }

    /// Whether this error is a caller mistake rejected before any job exists.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::UnknownJobKind(_) | Error::InvalidArguments(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
