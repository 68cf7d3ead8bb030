//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Failure taxonomy shared by every requisition and stock operation.
///
/// Each variant carries enough detail (offending id, field or state) for the
/// caller to decide between retrying and giving up. Nothing in the core
/// swallows these; they surface unchanged to the HTTP layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Unknown order, line item or part.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input: empty cart, missing user field, out-of-range quantity.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested transition is not permitted from the current status.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Stale write (optimistic concurrency) or a duplicate terminal collection.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence was unreachable, timed out or returned corrupt data.
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl DomainError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageFailure(msg.into())
    }

    /// Stable machine-readable code, used in API error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::InvalidState(_) => "invalid_state",
            Self::Conflict(_) => "conflict",
            Self::StorageFailure(_) => "storage_failure",
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::StorageFailure(_))
    }
}
