//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business/domain failures (validation,
/// invariants, conflicts). Infrastructure failures (store, signing, hashing)
/// are modelled in their own layers and must never surface their detail to a
/// caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Client-supplied input failed validation (missing/malformed tenant
    /// header, malformed login identifier, bad field values).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found.
    #[error("not found")]
    NotFound,

    /// A conflict occurred (duplicate name in scope, duplicate client id,
    /// stale version under optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization denied. Deliberately carries no detail: distinct denial
    /// reasons must stay indistinguishable to the caller.
    #[error("access denied")]
    Denied,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn denied() -> Self {
        Self::Denied
    }
}
