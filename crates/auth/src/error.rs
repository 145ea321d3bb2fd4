//! Authentication error surface.

use thiserror::Error;

/// Caller-visible authentication errors.
///
/// Every rejection after identifier parsing collapses into
/// `InvalidCredentials` so a caller cannot distinguish unknown principal,
/// bad credential, inactive account, or active lockout (enumeration
/// prevention). The distinguishing detail goes to the audit sink only.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login identifier could not be parsed into (principal, tenant).
    #[error("malformed login identifier")]
    MalformedIdentifier,

    /// The single generic rejection for all credential-path failures.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Collaborator failure (directory, hasher, signer). Detail is logged,
    /// never echoed.
    #[error("authentication unavailable")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}
