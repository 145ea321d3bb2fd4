//! Signed token issuance and validation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use strata_core::{PrincipalId, TenantId};

use crate::claims::{JwtClaims, TokenKind, TokenValidationError, validate_claims};

/// Token lifetimes.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Access token lifetime (short-lived).
    pub access_ttl: Duration,
    /// Refresh token lifetime (long-lived; no refresh chaining).
    pub refresh_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(30),
        }
    }
}

impl TokenConfig {
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(String),

    /// Undecodable, wrong signature, or corrupt timestamps. Deliberately
    /// carries no distinguishing detail.
    #[error("token is invalid")]
    Invalid,

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Token signer collaborator.
///
/// Issues and validates signed tokens carrying the [`JwtClaims`] model.
pub trait TokenSigner: Send + Sync {
    fn issue(&self, claims: &JwtClaims) -> Result<String, TokenError>;

    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

impl<S> TokenSigner for Arc<S>
where
    S: TokenSigner + ?Sized,
{
    fn issue(&self, claims: &JwtClaims) -> Result<String, TokenError> {
        (**self).issue(claims)
    }

    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        (**self).validate(token, now)
    }
}

/// On-the-wire claim layout (compact names, unix timestamps).
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: PrincipalId,
    tid: TenantId,
    kind: TokenKind,
    roles: Vec<String>,
    perms: Vec<String>,
    iat: i64,
    exp: i64,
}

/// HMAC-SHA256 token signer.
pub struct Hs256TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl TokenSigner for Hs256TokenSigner {
    fn issue(&self, claims: &JwtClaims) -> Result<String, TokenError> {
        let wire = WireClaims {
            sub: claims.sub,
            tid: claims.tenant_id,
            kind: claims.kind,
            roles: claims.roles.clone(),
            perms: claims.permissions.clone(),
            iat: claims.issued_at.timestamp(),
            exp: claims.expires_at.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &wire, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        // Expiry is checked through `validate_claims` against the caller's
        // clock, not jsonwebtoken's internal one.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<WireClaims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Invalid)?;
        let wire = data.claims;

        let claims = JwtClaims {
            sub: wire.sub,
            tenant_id: wire.tid,
            kind: wire.kind,
            roles: wire.roles,
            permissions: wire.perms,
            issued_at: DateTime::from_timestamp(wire.iat, 0).ok_or(TokenError::Invalid)?,
            expires_at: DateTime::from_timestamp(wire.exp, 0).ok_or(TokenError::Invalid)?,
        };
        validate_claims(&claims, now)?;
        Ok(claims)
    }
}
