//! Login orchestration.
//!
//! Each step is a potential rejection point, in order: identifier parsing,
//! lockout check, principal resolution, credential verification, status
//! check, token issuance. Everything after parsing fails with the same
//! generic error; the audit sink records which step actually rejected.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use strata_access::{AccessStore, RoleAccessService};
use strata_core::{PrincipalId, TenantId};
use strata_events::{AuditEvent, AuditOutcome, AuditSink};

use crate::claims::{JwtClaims, TokenKind};
use crate::error::AuthError;
use crate::lockout::AccountLockoutService;
use crate::password::CredentialHasher;
use crate::principal::{PrincipalDirectory, UserRecord, UserStatus};
use crate::token::{TokenConfig, TokenSigner};

/// A login attempt.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    /// Login identifier. Without an explicit `tenant_hint`, the tenant is
    /// embedded as `user@<tenant-id>`.
    pub identifier: String,
    /// Explicit tenant hint; takes precedence over an embedded one.
    pub tenant_hint: Option<TenantId>,
    pub password: String,
}

/// Successful login result.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub principal_id: PrincipalId,
    pub tenant_id: TenantId,
    /// Signed short-lived access token.
    pub access_token: String,
    /// Signed long-lived refresh token.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Resolves a principal within a tenant and turns a credential into a signed
/// token pair.
///
/// Depends on the tenant *data model* only; request-scoped tenant binding is
/// the gate's concern, not this service's.
pub struct AuthenticationService<D, S> {
    directory: Arc<D>,
    lockout: AccountLockoutService<Arc<D>>,
    access: Arc<RoleAccessService<S>>,
    hasher: CredentialHasher,
    signer: Arc<dyn TokenSigner>,
    tokens: TokenConfig,
    audit: Arc<dyn AuditSink>,
}

impl<D, S> AuthenticationService<D, S>
where
    D: PrincipalDirectory,
    S: AccessStore,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        directory: Arc<D>,
        lockout: AccountLockoutService<Arc<D>>,
        access: Arc<RoleAccessService<S>>,
        hasher: CredentialHasher,
        signer: Arc<dyn TokenSigner>,
        tokens: TokenConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            directory,
            lockout,
            access,
            hasher,
            signer,
            tokens,
            audit,
        }
    }

    pub fn login(&self, request: &LoginRequest, now: DateTime<Utc>) -> Result<LoginSuccess, AuthError> {
        let (login_key, tenant_id) = parse_identifier(&request.identifier, request.tenant_hint)?;

        let Some(user) = self.resolve(tenant_id, &login_key)? else {
            // Unknown principal: same outcome as a bad credential.
            self.audit_login(None, tenant_id, AuditOutcome::Failure, "unknown principal");
            return Err(AuthError::InvalidCredentials);
        };

        if self
            .lockout
            .is_locked(user.id, tenant_id, now)
            .map_err(AuthError::internal)?
        {
            self.audit_login(Some(user.id), tenant_id, AuditOutcome::Denied, "account locked");
            return Err(AuthError::InvalidCredentials);
        }

        // Re-read: a lazy lock release above may have restored ACTIVE status.
        let Some(user) = self.resolve(tenant_id, &login_key)? else {
            self.audit_login(None, tenant_id, AuditOutcome::Failure, "unknown principal");
            return Err(AuthError::InvalidCredentials);
        };

        let credential_ok = self
            .hasher
            .verify(&request.password, &user.password)
            .map_err(AuthError::internal)?;

        if !credential_ok || user.status != UserStatus::Active {
            let detail = if credential_ok {
                "principal not active"
            } else {
                "credential mismatch"
            };
            let locked = self
                .lockout
                .record_failed_attempt(user.id, tenant_id, now)
                .map_err(AuthError::internal)?;
            debug!(%tenant_id, locked, "login rejected");
            self.audit_login(Some(user.id), tenant_id, AuditOutcome::Failure, detail);
            return Err(AuthError::InvalidCredentials);
        }

        self.lockout.reset_attempts(user.id, tenant_id);
        self.directory
            .touch_last_authenticated(tenant_id, user.id, now)
            .map_err(AuthError::internal)?;

        let success = self.issue_tokens(&user, now)?;
        self.audit_login(Some(user.id), tenant_id, AuditOutcome::Success, "login");
        Ok(success)
    }

    fn resolve(&self, tenant_id: TenantId, login_key: &str) -> Result<Option<UserRecord>, AuthError> {
        self.directory
            .find_by_login(tenant_id, login_key)
            .map_err(|e| {
                error!(%tenant_id, error = %e, "principal lookup failed");
                AuthError::internal(e)
            })
    }

    fn issue_tokens(&self, user: &UserRecord, now: DateTime<Utc>) -> Result<LoginSuccess, AuthError> {
        let roles: Vec<String> = self
            .access
            .roles_of(user.id)
            .into_iter()
            .map(|r| r.name)
            .collect();
        let permissions: Vec<String> = self
            .access
            .effective_permissions(user.id)
            .into_iter()
            .collect();

        let access_claims = JwtClaims {
            sub: user.id,
            tenant_id: user.tenant_id,
            kind: TokenKind::Access,
            roles: roles.clone(),
            permissions: permissions.clone(),
            issued_at: now,
            expires_at: now + self.tokens.access_ttl,
        };
        let refresh_claims = JwtClaims {
            kind: TokenKind::Refresh,
            expires_at: now + self.tokens.refresh_ttl,
            ..access_claims.clone()
        };

        let access_token = self
            .signer
            .issue(&access_claims)
            .map_err(AuthError::internal)?;
        let refresh_token = self
            .signer
            .issue(&refresh_claims)
            .map_err(AuthError::internal)?;

        Ok(LoginSuccess {
            principal_id: user.id,
            tenant_id: user.tenant_id,
            access_token,
            refresh_token,
            expires_in: self.tokens.access_ttl.num_seconds(),
        })
    }

    fn audit_login(
        &self,
        principal: Option<PrincipalId>,
        tenant: TenantId,
        outcome: AuditOutcome,
        detail: &str,
    ) {
        self.audit.record(AuditEvent::new(
            "auth.login",
            principal,
            Some(tenant),
            outcome,
            detail,
        ));
    }
}

/// Split a login identifier into (principal lookup key, tenant).
///
/// An explicit hint wins; otherwise the tenant id is embedded after the last
/// `@` (so email-style keys still parse when suffixed with `@<tenant-id>`).
fn parse_identifier(
    identifier: &str,
    tenant_hint: Option<TenantId>,
) -> Result<(String, TenantId), AuthError> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(AuthError::MalformedIdentifier);
    }

    if let Some(tenant_id) = tenant_hint {
        return Ok((identifier.to_string(), tenant_id));
    }

    let (key, tenant_str) = identifier
        .rsplit_once('@')
        .ok_or(AuthError::MalformedIdentifier)?;
    if key.is_empty() {
        return Err(AuthError::MalformedIdentifier);
    }
    let tenant_id = tenant_str
        .parse::<TenantId>()
        .map_err(|_| AuthError::MalformedIdentifier)?;
    Ok((key.to_string(), tenant_id))
}
