//! Service account application service.
//!
//! Orchestrates the write path (commands through the dispatcher) and the read
//! path (projection views). Everything non-deterministic happens here, at
//! command-construction time: client id and secret generation, hashing, and
//! expiry policy resolution. The plaintext secret returned from create and
//! rotate comes from this write path directly; it is never recovered from a
//! read model and never stored anywhere.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use strata_access::AccessStore;
use strata_accounts::{
    Activate, AssignRoles, CreateServiceAccount, Deactivate, RemoveRoles, RotateSecret,
    ServiceAccount, ServiceAccountCommand, ServiceAccountConfig, ServiceAccountId,
    ServiceAccountStatus, UpdateDetails, generate_client_id, generate_client_secret,
};
use strata_auth::CredentialHasher;
use strata_core::{DomainError, TenantId};
use strata_events::{AuditEvent, AuditOutcome, AuditSink, EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::service_accounts::{
    SERVICE_ACCOUNT_AGGREGATE, ServiceAccountProjection, ServiceAccountView,
};
use crate::read_model::TenantStore;

/// Attempts to allocate a fresh client id before giving up.
const CLIENT_ID_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Generic client-credential rejection. Unknown client id, inactive or
    /// expired account, and secret mismatch all collapse into this; the audit
    /// trail records which.
    #[error("invalid client credentials")]
    InvalidCredentials,

    #[error("not found")]
    NotFound,

    #[error("access denied")]
    Denied,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("service account operation failed")]
    Internal(#[source] anyhow::Error),
}

impl ServiceError {
    fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Validation(msg) => ServiceError::Validation(msg),
            DispatchError::Concurrency(msg) => ServiceError::Conflict(msg),
            DispatchError::InvariantViolation(_) | DispatchError::TenantIsolation(_) => {
                ServiceError::Denied
            }
            DispatchError::Denied => ServiceError::Denied,
            DispatchError::NotFound => ServiceError::NotFound,
            other => ServiceError::internal(other),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                ServiceError::Validation(msg)
            }
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::InvariantViolation(_) | DomainError::Denied => ServiceError::Denied,
            DomainError::NotFound => ServiceError::NotFound,
        }
    }
}

/// Result of creating a service account or rotating its secret.
#[derive(Debug, Clone)]
pub struct CreatedCredentials {
    pub view: ServiceAccountView,
    /// Plaintext secret. This is the only moment it exists; it cannot be
    /// retrieved again.
    pub client_secret: String,
}

/// Write and read operations over service accounts.
pub struct ServiceAccountService<S, B, R> {
    dispatcher: CommandDispatcher<S, B>,
    projection: ServiceAccountProjection<R>,
    access: Arc<dyn AccessStore>,
    hasher: CredentialHasher,
    config: ServiceAccountConfig,
    audit: Arc<dyn AuditSink>,
}

impl<S, B, R> ServiceAccountService<S, B, R>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    R: TenantStore<ServiceAccountId, ServiceAccountView>,
{
    pub fn new(
        dispatcher: CommandDispatcher<S, B>,
        projection: ServiceAccountProjection<R>,
        access: Arc<dyn AccessStore>,
        hasher: CredentialHasher,
        config: ServiceAccountConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            dispatcher,
            projection,
            access,
            hasher,
            config,
            audit,
        }
    }

    /// Create a service account. Returns the view together with the one-time
    /// plaintext secret.
    pub fn create(
        &self,
        tenant_id: TenantId,
        description: &str,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<CreatedCredentials, ServiceError> {
        let expires_at = self.config.resolve_expiry(now, expires_at)?;
        let client_id = self.unique_client_id(tenant_id)?;
        let client_secret = generate_client_secret();
        let secret = self
            .hasher
            .hash(&client_secret)
            .map_err(ServiceError::internal)?;

        let account_id = ServiceAccountId::new();
        self.dispatch(
            tenant_id,
            account_id,
            ServiceAccountCommand::Create(CreateServiceAccount {
                tenant_id,
                account_id,
                client_id,
                secret,
                description: description.to_string(),
                expires_at,
                occurred_at: now,
            }),
        )?;

        let view = self.require_view(tenant_id, account_id)?;
        Ok(CreatedCredentials {
            view,
            client_secret,
        })
    }

    /// Rotate the secret. The previous secret is invalid as soon as this
    /// returns; the new plaintext is returned exactly once.
    pub fn rotate_secret(
        &self,
        tenant_id: TenantId,
        account_id: ServiceAccountId,
        now: DateTime<Utc>,
    ) -> Result<CreatedCredentials, ServiceError> {
        let client_secret = generate_client_secret();
        let secret = self
            .hasher
            .hash(&client_secret)
            .map_err(ServiceError::internal)?;

        self.dispatch(
            tenant_id,
            account_id,
            ServiceAccountCommand::RotateSecret(RotateSecret {
                tenant_id,
                account_id,
                secret,
                occurred_at: now,
            }),
        )?;

        let view = self.require_view(tenant_id, account_id)?;
        Ok(CreatedCredentials {
            view,
            client_secret,
        })
    }

    pub fn update_details(
        &self,
        tenant_id: TenantId,
        account_id: ServiceAccountId,
        description: Option<String>,
        status: Option<ServiceAccountStatus>,
        expires_at: Option<Option<DateTime<Utc>>>,
        now: DateTime<Utc>,
    ) -> Result<ServiceAccountView, ServiceError> {
        let expires_at = match expires_at {
            None => None,
            Some(None) if self.config.allow_no_expiration => Some(None),
            Some(None) => {
                return Err(ServiceError::Validation(
                    "an expiry is required by policy".to_string(),
                ));
            }
            Some(Some(at)) => Some(self.config.resolve_expiry(now, Some(at))?),
        };

        self.dispatch(
            tenant_id,
            account_id,
            ServiceAccountCommand::UpdateDetails(UpdateDetails {
                tenant_id,
                account_id,
                description,
                status,
                expires_at,
                occurred_at: now,
            }),
        )?;
        self.require_view(tenant_id, account_id)
    }

    /// Assign roles. Every role must exist, and a tenant-scoped role must
    /// belong to the account's tenant; a mismatch rejects the whole batch
    /// before any event is emitted.
    pub fn assign_roles(
        &self,
        tenant_id: TenantId,
        account_id: ServiceAccountId,
        roles: &[strata_core::RoleId],
        now: DateTime<Utc>,
    ) -> Result<ServiceAccountView, ServiceError> {
        for role_id in roles {
            let role = self.access.role(*role_id).ok_or(ServiceError::NotFound)?;
            if let Some(role_tenant) = role.tenant_id {
                if role_tenant != tenant_id {
                    self.audit.record(AuditEvent::new(
                        "access.role.assignment_rejected",
                        Some(account_id.into()),
                        Some(tenant_id),
                        AuditOutcome::Denied,
                        format!("role '{}' belongs to tenant {role_tenant}", role.name),
                    ));
                    return Err(ServiceError::Denied);
                }
            }
        }

        let committed = self.dispatch(
            tenant_id,
            account_id,
            ServiceAccountCommand::AssignRoles(AssignRoles {
                tenant_id,
                account_id,
                roles: roles.to_vec(),
                occurred_at: now,
            }),
        )?;

        // Mirror into the access store so effective-permission computation is
        // uniform across users and service accounts.
        if !committed.is_empty() {
            for role_id in roles {
                self.access.assign_role(account_id.into(), *role_id);
            }
        }
        self.require_view(tenant_id, account_id)
    }

    pub fn remove_roles(
        &self,
        tenant_id: TenantId,
        account_id: ServiceAccountId,
        roles: &[strata_core::RoleId],
        now: DateTime<Utc>,
    ) -> Result<ServiceAccountView, ServiceError> {
        self.dispatch(
            tenant_id,
            account_id,
            ServiceAccountCommand::RemoveRoles(RemoveRoles {
                tenant_id,
                account_id,
                roles: roles.to_vec(),
                occurred_at: now,
            }),
        )?;
        for role_id in roles {
            self.access.unassign_role(account_id.into(), *role_id);
        }
        self.require_view(tenant_id, account_id)
    }

    pub fn deactivate(
        &self,
        tenant_id: TenantId,
        account_id: ServiceAccountId,
        now: DateTime<Utc>,
    ) -> Result<ServiceAccountView, ServiceError> {
        self.dispatch(
            tenant_id,
            account_id,
            ServiceAccountCommand::Deactivate(Deactivate {
                tenant_id,
                account_id,
                occurred_at: now,
            }),
        )?;
        self.require_view(tenant_id, account_id)
    }

    pub fn activate(
        &self,
        tenant_id: TenantId,
        account_id: ServiceAccountId,
        now: DateTime<Utc>,
    ) -> Result<ServiceAccountView, ServiceError> {
        self.dispatch(
            tenant_id,
            account_id,
            ServiceAccountCommand::Activate(Activate {
                tenant_id,
                account_id,
                occurred_at: now,
            }),
        )?;
        self.require_view(tenant_id, account_id)
    }

    pub fn get(
        &self,
        tenant_id: TenantId,
        account_id: ServiceAccountId,
    ) -> Result<ServiceAccountView, ServiceError> {
        self.projection
            .view(tenant_id, account_id)
            .ok_or(ServiceError::NotFound)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ServiceAccountView> {
        self.projection.list(tenant_id)
    }

    /// Validate client credentials for the token endpoint.
    ///
    /// The account must be ACTIVE and unexpired before the secret is even
    /// compared. All rejection reasons collapse into one generic error.
    pub fn validate_client_credentials(
        &self,
        tenant_id: TenantId,
        client_id: &str,
        client_secret: &str,
        now: DateTime<Utc>,
    ) -> Result<ServiceAccountView, ServiceError> {
        let Some(view) = self.projection.find_by_client_id(tenant_id, client_id) else {
            self.audit_credentials(None, tenant_id, AuditOutcome::Failure, "unknown client id");
            return Err(ServiceError::InvalidCredentials);
        };

        if !view.is_usable(now) {
            self.audit_credentials(
                Some(view.id),
                tenant_id,
                AuditOutcome::Denied,
                "inactive or expired account",
            );
            return Err(ServiceError::InvalidCredentials);
        }

        let matches = self
            .hasher
            .verify(client_secret, &view.secret)
            .map_err(ServiceError::internal)?;
        if !matches {
            self.audit_credentials(
                Some(view.id),
                tenant_id,
                AuditOutcome::Failure,
                "secret mismatch",
            );
            return Err(ServiceError::InvalidCredentials);
        }

        self.audit_credentials(Some(view.id), tenant_id, AuditOutcome::Success, "accepted");
        Ok(view)
    }

    /// Rebuild the read model for a tenant by replaying the event streams.
    pub fn rebuild_projection(&self, tenant_id: TenantId) -> Result<(), ServiceError> {
        self.projection.clear_tenant(tenant_id);
        let events = self
            .dispatcher
            .store()
            .load_tenant(tenant_id, SERVICE_ACCOUNT_AGGREGATE)
            .map_err(ServiceError::internal)?;
        for stored in &events {
            self.projection.apply_json(&stored.to_envelope());
        }
        Ok(())
    }

    fn dispatch(
        &self,
        tenant_id: TenantId,
        account_id: ServiceAccountId,
        command: ServiceAccountCommand,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        let committed = self.dispatcher.dispatch::<ServiceAccount>(
            tenant_id,
            account_id.into(),
            command,
            |aggregate_id| ServiceAccount::empty(aggregate_id.into()),
        )?;

        // Read-your-writes: the bus also carries these events to subscribed
        // workers, but the projector is idempotent so the direct application
        // and a later redelivery cannot disagree.
        for stored in &committed {
            self.projection.apply_json(&stored.to_envelope());
        }
        Ok(committed)
    }

    fn unique_client_id(&self, tenant_id: TenantId) -> Result<String, ServiceError> {
        for _ in 0..CLIENT_ID_ATTEMPTS {
            let candidate = generate_client_id();
            if self
                .projection
                .find_by_client_id(tenant_id, &candidate)
                .is_none()
            {
                return Ok(candidate);
            }
        }
        Err(ServiceError::Conflict(
            "could not allocate a unique client id".to_string(),
        ))
    }

    fn require_view(
        &self,
        tenant_id: TenantId,
        account_id: ServiceAccountId,
    ) -> Result<ServiceAccountView, ServiceError> {
        self.projection
            .view(tenant_id, account_id)
            .ok_or(ServiceError::NotFound)
    }

    fn audit_credentials(
        &self,
        account: Option<ServiceAccountId>,
        tenant_id: TenantId,
        outcome: AuditOutcome,
        detail: &str,
    ) {
        self.audit.record(AuditEvent::new(
            "iam.service_account.credentials",
            account.map(Into::into),
            Some(tenant_id),
            outcome,
            detail,
        ));
    }
}
