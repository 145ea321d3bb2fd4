//! Service account aggregate (event-sourced).
//!
//! Machine credentials with a soft lifecycle: accounts are never deleted,
//! only deactivated. All mutation goes through commands that append events;
//! read models are projections over the stream.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use strata_auth::PasswordDigest;
use strata_core::{Aggregate, AggregateId, AggregateRoot, DomainError, PrincipalId, RoleId, TenantId};
use strata_events::Event;

// ─────────────────────────────────────────────────────────────────────────────
// Service Account ID
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for a service account within a tenant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceAccountId(Uuid);

impl ServiceAccountId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ServiceAccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ServiceAccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ServiceAccountId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<ServiceAccountId> for Uuid {
    fn from(value: ServiceAccountId) -> Self {
        value.0
    }
}

impl From<AggregateId> for ServiceAccountId {
    fn from(value: AggregateId) -> Self {
        Self(*value.as_uuid())
    }
}

impl From<ServiceAccountId> for AggregateId {
    fn from(value: ServiceAccountId) -> Self {
        AggregateId::from_uuid(value.0)
    }
}

/// Service accounts are principals for role assignment purposes.
impl From<ServiceAccountId> for PrincipalId {
    fn from(value: ServiceAccountId) -> Self {
        PrincipalId::from_uuid(value.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Service account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ServiceAccountStatus {
    /// Account can authenticate via client credentials.
    #[default]
    Active,
    /// Deactivated; credentials are refused but history is retained.
    Inactive,
}

impl core::fmt::Display for ServiceAccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ServiceAccountStatus::Active => write!(f, "Active"),
            ServiceAccountStatus::Inactive => write!(f, "Inactive"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Account Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Service account aggregate.
///
/// # Invariants
/// - Belongs to exactly one tenant (tenant_id is immutable after creation).
/// - Only the secret digest is ever held; plaintext never enters the stream.
/// - Never physically deleted, only deactivated.
/// - No-op transitions (deactivating an inactive account, re-assigning held
///   roles) are accepted idempotently and emit nothing.
#[derive(Debug, Clone)]
pub struct ServiceAccount {
    pub id: ServiceAccountId,
    pub tenant_id: Option<TenantId>,
    pub client_id: String,
    pub secret: PasswordDigest,
    pub description: String,
    pub status: ServiceAccountStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub roles: BTreeSet<RoleId>,
    pub version: u64,
    pub created: bool,
}

impl Default for ServiceAccount {
    fn default() -> Self {
        Self {
            id: ServiceAccountId::new(),
            tenant_id: None,
            client_id: String::new(),
            secret: PasswordDigest::new("", ""),
            description: String::new(),
            status: ServiceAccountStatus::Active,
            created_at: None,
            expires_at: None,
            roles: BTreeSet::new(),
            version: 0,
            created: false,
        }
    }
}

impl ServiceAccount {
    pub fn empty(id: ServiceAccountId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Whether client-credential authentication may even consider this
    /// account: created, ACTIVE, and not past its expiry.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.created
            && self.status == ServiceAccountStatus::Active
            && self.expires_at.is_none_or(|at| at > now)
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

impl AggregateRoot for ServiceAccount {
    type Id = ServiceAccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command to create a service account.
///
/// The client id, secret digest, and resolved expiry are produced by the
/// application service before the command is built; the aggregate itself is
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceAccount {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub client_id: String,
    pub secret: PasswordDigest,
    pub description: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command to update mutable details. `None` fields are left unchanged;
/// `expires_at: Some(None)` clears the expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub description: Option<String>,
    pub status: Option<ServiceAccountStatus>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command to replace the secret digest. The old secret is invalid the moment
/// the event is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotateSecret {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub secret: PasswordDigest,
    pub occurred_at: DateTime<Utc>,
}

/// Command to assign roles. Already-held role ids are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRoles {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub roles: Vec<RoleId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command to remove roles. Role ids not held are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveRoles {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub roles: Vec<RoleId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command to deactivate the account (soft delete).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deactivate {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Command to reactivate a deactivated account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activate {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub occurred_at: DateTime<Utc>,
}

/// All service account commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServiceAccountCommand {
    Create(CreateServiceAccount),
    UpdateDetails(UpdateDetails),
    RotateSecret(RotateSecret),
    AssignRoles(AssignRoles),
    RemoveRoles(RemoveRoles),
    Deactivate(Deactivate),
    Activate(Activate),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Event emitted when a service account is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAccountCreated {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub client_id: String,
    pub secret: PasswordDigest,
    pub description: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when details change. Carries changed fields only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailsUpdated {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub description: Option<String>,
    pub status: Option<ServiceAccountStatus>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when the secret is rotated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretRotated {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub secret: PasswordDigest,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when roles are assigned. Carries newly held roles only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolesAssigned {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub roles: Vec<RoleId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when roles are removed. Carries previously held roles only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolesRemoved {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub roles: Vec<RoleId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when the account is deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAccountDeactivated {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when the account is reactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAccountActivated {
    pub tenant_id: TenantId,
    pub account_id: ServiceAccountId,
    pub occurred_at: DateTime<Utc>,
}

/// All service account events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServiceAccountEvent {
    Created(ServiceAccountCreated),
    DetailsUpdated(DetailsUpdated),
    SecretRotated(SecretRotated),
    RolesAssigned(RolesAssigned),
    RolesRemoved(RolesRemoved),
    Deactivated(ServiceAccountDeactivated),
    Activated(ServiceAccountActivated),
}

impl Event for ServiceAccountEvent {
    const AGGREGATE_TYPE: &'static str = "iam.service_account";

    fn event_type(&self) -> &'static str {
        match self {
            ServiceAccountEvent::Created(_) => "iam.service_account.created",
            ServiceAccountEvent::DetailsUpdated(_) => "iam.service_account.details_updated",
            ServiceAccountEvent::SecretRotated(_) => "iam.service_account.secret_rotated",
            ServiceAccountEvent::RolesAssigned(_) => "iam.service_account.roles_assigned",
            ServiceAccountEvent::RolesRemoved(_) => "iam.service_account.roles_removed",
            ServiceAccountEvent::Deactivated(_) => "iam.service_account.deactivated",
            ServiceAccountEvent::Activated(_) => "iam.service_account.activated",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ServiceAccountEvent::Created(e) => e.occurred_at,
            ServiceAccountEvent::DetailsUpdated(e) => e.occurred_at,
            ServiceAccountEvent::SecretRotated(e) => e.occurred_at,
            ServiceAccountEvent::RolesAssigned(e) => e.occurred_at,
            ServiceAccountEvent::RolesRemoved(e) => e.occurred_at,
            ServiceAccountEvent::Deactivated(e) => e.occurred_at,
            ServiceAccountEvent::Activated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for ServiceAccount {
    type Command = ServiceAccountCommand;
    type Event = ServiceAccountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ServiceAccountEvent::Created(e) => self.apply_created(e),
            ServiceAccountEvent::DetailsUpdated(e) => self.apply_details_updated(e),
            ServiceAccountEvent::SecretRotated(e) => self.apply_secret_rotated(e),
            ServiceAccountEvent::RolesAssigned(e) => self.apply_roles_assigned(e),
            ServiceAccountEvent::RolesRemoved(e) => self.apply_roles_removed(e),
            ServiceAccountEvent::Deactivated(_) => {
                self.status = ServiceAccountStatus::Inactive;
            }
            ServiceAccountEvent::Activated(_) => {
                self.status = ServiceAccountStatus::Active;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ServiceAccountCommand::Create(cmd) => self.handle_create(cmd),
            ServiceAccountCommand::UpdateDetails(cmd) => self.handle_update_details(cmd),
            ServiceAccountCommand::RotateSecret(cmd) => self.handle_rotate_secret(cmd),
            ServiceAccountCommand::AssignRoles(cmd) => self.handle_assign_roles(cmd),
            ServiceAccountCommand::RemoveRoles(cmd) => self.handle_remove_roles(cmd),
            ServiceAccountCommand::Deactivate(cmd) => self.handle_deactivate(cmd),
            ServiceAccountCommand::Activate(cmd) => self.handle_activate(cmd),
        }
    }
}

impl ServiceAccount {
    // ─────────────────────────────────────────────────────────────────────────
    // Command Handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn handle_create(&self, cmd: &CreateServiceAccount) -> Result<Vec<ServiceAccountEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("service account already exists"));
        }
        if cmd.client_id.trim().is_empty() {
            return Err(DomainError::validation("client id cannot be empty"));
        }

        Ok(vec![ServiceAccountEvent::Created(ServiceAccountCreated {
            tenant_id: cmd.tenant_id,
            account_id: cmd.account_id,
            client_id: cmd.client_id.trim().to_string(),
            secret: cmd.secret.clone(),
            description: cmd.description.trim().to_string(),
            expires_at: cmd.expires_at,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_details(&self, cmd: &UpdateDetails) -> Result<Vec<ServiceAccountEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;

        let description = cmd
            .description
            .as_ref()
            .filter(|d| **d != self.description)
            .cloned();
        let status = cmd.status.filter(|s| *s != self.status);
        let expires_at = cmd.expires_at.filter(|e| *e != self.expires_at);

        if description.is_none() && status.is_none() && expires_at.is_none() {
            // Nothing changed: accepted as a no-op.
            return Ok(vec![]);
        }

        Ok(vec![ServiceAccountEvent::DetailsUpdated(DetailsUpdated {
            tenant_id: cmd.tenant_id,
            account_id: cmd.account_id,
            description,
            status,
            expires_at,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rotate_secret(&self, cmd: &RotateSecret) -> Result<Vec<ServiceAccountEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;

        Ok(vec![ServiceAccountEvent::SecretRotated(SecretRotated {
            tenant_id: cmd.tenant_id,
            account_id: cmd.account_id,
            secret: cmd.secret.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_roles(&self, cmd: &AssignRoles) -> Result<Vec<ServiceAccountEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;

        let mut new_roles = Vec::new();
        for role in &cmd.roles {
            if !self.roles.contains(role) && !new_roles.contains(role) {
                new_roles.push(*role);
            }
        }
        if new_roles.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![ServiceAccountEvent::RolesAssigned(RolesAssigned {
            tenant_id: cmd.tenant_id,
            account_id: cmd.account_id,
            roles: new_roles,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_roles(&self, cmd: &RemoveRoles) -> Result<Vec<ServiceAccountEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;

        let mut removed = Vec::new();
        for role in &cmd.roles {
            if self.roles.contains(role) && !removed.contains(role) {
                removed.push(*role);
            }
        }
        if removed.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![ServiceAccountEvent::RolesRemoved(RolesRemoved {
            tenant_id: cmd.tenant_id,
            account_id: cmd.account_id,
            roles: removed,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &Deactivate) -> Result<Vec<ServiceAccountEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == ServiceAccountStatus::Inactive {
            return Ok(vec![]);
        }

        Ok(vec![ServiceAccountEvent::Deactivated(
            ServiceAccountDeactivated {
                tenant_id: cmd.tenant_id,
                account_id: cmd.account_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_activate(&self, cmd: &Activate) -> Result<Vec<ServiceAccountEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == ServiceAccountStatus::Active {
            return Ok(vec![]);
        }

        Ok(vec![ServiceAccountEvent::Activated(
            ServiceAccountActivated {
                tenant_id: cmd.tenant_id,
                account_id: cmd.account_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Appliers
    // ─────────────────────────────────────────────────────────────────────────

    fn apply_created(&mut self, e: &ServiceAccountCreated) {
        self.id = e.account_id;
        self.tenant_id = Some(e.tenant_id);
        self.client_id = e.client_id.clone();
        self.secret = e.secret.clone();
        self.description = e.description.clone();
        self.status = ServiceAccountStatus::Active;
        self.created_at = Some(e.occurred_at);
        self.expires_at = e.expires_at;
        self.created = true;
    }

    fn apply_details_updated(&mut self, e: &DetailsUpdated) {
        if let Some(description) = &e.description {
            self.description = description.clone();
        }
        if let Some(status) = e.status {
            self.status = status;
        }
        if let Some(expires_at) = e.expires_at {
            self.expires_at = expires_at;
        }
    }

    fn apply_secret_rotated(&mut self, e: &SecretRotated) {
        self.secret = e.secret.clone();
    }

    fn apply_roles_assigned(&mut self, e: &RolesAssigned) {
        self.roles.extend(e.roles.iter().copied());
    }

    fn apply_roles_removed(&mut self, e: &RolesRemoved) {
        for role in &e.roles {
            self.roles.remove(role);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn digest(payload: &str) -> PasswordDigest {
        PasswordDigest::new("argon2id", payload)
    }

    fn created_account(tenant_id: TenantId) -> ServiceAccount {
        let account_id = ServiceAccountId::new();
        let mut account = ServiceAccount::empty(account_id);
        let cmd = ServiceAccountCommand::Create(CreateServiceAccount {
            tenant_id,
            account_id,
            client_id: "svc-reporting".to_string(),
            secret: digest("initial"),
            description: "nightly reporting job".to_string(),
            expires_at: Some(now() + Duration::days(365)),
            occurred_at: now(),
        });
        for event in account.handle(&cmd).unwrap() {
            account.apply(&event);
        }
        account
    }

    #[test]
    fn create_success() {
        let tenant_id = TenantId::new();
        let account = created_account(tenant_id);

        assert!(account.created);
        assert_eq!(account.tenant_id, Some(tenant_id));
        assert_eq!(account.client_id, "svc-reporting");
        assert_eq!(account.status, ServiceAccountStatus::Active);
        assert_eq!(account.version, 1);
    }

    #[test]
    fn create_twice_is_a_conflict() {
        let tenant_id = TenantId::new();
        let account = created_account(tenant_id);

        let cmd = ServiceAccountCommand::Create(CreateServiceAccount {
            tenant_id,
            account_id: account.id,
            client_id: "svc-other".to_string(),
            secret: digest("x"),
            description: String::new(),
            expires_at: None,
            occurred_at: now(),
        });
        let err = account.handle(&cmd).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn rotate_secret_replaces_the_digest() {
        let tenant_id = TenantId::new();
        let mut account = created_account(tenant_id);
        let old = account.secret.clone();

        let cmd = ServiceAccountCommand::RotateSecret(RotateSecret {
            tenant_id,
            account_id: account.id,
            secret: digest("rotated"),
            occurred_at: now(),
        });
        for event in account.handle(&cmd).unwrap() {
            account.apply(&event);
        }

        assert_ne!(account.secret, old);
        assert_eq!(account.secret, digest("rotated"));
    }

    #[test]
    fn deactivate_is_idempotent() {
        let tenant_id = TenantId::new();
        let mut account = created_account(tenant_id);

        let cmd = ServiceAccountCommand::Deactivate(Deactivate {
            tenant_id,
            account_id: account.id,
            occurred_at: now(),
        });
        let events = account.handle(&cmd).unwrap();
        assert_eq!(events.len(), 1);
        for event in events {
            account.apply(&event);
        }
        assert_eq!(account.status, ServiceAccountStatus::Inactive);

        // Second deactivate: accepted, emits nothing.
        assert!(account.handle(&cmd).unwrap().is_empty());
    }

    #[test]
    fn activate_restores_an_inactive_account() {
        let tenant_id = TenantId::new();
        let mut account = created_account(tenant_id);

        let deactivate = ServiceAccountCommand::Deactivate(Deactivate {
            tenant_id,
            account_id: account.id,
            occurred_at: now(),
        });
        for event in account.handle(&deactivate).unwrap() {
            account.apply(&event);
        }

        let activate = ServiceAccountCommand::Activate(Activate {
            tenant_id,
            account_id: account.id,
            occurred_at: now(),
        });
        for event in account.handle(&activate).unwrap() {
            account.apply(&event);
        }
        assert_eq!(account.status, ServiceAccountStatus::Active);

        // Re-activating an active account emits nothing.
        assert!(account.handle(&activate).unwrap().is_empty());
    }

    #[test]
    fn assign_roles_is_idempotent_and_emits_new_roles_only() {
        let tenant_id = TenantId::new();
        let mut account = created_account(tenant_id);
        let r1 = RoleId::new();
        let r2 = RoleId::new();
        let r3 = RoleId::new();

        let cmd = ServiceAccountCommand::AssignRoles(AssignRoles {
            tenant_id,
            account_id: account.id,
            roles: vec![r1, r2, r1],
            occurred_at: now(),
        });
        let events = account.handle(&cmd).unwrap();
        let ServiceAccountEvent::RolesAssigned(e) = &events[0] else {
            panic!("expected RolesAssigned event");
        };
        assert_eq!(e.roles, vec![r1, r2]);
        for event in &events {
            account.apply(event);
        }

        // Re-assigning held roles is a no-op.
        assert!(account.handle(&cmd).unwrap().is_empty());

        // A mixed batch only emits the genuinely new role.
        let mixed = ServiceAccountCommand::AssignRoles(AssignRoles {
            tenant_id,
            account_id: account.id,
            roles: vec![r2, r3],
            occurred_at: now(),
        });
        let events = account.handle(&mixed).unwrap();
        let ServiceAccountEvent::RolesAssigned(e) = &events[0] else {
            panic!("expected RolesAssigned event");
        };
        assert_eq!(e.roles, vec![r3]);
    }

    #[test]
    fn remove_roles_ignores_roles_not_held() {
        let tenant_id = TenantId::new();
        let mut account = created_account(tenant_id);
        let held = RoleId::new();
        let other = RoleId::new();

        let assign = ServiceAccountCommand::AssignRoles(AssignRoles {
            tenant_id,
            account_id: account.id,
            roles: vec![held],
            occurred_at: now(),
        });
        for event in account.handle(&assign).unwrap() {
            account.apply(&event);
        }

        let remove = ServiceAccountCommand::RemoveRoles(RemoveRoles {
            tenant_id,
            account_id: account.id,
            roles: vec![held, other],
            occurred_at: now(),
        });
        let events = account.handle(&remove).unwrap();
        let ServiceAccountEvent::RolesRemoved(e) = &events[0] else {
            panic!("expected RolesRemoved event");
        };
        assert_eq!(e.roles, vec![held]);
        for event in &events {
            account.apply(event);
        }
        assert!(account.roles.is_empty());

        // Removing a role that is not held is a no-op.
        assert!(account.handle(&remove).unwrap().is_empty());
    }

    #[test]
    fn update_details_emits_changed_fields_only() {
        let tenant_id = TenantId::new();
        let mut account = created_account(tenant_id);

        let cmd = ServiceAccountCommand::UpdateDetails(UpdateDetails {
            tenant_id,
            account_id: account.id,
            description: Some("weekly reporting job".to_string()),
            status: Some(ServiceAccountStatus::Active), // unchanged
            expires_at: None,
            occurred_at: now(),
        });
        let events = account.handle(&cmd).unwrap();
        let ServiceAccountEvent::DetailsUpdated(e) = &events[0] else {
            panic!("expected DetailsUpdated event");
        };
        assert_eq!(e.description.as_deref(), Some("weekly reporting job"));
        assert!(e.status.is_none());
        assert!(e.expires_at.is_none());
        for event in &events {
            account.apply(event);
        }

        // Re-issuing the same command changes nothing and emits nothing.
        assert!(account.handle(&cmd).unwrap().is_empty());
    }

    #[test]
    fn tenant_isolation_enforced() {
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let account = created_account(tenant_a);

        let cmd = ServiceAccountCommand::RotateSecret(RotateSecret {
            tenant_id: tenant_b,
            account_id: account.id,
            secret: digest("hijack"),
            occurred_at: now(),
        });
        let err = account.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }

    #[test]
    fn commands_against_a_missing_account_are_not_found() {
        let account = ServiceAccount::empty(ServiceAccountId::new());
        let cmd = ServiceAccountCommand::Deactivate(Deactivate {
            tenant_id: TenantId::new(),
            account_id: account.id,
            occurred_at: now(),
        });
        assert!(matches!(
            account.handle(&cmd).unwrap_err(),
            DomainError::NotFound
        ));
    }

    #[test]
    fn usability_tracks_status_and_expiry() {
        let tenant_id = TenantId::new();
        let mut account = created_account(tenant_id);
        let t = now();

        assert!(account.is_usable(t));
        assert!(!account.is_usable(t + Duration::days(366)));

        let cmd = ServiceAccountCommand::Deactivate(Deactivate {
            tenant_id,
            account_id: account.id,
            occurred_at: t,
        });
        for event in account.handle(&cmd).unwrap() {
            account.apply(&event);
        }
        assert!(!account.is_usable(t));
    }
}
