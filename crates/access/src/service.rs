//! Role/permission assignment and effective-permission computation.

use std::collections::BTreeSet;
use std::sync::Arc;

use strata_core::{DomainError, DomainResult, PrincipalId, RoleId, TenantId};
use strata_events::{AuditEvent, AuditOutcome, AuditSink};

use crate::role::{Permission, PermissionId, Role};
use crate::store::AccessStore;

/// Authority level of the caller performing a role operation.
///
/// Managing global roles requires platform authority; tenant authority is
/// enough for roles scoped to the caller's own tenant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Authority {
    Tenant,
    Platform,
}

/// Role/permission model shared by users and service accounts.
pub struct RoleAccessService<S> {
    store: S,
    audit: Arc<dyn AuditSink>,
}

impl<S> RoleAccessService<S>
where
    S: AccessStore,
{
    pub fn new(store: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Create a role. `tenant_id = None` creates a global role and requires
    /// platform authority.
    pub fn create_role(
        &self,
        authority: Authority,
        tenant_id: Option<TenantId>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> DomainResult<Role> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }
        self.require_scope_authority(authority, tenant_id)?;

        let role = Role {
            id: RoleId::new(),
            name: name.trim().to_string(),
            description: description.into(),
            tenant_id,
        };
        self.store.insert_role(role.clone())?;

        self.audit.record(AuditEvent::new(
            "access.role.created",
            None,
            tenant_id,
            AuditOutcome::Success,
            format!("role '{}'", role.name),
        ));
        Ok(role)
    }

    /// Rename or re-describe a role. Scope cannot change after creation.
    pub fn update_role(
        &self,
        authority: Authority,
        role_id: RoleId,
        name: Option<String>,
        description: Option<String>,
    ) -> DomainResult<Role> {
        let mut role = self.store.role(role_id).ok_or(DomainError::NotFound)?;
        self.require_scope_authority(authority, role.tenant_id)?;

        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("role name cannot be empty"));
            }
            role.name = name.trim().to_string();
        }
        if let Some(description) = description {
            role.description = description;
        }

        self.store.update_role(role.clone())?;
        Ok(role)
    }

    pub fn delete_role(&self, authority: Authority, role_id: RoleId) -> DomainResult<()> {
        let role = self.store.role(role_id).ok_or(DomainError::NotFound)?;
        self.require_scope_authority(authority, role.tenant_id)?;

        self.store.remove_role(role_id)?;
        self.audit.record(AuditEvent::new(
            "access.role.deleted",
            None,
            role.tenant_id,
            AuditOutcome::Success,
            format!("role '{}'", role.name),
        ));
        Ok(())
    }

    /// Grant a system-defined permission to a role. Idempotent.
    pub fn add_permission(&self, role_id: RoleId, permission_id: PermissionId) -> DomainResult<()> {
        if self.store.role(role_id).is_none() {
            return Err(DomainError::NotFound);
        }
        if self.store.permission(permission_id).is_none() {
            return Err(DomainError::NotFound);
        }
        self.store.grant_permission(role_id, permission_id);
        Ok(())
    }

    /// Revoke a permission from a role. Idempotent.
    pub fn remove_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> DomainResult<()> {
        if self.store.role(role_id).is_none() {
            return Err(DomainError::NotFound);
        }
        self.store.revoke_permission(role_id, permission_id);
        Ok(())
    }

    /// Assign a role to a principal.
    ///
    /// Invariant (enforced here, at assignment time): a tenant-scoped role
    /// may only be assigned to a principal of the same tenant. A mismatch is
    /// rejected and nothing is persisted. Idempotent on repeat assignment.
    pub fn assign_role(
        &self,
        principal: PrincipalId,
        principal_tenant: TenantId,
        role_id: RoleId,
    ) -> DomainResult<()> {
        let role = self.store.role(role_id).ok_or(DomainError::NotFound)?;

        if let Some(role_tenant) = role.tenant_id {
            if role_tenant != principal_tenant {
                self.audit.record(AuditEvent::new(
                    "access.role.assignment_rejected",
                    Some(principal),
                    Some(principal_tenant),
                    AuditOutcome::Denied,
                    format!(
                        "role '{}' belongs to tenant {role_tenant}, principal belongs to {principal_tenant}",
                        role.name
                    ),
                ));
                return Err(DomainError::denied());
            }
        }

        self.store.assign_role(principal, role_id);
        self.audit.record(AuditEvent::new(
            "access.role.assigned",
            Some(principal),
            Some(principal_tenant),
            AuditOutcome::Success,
            format!("role '{}'", role.name),
        ));
        Ok(())
    }

    /// Remove a role from a principal. Idempotent.
    pub fn remove_role(&self, principal: PrincipalId, role_id: RoleId) -> DomainResult<()> {
        if self.store.role(role_id).is_none() {
            return Err(DomainError::NotFound);
        }
        self.store.unassign_role(principal, role_id);
        Ok(())
    }

    /// All roles currently assigned to a principal.
    pub fn roles_of(&self, principal: PrincipalId) -> Vec<Role> {
        self.store
            .assigned_role_ids(principal)
            .into_iter()
            .filter_map(|id| self.store.role(id))
            .collect()
    }

    /// Effective permissions: the union of permission names over all roles
    /// currently assigned (global and tenant-scoped), computed on demand.
    pub fn effective_permissions(&self, principal: PrincipalId) -> BTreeSet<String> {
        let mut effective = BTreeSet::new();
        for role_id in self.store.assigned_role_ids(principal) {
            for permission_id in self.store.role_permission_ids(role_id) {
                if let Some(permission) = self.store.permission(permission_id) {
                    effective.insert(permission.name);
                }
            }
        }
        effective
    }

    /// Expose the underlying store (bootstrap: permission registration).
    pub fn store(&self) -> &S {
        &self.store
    }

    fn require_scope_authority(
        &self,
        authority: Authority,
        scope: Option<TenantId>,
    ) -> DomainResult<()> {
        if scope.is_none() && authority != Authority::Platform {
            return Err(DomainError::denied());
        }
        Ok(())
    }
}
