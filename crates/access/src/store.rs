//! Role/permission storage abstraction and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use strata_core::{DomainError, DomainResult, PrincipalId, RoleId, TenantId};

use crate::role::{Permission, PermissionId, Role};

/// Storage seam for the role/permission model.
///
/// Mutations that enforce uniqueness (`insert_role`, `update_role`) must be
/// atomic check-and-write operations in the implementation.
pub trait AccessStore: Send + Sync {
    /// Insert a role, enforcing per-scope name uniqueness.
    fn insert_role(&self, role: Role) -> DomainResult<()>;
    /// Replace an existing role, re-enforcing per-scope name uniqueness.
    fn update_role(&self, role: Role) -> DomainResult<()>;
    /// Remove a role together with its permission grants and assignments.
    fn remove_role(&self, id: RoleId) -> DomainResult<()>;
    fn role(&self, id: RoleId) -> Option<Role>;
    /// Roles visible in a scope: tenant-scoped for `Some`, global for `None`.
    fn roles_in_scope(&self, tenant_id: Option<TenantId>) -> Vec<Role>;

    /// Register a system-defined permission (bootstrap only).
    fn register_permission(&self, permission: Permission);
    fn permission(&self, id: PermissionId) -> Option<Permission>;

    /// Grant a permission to a role (idempotent).
    fn grant_permission(&self, role: RoleId, permission: PermissionId);
    fn revoke_permission(&self, role: RoleId, permission: PermissionId);
    fn role_permission_ids(&self, role: RoleId) -> Vec<PermissionId>;

    /// Assign a role to a principal (idempotent).
    fn assign_role(&self, principal: PrincipalId, role: RoleId);
    fn unassign_role(&self, principal: PrincipalId, role: RoleId);
    fn assigned_role_ids(&self, principal: PrincipalId) -> Vec<RoleId>;
}

impl<S> AccessStore for Arc<S>
where
    S: AccessStore + ?Sized,
{
    fn insert_role(&self, role: Role) -> DomainResult<()> {
        (**self).insert_role(role)
    }
    fn update_role(&self, role: Role) -> DomainResult<()> {
        (**self).update_role(role)
    }
    fn remove_role(&self, id: RoleId) -> DomainResult<()> {
        (**self).remove_role(id)
    }
    fn role(&self, id: RoleId) -> Option<Role> {
        (**self).role(id)
    }
    fn roles_in_scope(&self, tenant_id: Option<TenantId>) -> Vec<Role> {
        (**self).roles_in_scope(tenant_id)
    }
    fn register_permission(&self, permission: Permission) {
        (**self).register_permission(permission)
    }
    fn permission(&self, id: PermissionId) -> Option<Permission> {
        (**self).permission(id)
    }
    fn grant_permission(&self, role: RoleId, permission: PermissionId) {
        (**self).grant_permission(role, permission)
    }
    fn revoke_permission(&self, role: RoleId, permission: PermissionId) {
        (**self).revoke_permission(role, permission)
    }
    fn role_permission_ids(&self, role: RoleId) -> Vec<PermissionId> {
        (**self).role_permission_ids(role)
    }
    fn assign_role(&self, principal: PrincipalId, role: RoleId) {
        (**self).assign_role(principal, role)
    }
    fn unassign_role(&self, principal: PrincipalId, role: RoleId) {
        (**self).unassign_role(principal, role)
    }
    fn assigned_role_ids(&self, principal: PrincipalId) -> Vec<RoleId> {
        (**self).assigned_role_ids(principal)
    }
}

#[derive(Debug, Default)]
struct AccessState {
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    grants: HashMap<RoleId, HashSet<PermissionId>>,
    assignments: HashMap<PrincipalId, HashSet<RoleId>>,
}

/// In-memory access store for tests/dev.
///
/// A single `RwLock` over the whole state keeps uniqueness checks atomic.
#[derive(Debug, Default)]
pub struct InMemoryAccessStore {
    state: RwLock<AccessState>,
}

impl InMemoryAccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, AccessState> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, AccessState> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn name_taken(state: &AccessState, role: &Role) -> bool {
        state
            .roles
            .values()
            .any(|r| r.id != role.id && r.tenant_id == role.tenant_id && r.name == role.name)
    }
}

impl AccessStore for InMemoryAccessStore {
    fn insert_role(&self, role: Role) -> DomainResult<()> {
        let mut state = self.write();
        if state.roles.contains_key(&role.id) {
            return Err(DomainError::conflict("role id already exists"));
        }
        if Self::name_taken(&state, &role) {
            return Err(DomainError::conflict(format!(
                "role name '{}' already exists in scope",
                role.name
            )));
        }
        state.roles.insert(role.id, role);
        Ok(())
    }

    fn update_role(&self, role: Role) -> DomainResult<()> {
        let mut state = self.write();
        if !state.roles.contains_key(&role.id) {
            return Err(DomainError::not_found());
        }
        if Self::name_taken(&state, &role) {
            return Err(DomainError::conflict(format!(
                "role name '{}' already exists in scope",
                role.name
            )));
        }
        state.roles.insert(role.id, role);
        Ok(())
    }

    fn remove_role(&self, id: RoleId) -> DomainResult<()> {
        let mut state = self.write();
        if state.roles.remove(&id).is_none() {
            return Err(DomainError::not_found());
        }
        state.grants.remove(&id);
        for assigned in state.assignments.values_mut() {
            assigned.remove(&id);
        }
        Ok(())
    }

    fn role(&self, id: RoleId) -> Option<Role> {
        self.read().roles.get(&id).cloned()
    }

    fn roles_in_scope(&self, tenant_id: Option<TenantId>) -> Vec<Role> {
        self.read()
            .roles
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    fn register_permission(&self, permission: Permission) {
        self.write().permissions.insert(permission.id, permission);
    }

    fn permission(&self, id: PermissionId) -> Option<Permission> {
        self.read().permissions.get(&id).cloned()
    }

    fn grant_permission(&self, role: RoleId, permission: PermissionId) {
        self.write().grants.entry(role).or_default().insert(permission);
    }

    fn revoke_permission(&self, role: RoleId, permission: PermissionId) {
        if let Some(granted) = self.write().grants.get_mut(&role) {
            granted.remove(&permission);
        }
    }

    fn role_permission_ids(&self, role: RoleId) -> Vec<PermissionId> {
        self.read()
            .grants
            .get(&role)
            .map(|granted| granted.iter().copied().collect())
            .unwrap_or_default()
    }

    fn assign_role(&self, principal: PrincipalId, role: RoleId) {
        self.write()
            .assignments
            .entry(principal)
            .or_default()
            .insert(role);
    }

    fn unassign_role(&self, principal: PrincipalId, role: RoleId) {
        if let Some(assigned) = self.write().assignments.get_mut(&principal) {
            assigned.remove(&role);
        }
    }

    fn assigned_role_ids(&self, principal: PrincipalId) -> Vec<RoleId> {
        self.read()
            .assignments
            .get(&principal)
            .map(|assigned| assigned.iter().copied().collect())
            .unwrap_or_default()
    }
}
