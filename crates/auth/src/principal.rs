//! Principal directory: user records and the storage seam for lookups.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use strata_core::{DomainResult, PrincipalId, TenantId};

use crate::password::PasswordDigest;

/// Human user account status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UserStatus {
    #[default]
    Active,
    /// Locked by the lockout service; cleared lazily when the lock expires.
    Locked,
    /// Administratively disabled.
    Disabled,
}

/// A user record as the authentication flow sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: PrincipalId,
    pub tenant_id: TenantId,
    pub username: String,
    pub email: String,
    pub password: PasswordDigest,
    pub status: UserStatus,
    pub last_authenticated_at: Option<DateTime<Utc>>,
}

/// Storage seam for principal lookup and status transitions.
///
/// Lookups are always tenant-scoped; there is no cross-tenant resolution of
/// a login identifier.
pub trait PrincipalDirectory: Send + Sync {
    /// Resolve a user by username **or** email within a tenant.
    fn find_by_login(&self, tenant_id: TenantId, login: &str) -> DomainResult<Option<UserRecord>>;

    fn set_status(
        &self,
        tenant_id: TenantId,
        principal: PrincipalId,
        status: UserStatus,
    ) -> DomainResult<()>;

    fn touch_last_authenticated(
        &self,
        tenant_id: TenantId,
        principal: PrincipalId,
        at: DateTime<Utc>,
    ) -> DomainResult<()>;
}

impl<D> PrincipalDirectory for Arc<D>
where
    D: PrincipalDirectory + ?Sized,
{
    fn find_by_login(&self, tenant_id: TenantId, login: &str) -> DomainResult<Option<UserRecord>> {
        (**self).find_by_login(tenant_id, login)
    }

    fn set_status(
        &self,
        tenant_id: TenantId,
        principal: PrincipalId,
        status: UserStatus,
    ) -> DomainResult<()> {
        (**self).set_status(tenant_id, principal, status)
    }

    fn touch_last_authenticated(
        &self,
        tenant_id: TenantId,
        principal: PrincipalId,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        (**self).touch_last_authenticated(tenant_id, principal, at)
    }
}

/// In-memory principal directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPrincipalDirectory {
    users: RwLock<HashMap<(TenantId, PrincipalId), UserRecord>>,
}

impl InMemoryPrincipalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserRecord) {
        let mut users = self
            .users
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        users.insert((user.tenant_id, user.id), user);
    }

    pub fn get(&self, tenant_id: TenantId, principal: PrincipalId) -> Option<UserRecord> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(tenant_id, principal))
            .cloned()
    }
}

impl PrincipalDirectory for InMemoryPrincipalDirectory {
    fn find_by_login(&self, tenant_id: TenantId, login: &str) -> DomainResult<Option<UserRecord>> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        let login_lower = login.to_lowercase();
        Ok(users
            .values()
            .find(|u| {
                u.tenant_id == tenant_id
                    && (u.username == login || u.email.to_lowercase() == login_lower)
            })
            .cloned())
    }

    fn set_status(
        &self,
        tenant_id: TenantId,
        principal: PrincipalId,
        status: UserStatus,
    ) -> DomainResult<()> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(user) = users.get_mut(&(tenant_id, principal)) {
            user.status = status;
        }
        Ok(())
    }

    fn touch_last_authenticated(
        &self,
        tenant_id: TenantId,
        principal: PrincipalId,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(user) = users.get_mut(&(tenant_id, principal)) {
            user.last_authenticated_at = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(tenant_id: TenantId, username: &str, email: &str) -> UserRecord {
        UserRecord {
            id: PrincipalId::new(),
            tenant_id,
            username: username.to_string(),
            email: email.to_string(),
            password: PasswordDigest::new("argon2id", "x"),
            status: UserStatus::Active,
            last_authenticated_at: None,
        }
    }

    #[test]
    fn lookup_matches_username_or_email_within_tenant_only() {
        let dir = InMemoryPrincipalDirectory::new();
        let t1 = TenantId::new();
        let t2 = TenantId::new();
        dir.insert(user(t1, "alice", "alice@example.com"));

        assert!(dir.find_by_login(t1, "alice").unwrap().is_some());
        assert!(dir.find_by_login(t1, "Alice@Example.com").unwrap().is_some());
        assert!(dir.find_by_login(t2, "alice").unwrap().is_none());
    }
}
