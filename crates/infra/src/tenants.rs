//! Tenant lookup collaborator consumed by the request gate.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use strata_core::{DomainResult, TenantId};

/// Tenant lifecycle status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    #[default]
    Active,
    /// Requests for a suspended tenant are refused at the gate.
    Suspended,
}

/// What the gate needs to know about a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: TenantId,
    pub status: TenantStatus,
}

impl TenantRecord {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// Tenant resolution seam.
pub trait TenantDirectory: Send + Sync {
    /// Look a tenant up by id. `Ok(None)` means unknown; `Err` means the
    /// lookup itself failed and callers must fail closed.
    fn tenant(&self, id: TenantId) -> DomainResult<Option<TenantRecord>>;
}

impl<D> TenantDirectory for Arc<D>
where
    D: TenantDirectory + ?Sized,
{
    fn tenant(&self, id: TenantId) -> DomainResult<Option<TenantRecord>> {
        (**self).tenant(id)
    }
}

/// In-memory tenant directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTenantDirectory {
    tenants: RwLock<HashMap<TenantId, TenantRecord>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: TenantRecord) {
        let mut tenants = self.tenants.write().unwrap_or_else(PoisonError::into_inner);
        tenants.insert(record.id, record);
    }

    pub fn insert_active(&self, id: TenantId) {
        self.insert(TenantRecord {
            id,
            status: TenantStatus::Active,
        });
    }

    pub fn set_status(&self, id: TenantId, status: TenantStatus) {
        let mut tenants = self.tenants.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(record) = tenants.get_mut(&id) {
            record.status = status;
        }
    }
}

impl TenantDirectory for InMemoryTenantDirectory {
    fn tenant(&self, id: TenantId) -> DomainResult<Option<TenantRecord>> {
        let tenants = self.tenants.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tenants.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tenant_resolves_to_none() {
        let directory = InMemoryTenantDirectory::new();
        assert_eq!(directory.tenant(TenantId::new()).unwrap(), None);
    }

    #[test]
    fn status_transitions_are_visible() {
        let directory = InMemoryTenantDirectory::new();
        let id = TenantId::new();
        directory.insert_active(id);
        assert!(directory.tenant(id).unwrap().unwrap().is_active());

        directory.set_status(id, TenantStatus::Suspended);
        assert!(!directory.tenant(id).unwrap().unwrap().is_active());
    }
}
