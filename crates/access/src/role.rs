//! Role and permission records.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use strata_core::{DomainError, RoleId, TenantId};

/// Identifier of a system-defined permission.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(Uuid);

impl PermissionId {
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

impl Default for PermissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PermissionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for PermissionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| DomainError::invalid_id(format!("PermissionId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// A role, global or tenant-scoped.
///
/// Invariant: a tenant-scoped role's name is unique within its tenant; a
/// global role's name is unique among global roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    /// `None` denotes a global role visible to all tenants.
    pub tenant_id: Option<TenantId>,
}

impl Role {
    pub fn is_global(&self) -> bool {
        self.tenant_id.is_none()
    }
}

/// A system-defined permission. Not created or deleted by tenant operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: String,
}

impl Permission {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: PermissionId::new(),
            name: name.into(),
            description: description.into(),
        }
    }
}
