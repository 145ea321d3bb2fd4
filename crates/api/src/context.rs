use std::sync::Arc;

use strata_context::TenantContext;
use strata_core::{PrincipalId, TenantId};

/// Tenant binding for one request, established by the gate.
///
/// Carries both the resolved tenant id and the context object downstream
/// services (and the RLS pool) read from.
#[derive(Debug, Clone)]
pub struct RequestTenant {
    tenant_id: TenantId,
    context: Arc<TenantContext>,
}

impl RequestTenant {
    pub fn new(tenant_id: TenantId, context: Arc<TenantContext>) -> Self {
        Self { tenant_id, context }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn context(&self) -> &Arc<TenantContext> {
        &self.context
    }
}

/// Authenticated identity for a request (claims snapshot from the token).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<String>,
    permissions: Vec<String>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<String>, permissions: Vec<String>) -> Self {
        Self {
            principal_id,
            roles,
            permissions,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }
}
