use strata_core::TenantId;

use crate::EventEnvelope;

/// Marker trait for tenant-scoped messages.
///
/// Types carrying a tenant ID can be filtered or validated by tenant-aware
/// infrastructure (projection loops, workers) as a second line of defense.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

impl<E> TenantScoped for EventEnvelope<E> {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
