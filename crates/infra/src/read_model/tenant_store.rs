use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use strata_core::TenantId;

/// Tenant-isolated key/value store for disposable read models.
///
/// Every operation is scoped by tenant; there is no way to read another
/// tenant's rows through this interface. Read models are views over the event
/// stream: `clear_tenant` plus a replay rebuilds them from scratch.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    /// Drop all records for a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

/// In-memory tenant-isolated store for tests/dev.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&(tenant_id, key.clone())).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert((tenant_id, key), value);
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.iter()
            .filter_map(|((t, _k), v)| (*t == tenant_id).then(|| v.clone()))
            .collect()
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.retain(|(t, _k), _v| *t != tenant_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_invisible_across_tenants() {
        let store: InMemoryTenantStore<&str, u32> = InMemoryTenantStore::new();
        let t1 = TenantId::new();
        let t2 = TenantId::new();

        store.upsert(t1, "a", 1);
        assert_eq!(store.get(t1, &"a"), Some(1));
        assert_eq!(store.get(t2, &"a"), None);
        assert!(store.list(t2).is_empty());
    }

    #[test]
    fn clear_tenant_leaves_other_tenants_untouched() {
        let store: InMemoryTenantStore<&str, u32> = InMemoryTenantStore::new();
        let t1 = TenantId::new();
        let t2 = TenantId::new();

        store.upsert(t1, "a", 1);
        store.upsert(t2, "a", 2);
        store.clear_tenant(t1);

        assert_eq!(store.get(t1, &"a"), None);
        assert_eq!(store.get(t2, &"a"), Some(2));
    }
}
