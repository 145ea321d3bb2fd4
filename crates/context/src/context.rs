//! The per-unit tenant binding cell and its cleanup guards.

use std::sync::{Mutex, PoisonError};

use strata_core::TenantId;

/// Tenant binding for one logical unit of execution.
///
/// Readable, settable, clearable. Shared *within* a logical unit (an `Arc`
/// handed to collaborators of the same request is fine); never shared between
/// two concurrently executing logical units.
#[derive(Debug, Default)]
pub struct TenantContext {
    slot: Mutex<Option<TenantId>>,
}

impl TenantContext {
    /// A fresh, unbound context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the current tenant. Re-binding the same value is a no-op.
    pub fn bind(&self, tenant_id: TenantId) {
        *self.lock() = Some(tenant_id);
    }

    /// The currently bound tenant, if any.
    pub fn current(&self) -> Option<TenantId> {
        *self.lock()
    }

    /// Remove any binding. Clearing an unbound context is a no-op.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    pub fn is_bound(&self) -> bool {
        self.current().is_some()
    }

    /// Clear-on-drop guard for the task-handoff path.
    pub fn clear_on_drop(&self) -> ClearGuard<'_> {
        ClearGuard { ctx: self }
    }

    /// Save the current value and restore it on drop (continuation path).
    pub fn save_for_restore(&self) -> RestoreGuard<'_> {
        RestoreGuard {
            ctx: self,
            saved: self.current(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<TenantId>> {
        // The lock is only ever held to copy a 16-byte value, so poisoning
        // cannot corrupt it; recover instead of leaking a stale binding.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the context when dropped, on every exit path including unwinding.
#[derive(Debug)]
pub struct ClearGuard<'a> {
    ctx: &'a TenantContext,
}

impl Drop for ClearGuard<'_> {
    fn drop(&mut self) {
        self.ctx.clear();
    }
}

/// Restores the value captured at construction when dropped.
///
/// This is stack-like save/restore: nested guards unwind in reverse order,
/// and an absent binding is restored as absent.
#[derive(Debug)]
pub struct RestoreGuard<'a> {
    ctx: &'a TenantContext,
    saved: Option<TenantId>,
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        match self.saved {
            Some(tenant_id) => self.ctx.bind(tenant_id),
            None => self.ctx.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_current_clear_round_trip() {
        let ctx = TenantContext::new();
        assert_eq!(ctx.current(), None);

        let t = TenantId::new();
        ctx.bind(t);
        assert_eq!(ctx.current(), Some(t));

        ctx.clear();
        assert_eq!(ctx.current(), None);
    }

    #[test]
    fn bind_and_clear_are_idempotent() {
        let ctx = TenantContext::new();
        let t = TenantId::new();

        ctx.bind(t);
        ctx.bind(t);
        assert_eq!(ctx.current(), Some(t));

        ctx.clear();
        ctx.clear();
        assert_eq!(ctx.current(), None);
    }

    #[test]
    fn clear_guard_clears_on_panic() {
        let ctx = TenantContext::new();
        let t = TenantId::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ctx.clear_on_drop();
            ctx.bind(t);
            panic!("boom");
        }));

        assert!(result.is_err());
        assert_eq!(ctx.current(), None);
    }

    #[test]
    fn restore_guard_restores_absent_binding() {
        let ctx = TenantContext::new();
        let t = TenantId::new();

        {
            let _guard = ctx.save_for_restore();
            ctx.bind(t);
            assert_eq!(ctx.current(), Some(t));
        }

        assert_eq!(ctx.current(), None);
    }
}
