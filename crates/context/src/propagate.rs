//! Explicit propagation primitives: capture-at-handoff, bind-on-resume.

use strata_core::TenantId;

use crate::context::TenantContext;

/// A tenant value captured at a handoff or suspension point.
///
/// `TenantCapture` is the only sanctioned way to move a tenant binding across
/// a concurrency boundary. It copies the submitting unit's current value; the
/// two run methods differ only in what happens to the receiving context after
/// the body exits:
///
/// - [`run_task`](Self::run_task) clears it (worker-pool handoff: the worker
///   must be pristine between tasks).
/// - [`resume`](Self::resume) restores whatever was bound before (suspendable
///   continuation: nested scopes save/restore, they never overwrite).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantCapture(Option<TenantId>);

impl TenantCapture {
    /// Capture the submitting unit's current binding.
    pub fn capture(ctx: &TenantContext) -> Self {
        Self(ctx.current())
    }

    /// A capture of an explicitly absent binding.
    pub fn absent() -> Self {
        Self(None)
    }

    pub fn value(&self) -> Option<TenantId> {
        self.0
    }

    /// Task-handoff propagation: bind the captured value on `worker`, run the
    /// body, then clear the worker — on success, error, or panic.
    pub fn run_task<R>(self, worker: &TenantContext, body: impl FnOnce() -> R) -> R {
        let _clear = worker.clear_on_drop();
        self.apply_to(worker);
        body()
    }

    /// Continuation propagation: save the worker's current value, bind the
    /// captured one, run the body, then restore the saved value — including
    /// a saved absent binding.
    pub fn resume<R>(self, worker: &TenantContext, body: impl FnOnce() -> R) -> R {
        let _restore = worker.save_for_restore();
        self.apply_to(worker);
        body()
    }

    fn apply_to(self, worker: &TenantContext) {
        match self.0 {
            Some(tenant_id) => worker.bind(tenant_id),
            None => worker.clear(),
        }
    }
}
