//! `strata-context` — tenant binding for one logical unit of execution.
//!
//! A `TenantContext` holds the "current tenant" for exactly one logical unit
//! (one request, one pool task, one continuation step). It is an explicit
//! binding object, never a process-global: child units do not inherit it, and
//! crossing a concurrency boundary requires one of the two propagation
//! primitives in [`propagate`]:
//!
//! - **Task handoff** (`TenantCapture::run_task`): capture at submission,
//!   bind on the worker before the body runs, clear unconditionally after.
//! - **Continuation** (`TenantCapture::resume`): bind on resumption, restore
//!   the worker's previous value when the nested scope exits (stack-like
//!   save/restore, never overwrite).
//!
//! Both are idempotent, and neither can leak a value past its scope: the
//! cleanup runs on the drop path, so it survives panics.

pub mod context;
pub mod pool;
pub mod propagate;

pub use context::{ClearGuard, RestoreGuard, TenantContext};
pub use pool::ContextPool;
pub use propagate::TenantCapture;
