//! `strata-access` — roles, permissions, and effective-permission computation.
//!
//! Roles are either **global** (`tenant_id = None`, visible to all tenants)
//! or **tenant-scoped**; permissions are system-defined and immutable. Both
//! users and service accounts are assigned roles through the same model.

pub mod role;
pub mod service;
pub mod store;

pub use role::{Permission, PermissionId, Role};
pub use service::{Authority, RoleAccessService};
pub use store::{AccessStore, InMemoryAccessStore};
