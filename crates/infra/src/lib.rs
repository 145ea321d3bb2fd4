//! `strata-infra` — infrastructure for the identity core.
//!
//! Event store and command dispatch for the event-sourced service account
//! aggregate, tenant-scoped read models, the row-level-security connection
//! guard, and the tenant directory consumed by the request gate.

pub mod accounts_service;
pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod rls;
pub mod tenants;
pub mod workers;


pub use accounts_service::{CreatedCredentials, ServiceAccountService, ServiceError};
pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use projections::service_accounts::{ServiceAccountProjection, ServiceAccountView};
pub use read_model::tenant_store::{InMemoryTenantStore, TenantStore};
pub use rls::{RlsPool, NO_TENANT_SENTINEL, TENANT_SESSION_VAR};
pub use tenants::{InMemoryTenantDirectory, TenantDirectory, TenantRecord, TenantStatus};
pub use workers::projection_worker::{ProjectionWorker, WorkerHandle};
