//! `strata-events` — event abstractions for the identity core.
//!
//! Event-sourced aggregates emit events that are persisted (event store),
//! distributed (event bus), and consumed (projections, audit).

pub mod audit;
pub mod bus;
pub mod envelope;
pub mod event;
pub mod projection;
pub mod tenant;

pub use audit::{AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use bus::{EventBus, Subscription};
pub use bus::in_memory::InMemoryEventBus;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use projection::Projection;
pub use tenant::TenantScoped;
