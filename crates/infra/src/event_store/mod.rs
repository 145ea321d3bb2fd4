//! Append-only, tenant-scoped event persistence.

mod in_memory;
mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
