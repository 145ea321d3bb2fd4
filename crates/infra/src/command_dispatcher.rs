//! Command execution pipeline for event-sourced aggregates.
//!
//! One pipeline for every command: load the stream, rehydrate the aggregate,
//! let the pure `handle` decide events, append with an optimistic concurrency
//! check, then publish. Events are persisted before publication, so a publish
//! failure leaves the store correct and delivery is at-least-once (consumers
//! are idempotent).

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use strata_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use strata_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale aggregate version).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Cross-tenant or cross-aggregate stream mixing.
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("access denied")]
    Denied,

    #[error("not found")]
    NotFound,

    /// Historical payloads could not be deserialized into the aggregate's
    /// event type.
    #[error("event deserialization failed: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),

    /// Publication failed after a successful append. The events are durable;
    /// redelivery may duplicate them.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Denied => DispatchError::Denied,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine.
///
/// Generic over the store and bus so tests run fully in memory and production
/// backends slot in without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run one command end to end and return the committed events.
    ///
    /// The `make_aggregate` closure produces the empty aggregate to rehydrate
    /// into, keeping the dispatcher ignorant of aggregate construction; the
    /// stream tag comes from the aggregate's event type. An accepted no-op
    /// command (empty decision) appends and publishes nothing.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: strata_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(tenant_id, aggregate_id, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

/// Defense in depth: reject streams a buggy backend hands back with the wrong
/// tenant, the wrong aggregate, or a non-monotonic order.
fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
