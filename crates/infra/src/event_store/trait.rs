use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use strata_core::{AggregateId, ExpectedVersion, TenantId};

/// An event ready to be appended, not yet assigned a sequence number.
///
/// Built from a typed domain event via [`UncommittedEvent::from_typed`], which
/// serializes the payload and takes the stream tag, event name, and schema
/// version from the event type itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl UncommittedEvent {
    pub fn from_typed<E>(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: strata_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: E::AGGREGATE_TYPE.to_string(),
            event_type: event.event_type().to_string(),
            event_version: event.schema_version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

/// A persisted event with its stream position.
///
/// Sequence numbers are assigned by the store at append time, per stream
/// (tenant + aggregate), monotonically from 1, and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert into a tenant-scoped envelope for publication on the bus.
    pub fn to_envelope(&self) -> strata_events::EventEnvelope<JsonValue> {
        strata_events::EventEnvelope {
            event_id: self.event_id,
            tenant_id: self.tenant_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type.clone(),
            sequence: self.sequence_number,
            event_type: self.event_type.clone(),
            occurred_at: self.occurred_at,
            payload: self.payload.clone(),
        }
    }
}

/// Event store failure. Infrastructure errors only; domain validation happens
/// before events reach the store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// Append-only, tenant-scoped event store.
///
/// Streams are keyed by (tenant, aggregate). Implementations must enforce
/// tenant isolation on read and write, check optimistic concurrency against
/// the current stream version, assign gapless sequence numbers, and persist
/// each batch atomically.
pub trait EventStore: Send + Sync {
    /// Append a batch of events to one aggregate stream.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for a tenant + aggregate, in sequence order.
    /// Returns an empty vector for a stream that does not exist yet.
    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load every event of one aggregate type within a tenant, grouped by
    /// stream and in sequence order within each stream. Used for projection
    /// rebuilds.
    fn load_tenant(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(tenant_id, aggregate_id)
    }

    fn load_tenant(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_tenant(tenant_id, aggregate_type)
    }
}
