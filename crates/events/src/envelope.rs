//! Stream envelope carried from the event store to its consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use strata_core::{AggregateId, TenantId};

/// One committed event together with the stream metadata consumers need.
///
/// This is the only shape that travels on the bus: the store produces it at
/// publication time, projectors and workers consume it. `tenant_id` scopes
/// every downstream write, `event_type` lets a consumer route without
/// decoding the payload, and `(aggregate_id, sequence)` is the dedup cursor
/// idempotent consumers check before applying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    /// Stream type tag; consumers skip envelopes for foreign aggregates.
    pub aggregate_type: String,
    /// Position in the aggregate stream, gapless from 1.
    pub sequence: u64,
    /// Per-variant event name, as recorded at append time.
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: E,
}

impl<E> EventEnvelope<E> {
    /// Whether this envelope belongs to the given aggregate stream type.
    pub fn is_for(&self, aggregate_type: &str) -> bool {
        self.aggregate_type == aggregate_type
    }
}
