//! Append-only audit trail.
//!
//! Security-relevant operations (authentication attempts, lockout
//! transitions, credential lifecycle, role changes) record an `AuditEvent`
//! through an `AuditSink`. The detailed internal reason lives here; callers
//! only ever see the collapsed generic outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use strata_core::{PrincipalId, TenantId};

/// Outcome of an audited operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Stable event name (e.g. "auth.login", "lockout.locked").
    pub event_type: String,
    /// Acting or targeted principal, when known.
    pub principal: Option<PrincipalId>,
    /// Tenant scope, when known.
    pub tenant: Option<TenantId>,
    pub occurred_at: DateTime<Utc>,
    pub outcome: AuditOutcome,
    /// Internal detail. Never echoed to callers.
    pub detail: String,
}

impl AuditEvent {
    pub fn new(
        event_type: impl Into<String>,
        principal: Option<PrincipalId>,
        tenant: Option<TenantId>,
        outcome: AuditOutcome,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            principal,
            tenant,
            occurred_at: Utc::now(),
            outcome,
            detail: detail.into(),
        }
    }
}

/// Append-only audit sink.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn record(&self, event: AuditEvent) {
        (**self).record(event)
    }
}

/// In-memory audit sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEvent> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }

    /// Entries of a given type, in append order.
    pub fn entries_of(&self, event_type: &str) -> Vec<AuditEvent> {
        self.entries()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut entries) = self.entries.write() {
            entries.push(event);
        }
    }
}

/// Audit sink that emits structured tracing events.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match event.outcome {
            AuditOutcome::Success => tracing::info!(
                event_type = %event.event_type,
                principal = ?event.principal,
                tenant = ?event.tenant,
                detail = %event.detail,
                "audit"
            ),
            AuditOutcome::Failure | AuditOutcome::Denied => tracing::warn!(
                event_type = %event.event_type,
                principal = ?event.principal,
                tenant = ?event.tenant,
                outcome = ?event.outcome,
                detail = %event.detail,
                "audit"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_preserves_append_order() {
        let sink = InMemoryAuditSink::new();
        sink.record(AuditEvent::new("a", None, None, AuditOutcome::Success, "1"));
        sink.record(AuditEvent::new("b", None, None, AuditOutcome::Failure, "2"));

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, "a");
        assert_eq!(entries[1].event_type, "b");
    }

    #[test]
    fn entries_of_filters_by_type() {
        let sink = InMemoryAuditSink::new();
        sink.record(AuditEvent::new("x", None, None, AuditOutcome::Success, ""));
        sink.record(AuditEvent::new("y", None, None, AuditOutcome::Denied, ""));
        sink.record(AuditEvent::new("x", None, None, AuditOutcome::Failure, ""));

        assert_eq!(sink.entries_of("x").len(), 2);
        assert_eq!(sink.entries_of("z").len(), 0);
    }
}
