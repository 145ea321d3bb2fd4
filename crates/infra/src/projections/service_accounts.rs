//! Service account read model.
//!
//! A queryable snapshot of each service account, maintained by applying the
//! aggregate's events in stream order. The event stream is the source of
//! truth; this view can be dropped and rebuilt from it at any time.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use strata_accounts::{ServiceAccountEvent, ServiceAccountId, ServiceAccountStatus};
use strata_auth::PasswordDigest;
use strata_core::RoleId;
use strata_core::TenantId;
use strata_events::{AuditEvent, AuditOutcome, AuditSink, Event, EventEnvelope, Projection};

use crate::read_model::TenantStore;

/// Aggregate type tag used on the service account stream.
pub const SERVICE_ACCOUNT_AGGREGATE: &str = ServiceAccountEvent::AGGREGATE_TYPE;

/// Current-state view of one service account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAccountView {
    pub id: ServiceAccountId,
    pub tenant_id: TenantId,
    pub client_id: String,
    /// Digest only; the plaintext secret never reaches the read model.
    pub secret: PasswordDigest,
    pub description: String,
    pub status: ServiceAccountStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub roles: BTreeSet<RoleId>,
    /// Stream position this view reflects; used for idempotent application.
    pub last_sequence: u64,
}

impl ServiceAccountView {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == ServiceAccountStatus::Active && self.expires_at.is_none_or(|at| at > now)
    }
}

/// Projector maintaining [`ServiceAccountView`] rows in a tenant store.
///
/// Idempotent: an envelope at or below the view's `last_sequence` has already
/// been applied and is skipped, so at-least-once delivery and replays are
/// safe.
pub struct ServiceAccountProjection<S> {
    store: S,
    audit: Arc<dyn AuditSink>,
}

impl<S> ServiceAccountProjection<S>
where
    S: TenantStore<ServiceAccountId, ServiceAccountView>,
{
    pub fn new(store: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub fn view(&self, tenant_id: TenantId, id: ServiceAccountId) -> Option<ServiceAccountView> {
        self.store.get(tenant_id, &id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ServiceAccountView> {
        self.store.list(tenant_id)
    }

    pub fn find_by_client_id(
        &self,
        tenant_id: TenantId,
        client_id: &str,
    ) -> Option<ServiceAccountView> {
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|v| v.client_id == client_id)
    }

    /// Drop all views for a tenant ahead of a replay.
    pub fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
    }

    /// Apply a raw bus/store envelope. Payloads that do not decode as service
    /// account events are logged and skipped; a projection must never halt
    /// the pipeline.
    pub fn apply_json(&self, envelope: &EventEnvelope<JsonValue>) {
        if !envelope.is_for(SERVICE_ACCOUNT_AGGREGATE) {
            return;
        }
        match serde_json::from_value::<ServiceAccountEvent>(envelope.payload.clone()) {
            Ok(event) => self.apply_event(
                envelope.tenant_id,
                ServiceAccountId::from(*envelope.aggregate_id.as_uuid()),
                envelope.sequence,
                &event,
            ),
            Err(e) => {
                warn!(
                    aggregate_id = %envelope.aggregate_id,
                    sequence = envelope.sequence,
                    error = %e,
                    "undecodable service account event skipped"
                );
            }
        }
    }

    fn apply_event(
        &self,
        tenant_id: TenantId,
        id: ServiceAccountId,
        sequence: u64,
        event: &ServiceAccountEvent,
    ) {
        let existing = self.store.get(tenant_id, &id);
        if let Some(view) = &existing {
            if sequence <= view.last_sequence {
                // Already applied (redelivery or replay).
                return;
            }
        }

        let view = match (existing, event) {
            (_, ServiceAccountEvent::Created(e)) => ServiceAccountView {
                id: e.account_id,
                tenant_id: e.tenant_id,
                client_id: e.client_id.clone(),
                secret: e.secret.clone(),
                description: e.description.clone(),
                status: ServiceAccountStatus::Active,
                created_at: e.occurred_at,
                expires_at: e.expires_at,
                roles: BTreeSet::new(),
                last_sequence: sequence,
            },
            (Some(mut view), event) => {
                match event {
                    ServiceAccountEvent::Created(_) => unreachable!(),
                    ServiceAccountEvent::DetailsUpdated(e) => {
                        if let Some(description) = &e.description {
                            view.description = description.clone();
                        }
                        if let Some(status) = e.status {
                            view.status = status;
                        }
                        if let Some(expires_at) = e.expires_at {
                            view.expires_at = expires_at;
                        }
                    }
                    ServiceAccountEvent::SecretRotated(e) => {
                        view.secret = e.secret.clone();
                    }
                    ServiceAccountEvent::RolesAssigned(e) => {
                        view.roles.extend(e.roles.iter().copied());
                    }
                    ServiceAccountEvent::RolesRemoved(e) => {
                        for role in &e.roles {
                            view.roles.remove(role);
                        }
                    }
                    ServiceAccountEvent::Deactivated(_) => {
                        view.status = ServiceAccountStatus::Inactive;
                    }
                    ServiceAccountEvent::Activated(_) => {
                        view.status = ServiceAccountStatus::Active;
                    }
                }
                view.last_sequence = sequence;
                view
            }
            (None, event) => {
                // Stream delivered out of order with its Created event missing.
                warn!(%id, event_type = event.event_type(), "event for unknown service account skipped");
                return;
            }
        };

        self.store.upsert(tenant_id, id, view);
        self.audit.record(AuditEvent::new(
            event.event_type(),
            Some(id.into()),
            Some(tenant_id),
            AuditOutcome::Success,
            "projected",
        ));
    }
}

impl<S> Projection for ServiceAccountProjection<S>
where
    S: TenantStore<ServiceAccountId, ServiceAccountView>,
{
    type Ev = ServiceAccountEvent;

    fn apply(&mut self, envelope: &EventEnvelope<ServiceAccountEvent>) {
        self.apply_event(
            envelope.tenant_id,
            ServiceAccountId::from(*envelope.aggregate_id.as_uuid()),
            envelope.sequence,
            &envelope.payload,
        );
    }
}

#[cfg(test)]
mod tests {
    use strata_accounts::{RolesAssigned, SecretRotated, ServiceAccountCreated};
    use strata_core::AggregateId;
    use strata_events::InMemoryAuditSink;
    use uuid::Uuid;

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    type Store = Arc<InMemoryTenantStore<ServiceAccountId, ServiceAccountView>>;

    fn projection() -> ServiceAccountProjection<Store> {
        ServiceAccountProjection::new(
            Arc::new(InMemoryTenantStore::new()),
            Arc::new(InMemoryAuditSink::new()),
        )
    }

    fn envelope(
        tenant_id: TenantId,
        id: ServiceAccountId,
        sequence: u64,
        event: ServiceAccountEvent,
    ) -> EventEnvelope<ServiceAccountEvent> {
        EventEnvelope {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id: AggregateId::from(*id.as_uuid()),
            aggregate_type: SERVICE_ACCOUNT_AGGREGATE.to_string(),
            sequence,
            event_type: event.event_type().to_string(),
            occurred_at: event.occurred_at(),
            payload: event,
        }
    }

    fn created(tenant_id: TenantId, id: ServiceAccountId) -> ServiceAccountEvent {
        ServiceAccountEvent::Created(ServiceAccountCreated {
            tenant_id,
            account_id: id,
            client_id: "svc-jobs".to_string(),
            secret: PasswordDigest::new("argon2id", "v1"),
            description: String::new(),
            expires_at: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn created_event_materializes_a_view() {
        let mut p = projection();
        let tenant_id = TenantId::new();
        let id = ServiceAccountId::new();

        p.apply(&envelope(tenant_id, id, 1, created(tenant_id, id)));

        let view = p.view(tenant_id, id).unwrap();
        assert_eq!(view.client_id, "svc-jobs");
        assert_eq!(view.status, ServiceAccountStatus::Active);
        assert_eq!(view.last_sequence, 1);
        assert!(p.find_by_client_id(tenant_id, "svc-jobs").is_some());
    }

    #[test]
    fn redelivered_events_are_applied_once() {
        let mut p = projection();
        let tenant_id = TenantId::new();
        let id = ServiceAccountId::new();
        let role = RoleId::new();

        p.apply(&envelope(tenant_id, id, 1, created(tenant_id, id)));
        let assigned = ServiceAccountEvent::RolesAssigned(RolesAssigned {
            tenant_id,
            account_id: id,
            roles: vec![role],
            occurred_at: Utc::now(),
        });
        p.apply(&envelope(tenant_id, id, 2, assigned.clone()));
        // Redelivery of sequence 2 and a stale sequence 1 change nothing.
        p.apply(&envelope(tenant_id, id, 2, assigned));
        p.apply(&envelope(tenant_id, id, 1, created(tenant_id, id)));

        let view = p.view(tenant_id, id).unwrap();
        assert_eq!(view.roles.len(), 1);
        assert_eq!(view.last_sequence, 2);
    }

    #[test]
    fn rotation_replaces_the_stored_digest() {
        let mut p = projection();
        let tenant_id = TenantId::new();
        let id = ServiceAccountId::new();

        p.apply(&envelope(tenant_id, id, 1, created(tenant_id, id)));
        p.apply(&envelope(
            tenant_id,
            id,
            2,
            ServiceAccountEvent::SecretRotated(SecretRotated {
                tenant_id,
                account_id: id,
                secret: PasswordDigest::new("argon2id", "v2"),
                occurred_at: Utc::now(),
            }),
        ));

        let view = p.view(tenant_id, id).unwrap();
        assert_eq!(view.secret, PasswordDigest::new("argon2id", "v2"));
    }

    #[test]
    fn views_are_tenant_scoped() {
        let mut p = projection();
        let t1 = TenantId::new();
        let t2 = TenantId::new();
        let id = ServiceAccountId::new();

        p.apply(&envelope(t1, id, 1, created(t1, id)));
        assert!(p.view(t2, id).is_none());
        assert!(p.list(t2).is_empty());
    }
}
