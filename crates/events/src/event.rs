use chrono::{DateTime, Utc};

/// A fact recorded on an identity event stream.
///
/// Implemented by each aggregate's event enum. The metadata exposed here is
/// persisted beside the serialized payload and keyed on by the audit trail
/// and the read-model projectors, so it must stay stable across releases
/// even as payload schemas evolve.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stream type tag of the aggregate these events belong to
    /// (e.g. "iam.service_account"). A stream never mixes tags, and the
    /// store enforces it at append time.
    const AGGREGATE_TYPE: &'static str;

    /// Stable per-variant name (e.g. "iam.service_account.created"). Doubles
    /// as the audit event type when a projector records an application.
    fn event_type(&self) -> &'static str;

    /// Payload schema version, bumped on breaking payload changes.
    fn schema_version(&self) -> u32;

    /// Business time: when the decision was made, not when it was stored.
    fn occurred_at(&self) -> DateTime<Utc>;
}
