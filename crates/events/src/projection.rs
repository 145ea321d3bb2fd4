use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Projections are the CQRS read side: events are the source of truth, read
/// models are disposable views that can be deleted and rebuilt by replaying
/// the stream from the beginning.
///
/// Implementations must be **idempotent**: events may be delivered more than
/// once (at-least-once bus semantics, replays, crash recovery), and applying
/// the same event twice must produce the same read-model state.
///
/// The envelope carries `tenant_id`; projections must scope every read-model
/// update to it so that no cross-tenant rows are ever written.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
