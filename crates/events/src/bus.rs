//! Transport between the event store and its consumers.
//!
//! Everything published here is tenant-scoped, and the bus knows it: a
//! consumer can take the full firehose or a single tenant's slice. Events
//! are persisted before they are published and delivery is at-least-once,
//! so consumers dedup via their sequence cursor. The bus never stores
//! anything; the event store is the source of truth.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use strata_core::TenantId;

use crate::tenant::TenantScoped;

/// Receiving end of one subscription.
///
/// Single-consumer: each subscription owns its channel and sees its own copy
/// of every matching message published after it was created.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message arrives.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Take the next message if one is already queued.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Publisher/subscriber seam between the store and its consumers.
pub trait EventBus<M: TenantScoped>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    /// Subscribe to every message, all tenants.
    fn subscribe(&self) -> Subscription<M>;

    /// Subscribe to one tenant's messages only.
    ///
    /// Filtering happens on the publish side: a scoped consumer never holds
    /// another tenant's data, not even transiently in its channel.
    fn subscribe_scoped(&self, tenant_id: TenantId) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    M: TenantScoped,
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }

    fn subscribe_scoped(&self, tenant_id: TenantId) -> Subscription<M> {
        (**self).subscribe_scoped(tenant_id)
    }
}

pub mod in_memory {
    use std::convert::Infallible;
    use std::sync::{Mutex, PoisonError, mpsc};

    use strata_core::TenantId;

    use super::{EventBus, Subscription};
    use crate::tenant::TenantScoped;

    #[derive(Debug)]
    struct Registration<M> {
        sender: mpsc::Sender<M>,
        /// `None` takes the firehose.
        scope: Option<TenantId>,
    }

    /// Process-local bus backing tests and single-node deployments.
    ///
    /// Fan-out runs synchronously on the publisher's thread. A poisoned
    /// registry is recovered, not reported: one panicked subscriber must
    /// not stop publication for the rest, so publishing cannot fail.
    #[derive(Debug, Default)]
    pub struct InMemoryEventBus<M> {
        registry: Mutex<Vec<Registration<M>>>,
    }

    impl<M> InMemoryEventBus<M> {
        pub fn new() -> Self {
            Self {
                registry: Mutex::new(Vec::new()),
            }
        }

        fn register(&self, scope: Option<TenantId>) -> Subscription<M> {
            let (tx, rx) = mpsc::channel();
            self.registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Registration { sender: tx, scope });
            Subscription::new(rx)
        }
    }

    impl<M> EventBus<M> for InMemoryEventBus<M>
    where
        M: TenantScoped + Clone + Send + 'static,
    {
        type Error = Infallible;

        fn publish(&self, message: M) -> Result<(), Infallible> {
            let tenant_id = message.tenant_id();
            let mut registry = self
                .registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            // Out-of-scope registrations are skipped; disconnected ones are
            // dropped as a side effect of delivery.
            registry.retain(|r| match r.scope {
                Some(scope) if scope != tenant_id => true,
                _ => r.sender.send(message.clone()).is_ok(),
            });

            Ok(())
        }

        fn subscribe(&self) -> Subscription<M> {
            self.register(None)
        }

        fn subscribe_scoped(&self, tenant_id: TenantId) -> Subscription<M> {
            self.register(Some(tenant_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::in_memory::InMemoryEventBus;
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Ping {
        tenant_id: TenantId,
        n: u32,
    }

    impl TenantScoped for Ping {
        fn tenant_id(&self) -> TenantId {
            self.tenant_id
        }
    }

    fn ping(tenant_id: TenantId, n: u32) -> Ping {
        Ping { tenant_id, n }
    }

    #[test]
    fn firehose_subscribers_each_receive_every_message() {
        let bus: InMemoryEventBus<Ping> = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        let tenant = TenantId::new();

        bus.publish(ping(tenant, 7)).unwrap();

        assert_eq!(a.try_recv().unwrap().n, 7);
        assert_eq!(b.try_recv().unwrap().n, 7);
    }

    #[test]
    fn scoped_subscription_only_sees_its_tenant() {
        let bus: InMemoryEventBus<Ping> = InMemoryEventBus::new();
        let mine = TenantId::new();
        let other = TenantId::new();
        let scoped = bus.subscribe_scoped(mine);
        let firehose = bus.subscribe();

        bus.publish(ping(other, 1)).unwrap();
        bus.publish(ping(mine, 2)).unwrap();

        // The scoped channel never carried the other tenant's message.
        assert_eq!(scoped.try_recv().unwrap().n, 2);
        assert!(scoped.try_recv().is_err());
        assert_eq!(firehose.try_recv().unwrap().n, 1);
        assert_eq!(firehose.try_recv().unwrap().n, 2);
    }

    #[test]
    fn disconnected_subscribers_are_dropped_on_delivery() {
        let bus: InMemoryEventBus<Ping> = InMemoryEventBus::new();
        let tenant = TenantId::new();
        drop(bus.subscribe());
        let live = bus.subscribe();

        bus.publish(ping(tenant, 1)).unwrap();
        assert_eq!(live.try_recv().unwrap().n, 1);
    }

    #[test]
    fn dormant_scoped_subscription_survives_foreign_publishes() {
        let bus: InMemoryEventBus<Ping> = InMemoryEventBus::new();
        let mine = TenantId::new();
        let scoped = bus.subscribe_scoped(mine);

        // Traffic for other tenants must not evict the quiet registration.
        for n in 0..3 {
            bus.publish(ping(TenantId::new(), n)).unwrap();
        }
        bus.publish(ping(mine, 9)).unwrap();

        assert_eq!(scoped.try_recv().unwrap().n, 9);
    }
}
