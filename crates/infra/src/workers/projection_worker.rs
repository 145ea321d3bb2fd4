//! Bus-driven projection loop.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use strata_core::TenantId;
use strata_events::{EventBus, Subscription, TenantScoped};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Generic worker that drains a bus subscription through an idempotent
/// handler. Delivery is at-least-once; the handler must tolerate duplicates
/// (the read-model projectors do, via their sequence cursor).
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// Spawn a worker thread consuming events from the bus.
    ///
    /// With `tenant_id` set, the subscription is scoped at the bus and the
    /// handler never sees another tenant's events.
    pub fn spawn<M, B, H, E>(
        name: &'static str,
        bus: B,
        tenant_id: Option<TenantId>,
        mut handler: H,
    ) -> std::io::Result<WorkerHandle>
    where
        M: TenantScoped + Send + 'static,
        B: EventBus<M> + Send + Sync + 'static,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let subscription: Subscription<M> = match tenant_id {
            Some(t) => bus.subscribe_scoped(t),
            None => bus.subscribe(),
        };

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, subscription, shutdown_rx, &mut handler))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(
    name: &'static str,
    subscription: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    handler: &mut H,
) where
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match subscription.recv_timeout(tick) {
            Ok(message) => {
                if let Err(err) = handler(message) {
                    warn!(worker = name, error = ?err, "projection handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;
    use strata_core::AggregateId;
    use strata_events::{EventEnvelope, InMemoryEventBus};
    use uuid::Uuid;

    use super::*;

    fn envelope(tenant_id: TenantId) -> EventEnvelope<serde_json::Value> {
        EventEnvelope {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id: AggregateId::new(),
            aggregate_type: "iam.service_account".to_string(),
            sequence: 1,
            event_type: "iam.service_account.created".to_string(),
            occurred_at: chrono::Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn worker_filters_by_tenant_and_shuts_down() {
        let bus = Arc::new(InMemoryEventBus::new());
        let seen = Arc::new(AtomicU32::new(0));
        let tenant = TenantId::new();

        let handle = {
            let seen = Arc::clone(&seen);
            ProjectionWorker::spawn(
                "test-projection",
                Arc::clone(&bus),
                Some(tenant),
                move |_m: EventEnvelope<serde_json::Value>| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), ()>(())
                },
            )
            .unwrap()
        };

        bus.publish(envelope(tenant)).unwrap();
        bus.publish(envelope(TenantId::new())).unwrap();

        // Give the worker a moment to drain, then stop it.
        std::thread::sleep(Duration::from_millis(100));
        handle.shutdown();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
