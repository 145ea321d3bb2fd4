//! Bounded worker pool with tenant-aware task handoff.
//!
//! Every job submitted through [`ContextPool::submit`] is decorated with the
//! submitting unit's captured tenant value: the worker binds it before the job
//! body runs and clears it afterwards, so a worker thread is never observed
//! carrying a tenant between two jobs, whatever the interleaving.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, warn};

use crate::context::TenantContext;
use crate::propagate::TenantCapture;

type PoolJob = Box<dyn FnOnce(&TenantContext) + Send + 'static>;

/// Fixed-size worker pool. Each worker thread owns its own `TenantContext`.
#[derive(Debug)]
pub struct ContextPool {
    sender: Option<mpsc::Sender<PoolJob>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl ContextPool {
    /// Spawn a pool with `size` workers (minimum 1).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<PoolJob>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|idx| {
                let receiver = Arc::clone(&receiver);
                thread::spawn(move || {
                    let ctx = TenantContext::new();
                    debug!(worker = idx, "context pool worker started");
                    loop {
                        let job = {
                            let guard = match receiver.lock() {
                                Ok(g) => g,
                                Err(poisoned) => poisoned.into_inner(),
                            };
                            guard.recv()
                        };
                        let Ok(job) = job else {
                            break;
                        };
                        let outcome = std::panic::catch_unwind(
                            std::panic::AssertUnwindSafe(|| job(&ctx)),
                        );
                        if outcome.is_err() {
                            // The handoff decorator already cleared the
                            // context on the unwind path.
                            warn!(worker = idx, "pool job panicked");
                        }
                    }
                    debug!(worker = idx, "context pool worker stopped");
                })
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Submit a unit of work, propagating the submitter's current tenant.
    ///
    /// The capture happens here, at submission time; a binding the submitter
    /// makes *after* submitting is not visible to the job.
    pub fn submit<F>(&self, submitter: &TenantContext, job: F)
    where
        F: FnOnce(&TenantContext) + Send + 'static,
    {
        let captured = TenantCapture::capture(submitter);
        self.submit_captured(captured, job);
    }

    /// Submit with an explicit capture (e.g. an intentionally absent one).
    pub fn submit_captured<F>(&self, captured: TenantCapture, job: F)
    where
        F: FnOnce(&TenantContext) + Send + 'static,
    {
        let wrapped: PoolJob = Box::new(move |worker| {
            captured.run_task(worker, || job(worker));
        });
        if let Some(sender) = &self.sender {
            // A send error means the pool is shut down; the job is dropped.
            let _ = sender.send(wrapped);
        }
    }

    /// Stop accepting work and wait for in-flight jobs to finish.
    pub fn shutdown(mut self) {
        self.drain();
    }

    fn drain(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for ContextPool {
    fn drop(&mut self) {
        self.drain();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use proptest::prelude::*;
    use strata_core::TenantId;

    use super::*;

    fn recv_all<T>(rx: &mpsc::Receiver<T>, n: usize) -> Vec<T> {
        (0..n)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).expect("job result"))
            .collect()
    }

    #[test]
    fn worker_sees_submitters_value_and_nothing_after() {
        let pool = ContextPool::new(1);
        let submitter = TenantContext::new();
        let tenant = TenantId::new();
        submitter.bind(tenant);

        let (tx, rx) = mpsc::channel();

        let tx1 = tx.clone();
        pool.submit(&submitter, move |worker| {
            tx1.send(worker.current()).unwrap();
        });

        // Probe from an unbound submitter: the worker must be pristine.
        let unbound = TenantContext::new();
        pool.submit(&unbound, move |worker| {
            tx.send(worker.current()).unwrap();
        });

        let results = recv_all(&rx, 2);
        assert_eq!(results[0], Some(tenant));
        assert_eq!(results[1], None);
        pool.shutdown();
    }

    #[test]
    fn interleaved_tenants_never_cross_contaminate() {
        for pool_size in [1, 2, 4] {
            let pool = ContextPool::new(pool_size);
            let tenant_a = TenantId::new();
            let tenant_b = TenantId::new();
            let ctx_a = TenantContext::new();
            let ctx_b = TenantContext::new();
            ctx_a.bind(tenant_a);
            ctx_b.bind(tenant_b);

            let (tx, rx) = mpsc::channel();
            let total = 40;
            for i in 0..total {
                let tx = tx.clone();
                let (submitter, expected) = if i % 2 == 0 {
                    (&ctx_a, tenant_a)
                } else {
                    (&ctx_b, tenant_b)
                };
                pool.submit(submitter, move |worker| {
                    tx.send((expected, worker.current())).unwrap();
                });
            }

            for (expected, observed) in recv_all(&rx, total) {
                assert_eq!(observed, Some(expected), "pool_size={pool_size}");
            }
            pool.shutdown();
        }
    }

    #[test]
    fn panicking_job_does_not_leak_into_the_next() {
        let pool = ContextPool::new(1);
        let submitter = TenantContext::new();
        submitter.bind(TenantId::new());

        pool.submit(&submitter, |_worker| panic!("job failed"));

        let (tx, rx) = mpsc::channel();
        let unbound = TenantContext::new();
        pool.submit(&unbound, move |worker| {
            tx.send(worker.current()).unwrap();
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), None);
        pool.shutdown();
    }

    #[test]
    fn capture_is_taken_at_submission_time() {
        let pool = ContextPool::new(1);
        let submitter = TenantContext::new();
        let first = TenantId::new();
        submitter.bind(first);

        let (tx, rx) = mpsc::channel();
        pool.submit(&submitter, move |worker| {
            tx.send(worker.current()).unwrap();
        });

        // Late re-binding must not be visible to the already-submitted job.
        submitter.bind(TenantId::new());

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Some(first)
        );
        pool.shutdown();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// For any interleaving of tenant-A, tenant-B, and unbound
        /// submissions, every worker-side read equals the submitted value.
        #[test]
        fn no_cross_unit_leakage(
            choices in proptest::collection::vec(0u8..3, 1..40),
            pool_size in 1usize..5,
        ) {
            let pool = ContextPool::new(pool_size);
            let tenant_a = TenantId::new();
            let tenant_b = TenantId::new();

            let (tx, rx) = mpsc::channel();
            for choice in &choices {
                let expected = match choice {
                    0 => Some(tenant_a),
                    1 => Some(tenant_b),
                    _ => None,
                };
                let submitter = TenantContext::new();
                if let Some(t) = expected {
                    submitter.bind(t);
                }
                let tx = tx.clone();
                pool.submit(&submitter, move |worker| {
                    tx.send((expected, worker.current())).unwrap();
                });
            }

            for (expected, observed) in recv_all(&rx, choices.len()) {
                prop_assert_eq!(observed, expected);
            }
            pool.shutdown();
        }
    }
}
