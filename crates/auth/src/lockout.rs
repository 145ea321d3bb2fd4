//! Sliding-window account lockout.
//!
//! Failure history is tracked per (principal, tenant). This is the one piece
//! of genuinely shared mutable state in the core; each key gets its own mutex
//! so concurrent failed attempts for the same key serialize and never
//! under-count toward the threshold. The cache is process-local; a
//! distributed deployment would move it to a shared store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use strata_core::{DomainResult, PrincipalId, TenantId};
use strata_events::{AuditEvent, AuditOutcome, AuditSink};

use crate::principal::{PrincipalDirectory, UserStatus};

/// Lockout policy knobs.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Failures within the window that trigger a lock.
    pub max_attempts: u32,
    /// Both the sliding window for counting and the duration of a lock.
    pub lockout_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_duration: Duration::minutes(15),
        }
    }
}

impl LockoutConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_lockout_duration(mut self, lockout_duration: Duration) -> Self {
        self.lockout_duration = lockout_duration;
        self
    }
}

#[derive(Debug, Default)]
struct LockoutRecord {
    /// Failure instants within the window, oldest first.
    failures: Vec<DateTime<Utc>>,
    locked_at: Option<DateTime<Utc>>,
}

type LockoutKey = (PrincipalId, TenantId);

/// Sliding-window failed-attempt tracker with lazy lock expiry.
///
/// All instants are passed in explicitly so callers (and tests) control the
/// clock; the authentication flow passes `Utc::now()`.
pub struct AccountLockoutService<D> {
    config: LockoutConfig,
    entries: RwLock<HashMap<LockoutKey, Arc<Mutex<LockoutRecord>>>>,
    directory: D,
    audit: Arc<dyn AuditSink>,
}

impl<D> AccountLockoutService<D>
where
    D: PrincipalDirectory,
{
    pub fn new(config: LockoutConfig, directory: D, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            directory,
            audit,
        }
    }

    /// Record a failed attempt. Returns `true` when the account is locked
    /// after this attempt (either already locked, or just transitioned).
    pub fn record_failed_attempt(
        &self,
        principal: PrincipalId,
        tenant: TenantId,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let entry = self.entry(principal, tenant);
        let mut record = entry.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(locked_at) = record.locked_at {
            if self.lock_active(locked_at, now) {
                // Already locked: report it without appending a new instant.
                return Ok(true);
            }
            self.release(&mut record, principal, tenant)?;
        }

        // Prune instants that have slid out of the window before counting.
        let window_start = now - self.config.lockout_duration;
        record.failures.retain(|t| *t > window_start);
        record.failures.push(now);

        if record.failures.len() as u32 >= self.config.max_attempts {
            record.locked_at = Some(now);
            self.directory.set_status(tenant, principal, UserStatus::Locked)?;
            self.audit.record(AuditEvent::new(
                "lockout.locked",
                Some(principal),
                Some(tenant),
                AuditOutcome::Denied,
                format!("{} failures within window", record.failures.len()),
            ));
            info!(%principal, %tenant, "account locked");
            return Ok(true);
        }

        Ok(false)
    }

    /// Whether the account is currently locked, with lazy expiry: an elapsed
    /// lock is released (history cleared, ACTIVE status restored) on the
    /// spot and reported as unlocked.
    pub fn is_locked(
        &self,
        principal: PrincipalId,
        tenant: TenantId,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let Some(entry) = self.existing_entry(principal, tenant) else {
            return Ok(false);
        };
        let mut record = entry.lock().unwrap_or_else(PoisonError::into_inner);

        match record.locked_at {
            Some(locked_at) if self.lock_active(locked_at, now) => Ok(true),
            Some(_) => {
                self.release(&mut record, principal, tenant)?;
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Forget all failure history for the key. Called on successful
    /// authentication.
    pub fn reset_attempts(&self, principal: PrincipalId, tenant: TenantId) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&(principal, tenant));
    }

    fn lock_active(&self, locked_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        locked_at + self.config.lockout_duration > now
    }

    fn release(
        &self,
        record: &mut LockoutRecord,
        principal: PrincipalId,
        tenant: TenantId,
    ) -> DomainResult<()> {
        record.locked_at = None;
        record.failures.clear();
        self.directory.set_status(tenant, principal, UserStatus::Active)?;
        self.audit.record(AuditEvent::new(
            "lockout.expired",
            Some(principal),
            Some(tenant),
            AuditOutcome::Success,
            "lock expired, failure history reset",
        ));
        Ok(())
    }

    fn entry(&self, principal: PrincipalId, tenant: TenantId) -> Arc<Mutex<LockoutRecord>> {
        if let Some(entry) = self.existing_entry(principal, tenant) {
            return entry;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            entries
                .entry((principal, tenant))
                .or_insert_with(|| Arc::new(Mutex::new(LockoutRecord::default()))),
        )
    }

    fn existing_entry(
        &self,
        principal: PrincipalId,
        tenant: TenantId,
    ) -> Option<Arc<Mutex<LockoutRecord>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&(principal, tenant)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use strata_events::InMemoryAuditSink;

    use super::*;
    use crate::password::PasswordDigest;
    use crate::principal::{InMemoryPrincipalDirectory, UserRecord};

    fn setup(
        max_attempts: u32,
    ) -> (
        AccountLockoutService<Arc<InMemoryPrincipalDirectory>>,
        Arc<InMemoryPrincipalDirectory>,
        PrincipalId,
        TenantId,
    ) {
        let directory = Arc::new(InMemoryPrincipalDirectory::new());
        let tenant = TenantId::new();
        let principal = PrincipalId::new();
        directory.insert(UserRecord {
            id: principal,
            tenant_id: tenant,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: PasswordDigest::new("argon2id", "x"),
            status: UserStatus::Active,
            last_authenticated_at: None,
        });

        let service = AccountLockoutService::new(
            LockoutConfig::default().with_max_attempts(max_attempts),
            Arc::clone(&directory),
            Arc::new(InMemoryAuditSink::new()),
        );
        (service, directory, principal, tenant)
    }

    #[test]
    fn nth_failure_within_window_locks() {
        let (service, directory, principal, tenant) = setup(3);
        let now = Utc::now();

        assert!(!service.record_failed_attempt(principal, tenant, now).unwrap());
        assert!(!service
            .record_failed_attempt(principal, tenant, now + Duration::seconds(1))
            .unwrap());
        assert!(service
            .record_failed_attempt(principal, tenant, now + Duration::seconds(2))
            .unwrap());

        assert_eq!(
            directory.get(tenant, principal).unwrap().status,
            UserStatus::Locked
        );
    }

    #[test]
    fn failures_outside_the_window_do_not_count() {
        let (service, _, principal, tenant) = setup(3);
        let now = Utc::now();

        assert!(!service.record_failed_attempt(principal, tenant, now).unwrap());
        assert!(!service
            .record_failed_attempt(principal, tenant, now + Duration::minutes(16))
            .unwrap());
        // The first failure has slid out: this is only the second in-window.
        assert!(!service
            .record_failed_attempt(principal, tenant, now + Duration::minutes(17))
            .unwrap());
    }

    #[test]
    fn reset_clears_the_counter() {
        let (service, _, principal, tenant) = setup(3);
        let now = Utc::now();

        service.record_failed_attempt(principal, tenant, now).unwrap();
        service.record_failed_attempt(principal, tenant, now).unwrap();
        service.reset_attempts(principal, tenant);

        assert!(!service.record_failed_attempt(principal, tenant, now).unwrap());
    }

    #[test]
    fn lock_expires_exactly_at_boundary_and_not_before() {
        let (service, directory, principal, tenant) = setup(1);
        let now = Utc::now();

        assert!(service.record_failed_attempt(principal, tenant, now).unwrap());

        let just_before = now + Duration::minutes(15) - Duration::milliseconds(1);
        assert!(service.is_locked(principal, tenant, just_before).unwrap());

        let at_boundary = now + Duration::minutes(15);
        assert!(!service.is_locked(principal, tenant, at_boundary).unwrap());
        assert_eq!(
            directory.get(tenant, principal).unwrap().status,
            UserStatus::Active
        );
    }

    #[test]
    fn attempts_while_locked_do_not_extend_the_lock() {
        let (service, _, principal, tenant) = setup(1);
        let now = Utc::now();

        service.record_failed_attempt(principal, tenant, now).unwrap();
        // A failure mid-lock reports locked without appending.
        assert!(service
            .record_failed_attempt(principal, tenant, now + Duration::minutes(10))
            .unwrap());
        // Expiry is still measured from the original lock instant.
        assert!(!service
            .is_locked(principal, tenant, now + Duration::minutes(15))
            .unwrap());
    }

    #[test]
    fn concurrent_failures_never_under_count() {
        let (service, _, principal, tenant) = setup(8);
        let service = Arc::new(service);
        let now = Utc::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    service.record_failed_attempt(principal, tenant, now).unwrap()
                })
            })
            .collect();

        // The per-key mutex serializes the read-modify-write: with the
        // threshold equal to the number of attempts, the last one must lock.
        let locked_reports = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|locked| *locked)
            .count();
        assert!(locked_reports >= 1);
        assert!(service.is_locked(principal, tenant, now).unwrap());
    }
}
