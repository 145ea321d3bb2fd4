//! Service-account expiration policy.

use chrono::{DateTime, Duration, Utc};

use strata_core::{DomainError, DomainResult};

/// Bounds applied to service-account expiry at creation and update time.
#[derive(Debug, Clone)]
pub struct ServiceAccountConfig {
    /// Expiry applied when the caller does not request one (and
    /// `allow_no_expiration` is off).
    pub default_expiration: Duration,
    /// Hard ceiling on any requested expiry.
    pub max_expiration: Duration,
    /// Whether accounts may be created without an expiry at all.
    pub allow_no_expiration: bool,
}

impl Default for ServiceAccountConfig {
    fn default() -> Self {
        Self {
            default_expiration: Duration::days(365),
            max_expiration: Duration::days(730),
            allow_no_expiration: false,
        }
    }
}

impl ServiceAccountConfig {
    pub fn with_default_expiration(mut self, d: Duration) -> Self {
        self.default_expiration = d;
        self
    }

    pub fn with_max_expiration(mut self, d: Duration) -> Self {
        self.max_expiration = d;
        self
    }

    pub fn with_allow_no_expiration(mut self, allow: bool) -> Self {
        self.allow_no_expiration = allow;
        self
    }

    /// Resolve a requested expiry against the policy.
    ///
    /// No request means the default expiry (or no expiry when the policy
    /// allows it). An explicit request must lie in `(now, now + max]`.
    pub fn resolve_expiry(
        &self,
        now: DateTime<Utc>,
        requested: Option<DateTime<Utc>>,
    ) -> DomainResult<Option<DateTime<Utc>>> {
        match requested {
            None if self.allow_no_expiration => Ok(None),
            None => Ok(Some(now + self.default_expiration)),
            Some(at) if at <= now => Err(DomainError::validation("expiry must be in the future")),
            Some(at) if at > now + self.max_expiration => Err(DomainError::validation(
                "expiry exceeds the configured maximum",
            )),
            Some(at) => Ok(Some(at)),
        }
    }
}
