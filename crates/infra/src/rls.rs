//! Row-level-security connection guard.
//!
//! Postgres RLS policies on tenant-owned tables filter by the session
//! variable written here. Physical connections are reused across logical
//! tenants, so the variable is (re)written on every logical acquisition,
//! before any query runs on that connection.

use sqlx::PgPool;
use sqlx::pool::PoolConnection;
use sqlx::postgres::Postgres;
use tracing::trace;
use uuid::Uuid;

use strata_context::TenantContext;

/// Session variable read by the row-level-security policies.
pub const TENANT_SESSION_VAR: &str = "app.current_tenant";

/// Value written when no tenant is bound. The nil UUID matches no real tenant
/// row, so an unbound context sees zero rows rather than all rows.
pub const NO_TENANT_SENTINEL: Uuid = Uuid::nil();

/// Connection pool wrapper that stamps the tenant session variable on every
/// acquisition. This is the sole writer of [`TENANT_SESSION_VAR`]; acquiring
/// connections any other way bypasses row-level security setup.
#[derive(Debug, Clone)]
pub struct RlsPool {
    pool: PgPool,
}

impl RlsPool {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Acquire a connection with the session variable set from `context`.
    ///
    /// The value is bound as a statement parameter, never interpolated into
    /// SQL. With no tenant bound, the sentinel is written explicitly rather
    /// than leaving whatever the previous user of this physical connection
    /// set.
    pub async fn acquire(
        &self,
        context: &TenantContext,
    ) -> Result<PoolConnection<Postgres>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;

        let tenant = context
            .current()
            .map(Uuid::from)
            .unwrap_or(NO_TENANT_SENTINEL);
        trace!(%tenant, "setting tenant session variable");

        sqlx::query("SELECT set_config($1, $2, false)")
            .bind(TENANT_SESSION_VAR)
            .bind(tenant.to_string())
            .execute(&mut *conn)
            .await?;

        Ok(conn)
    }

    /// The underlying pool, for operations outside tenant-scoped tables
    /// (migrations, health checks).
    pub fn inner(&self) -> &PgPool {
        &self.pool
    }
}
