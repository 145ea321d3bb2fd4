//! Request-entry middleware: the tenant gate and bearer authentication.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::warn;

use strata_auth::{TokenKind, TokenSigner};
use strata_context::TenantContext;
use strata_core::TenantId;
use strata_infra::TenantDirectory;

use crate::app::errors::json_error;
use crate::context::{PrincipalContext, RequestTenant};

/// Header carrying the tenant identifier on every gated request.
pub const TENANT_HEADER: &str = "x-tenant-id";

#[derive(Clone)]
pub struct TenantGateState {
    pub directory: Arc<dyn TenantDirectory>,
}

/// Per-request state machine: extract, validate, bind, handle, clear.
///
/// A missing or malformed header is the caller's fault (400). An unknown,
/// suspended, or unresolvable tenant is refused with one generic 403; the
/// log records which. The context is cleared on every exit path, including
/// handler panic or cancellation, via the drop guard.
pub async fn tenant_gate(
    State(state): State<TenantGateState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let tenant_id = match extract_tenant(req.headers()) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.directory.tenant(tenant_id) {
        Ok(Some(record)) if record.is_active() => {}
        Ok(Some(_)) => {
            warn!(%tenant_id, "request for suspended tenant refused");
            return tenant_refused();
        }
        Ok(None) => {
            warn!(%tenant_id, "request for unknown tenant refused");
            return tenant_refused();
        }
        Err(e) => {
            // Lookup failure fails closed.
            warn!(%tenant_id, error = %e, "tenant lookup failed");
            return tenant_refused();
        }
    }

    let context = Arc::new(TenantContext::new());
    context.bind(tenant_id);
    let _guard = BoundContext {
        context: Arc::clone(&context),
    };
    req.extensions_mut()
        .insert(RequestTenant::new(tenant_id, context));

    next.run(req).await
}

#[derive(Clone)]
pub struct AuthState {
    pub signer: Arc<dyn TokenSigner>,
}

/// Bearer-token authentication for routes behind the gate.
///
/// The token must be a valid access token whose tenant claim matches the
/// tenant bound by the gate; a mismatch is refused even when the signature
/// is good.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())?;

    let claims = state
        .signer
        .validate(token, Utc::now())
        .map_err(|_| unauthorized())?;
    if claims.kind != TokenKind::Access {
        return Err(unauthorized());
    }

    if let Some(tenant) = req.extensions().get::<RequestTenant>() {
        if claims.tenant_id != tenant.tenant_id() {
            warn!(
                token_tenant = %claims.tenant_id,
                bound_tenant = %tenant.tenant_id(),
                "token tenant does not match request tenant"
            );
            return Err(tenant_refused());
        }
    }

    req.extensions_mut().insert(PrincipalContext::new(
        claims.sub,
        claims.roles,
        claims.permissions,
    ));
    Ok(next.run(req).await)
}

/// Clears the bound context when dropped, whatever path the request exits on.
struct BoundContext {
    context: Arc<TenantContext>,
}

impl Drop for BoundContext {
    fn drop(&mut self) {
        self.context.clear();
    }
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, Response> {
    let header = headers.get(TENANT_HEADER).ok_or_else(|| {
        json_error(
            StatusCode::BAD_REQUEST,
            "missing_tenant",
            "tenant header is required",
        )
    })?;

    let value = header
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            json_error(
                StatusCode::BAD_REQUEST,
                "missing_tenant",
                "tenant header is required",
            )
        })?;

    value.parse::<TenantId>().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "malformed_tenant",
            "tenant header is not a valid id",
        )
    })
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, Response> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(unauthorized)?;
    let header = header.to_str().map_err(|_| unauthorized())?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(unauthorized)?;
    Ok(token)
}

fn unauthorized() -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
}

// One generic refusal for unknown, suspended, and unresolvable tenants.
fn tenant_refused() -> Response {
    json_error(
        StatusCode::FORBIDDEN,
        "tenant_rejected",
        "tenant is not available",
    )
}
