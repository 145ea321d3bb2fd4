//! Application wiring: in-memory services behind the gate, plus the two
//! credential endpoints (interactive login and client-credentials token).

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::error;

use strata_access::{AccessStore, InMemoryAccessStore, RoleAccessService};
use strata_accounts::{ServiceAccountConfig, ServiceAccountId};
use strata_auth::{
    AccountLockoutService, AuthenticationService, CredentialHasher, Hs256TokenSigner,
    InMemoryPrincipalDirectory, JwtClaims, LockoutConfig, LoginRequest, TokenConfig, TokenKind,
    TokenSigner,
};
use strata_core::PrincipalId;
use strata_events::{AuditSink, EventEnvelope, InMemoryEventBus, TracingAuditSink};
use strata_infra::{
    CommandDispatcher, InMemoryEventStore, InMemoryTenantDirectory, InMemoryTenantStore,
    ServiceAccountProjection, ServiceAccountService, ServiceAccountView, TenantDirectory,
};

use crate::context::{PrincipalContext, RequestTenant};
use crate::middleware::{self, AuthState, TenantGateState};

pub mod errors;

use errors::{auth_error_response, json_error, service_error_response};

type ApiStore = Arc<InMemoryEventStore>;
type ApiBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type ApiRead = Arc<InMemoryTenantStore<ServiceAccountId, ServiceAccountView>>;

/// Everything the handlers need, wired over in-memory infrastructure.
pub struct AppServices {
    pub tenants: Arc<InMemoryTenantDirectory>,
    pub users: Arc<InMemoryPrincipalDirectory>,
    pub roles: Arc<RoleAccessService<Arc<InMemoryAccessStore>>>,
    pub authn: AuthenticationService<InMemoryPrincipalDirectory, Arc<InMemoryAccessStore>>,
    pub accounts: ServiceAccountService<ApiStore, ApiBus, ApiRead>,
    pub signer: Arc<dyn TokenSigner>,
    pub tokens: TokenConfig,
}

pub fn build_services(jwt_secret: &[u8]) -> AppServices {
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let tenants = Arc::new(InMemoryTenantDirectory::new());
    let users = Arc::new(InMemoryPrincipalDirectory::new());
    let access_store = Arc::new(InMemoryAccessStore::new());
    let signer: Arc<dyn TokenSigner> = Arc::new(Hs256TokenSigner::new(jwt_secret));
    let tokens = TokenConfig::default();

    let roles = Arc::new(RoleAccessService::new(
        Arc::clone(&access_store),
        audit.clone(),
    ));
    let lockout = AccountLockoutService::new(
        LockoutConfig::default(),
        Arc::clone(&users),
        audit.clone(),
    );
    let authn = AuthenticationService::new(
        Arc::clone(&users),
        lockout,
        Arc::clone(&roles),
        CredentialHasher::new(),
        signer.clone(),
        tokens.clone(),
        audit.clone(),
    );

    let store: ApiStore = Arc::new(InMemoryEventStore::new());
    let bus: ApiBus = Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store, bus);
    let projection = ServiceAccountProjection::new(
        Arc::new(InMemoryTenantStore::new()) as ApiRead,
        audit.clone(),
    );
    let accounts = ServiceAccountService::new(
        dispatcher,
        projection,
        Arc::clone(&access_store) as Arc<dyn AccessStore>,
        CredentialHasher::new(),
        ServiceAccountConfig::default(),
        audit,
    );

    AppServices {
        tenants,
        users,
        roles,
        authn,
        accounts,
        signer,
        tokens,
    }
}

/// Build the router. `/health` bypasses the gate; everything else requires a
/// valid tenant header, and `/whoami` additionally requires a bearer token.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let gate = TenantGateState {
        directory: Arc::clone(&services.tenants) as Arc<dyn TenantDirectory>,
    };
    let auth_state = AuthState {
        signer: services.signer.clone(),
    };

    let authed = Router::new()
        .route("/whoami", get(whoami))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let gated = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/token", post(token))
        .merge(authed)
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            gate,
            middleware::tenant_gate,
        ));

    Router::new().route("/health", get(health)).merge(gated)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    identifier: String,
    password: String,
}

async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<RequestTenant>,
    Json(body): Json<LoginBody>,
) -> axum::response::Response {
    let request = LoginRequest {
        identifier: body.identifier,
        // The gate already established the tenant; the identifier does not
        // need to embed one.
        tenant_hint: Some(tenant.tenant_id()),
        password: body.password,
    };

    match services.authn.login(&request, Utc::now()) {
        Ok(success) => (
            StatusCode::OK,
            Json(json!({
                "principal_id": success.principal_id.to_string(),
                "tenant_id": success.tenant_id.to_string(),
                "access_token": success.access_token,
                "refresh_token": success.refresh_token,
                "token_type": "Bearer",
                "expires_in": success.expires_in,
            })),
        )
            .into_response(),
        Err(e) => auth_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct ClientCredentialsBody {
    client_id: String,
    client_secret: String,
}

async fn token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<RequestTenant>,
    Json(body): Json<ClientCredentialsBody>,
) -> axum::response::Response {
    let now = Utc::now();
    let tenant_id = tenant.tenant_id();

    let view = match services.accounts.validate_client_credentials(
        tenant_id,
        &body.client_id,
        &body.client_secret,
        now,
    ) {
        Ok(view) => view,
        Err(e) => return service_error_response(e),
    };

    let principal: PrincipalId = view.id.into();
    let claims = JwtClaims {
        sub: principal,
        tenant_id,
        kind: TokenKind::Access,
        roles: services
            .roles
            .roles_of(principal)
            .into_iter()
            .map(|r| r.name)
            .collect(),
        permissions: services
            .roles
            .effective_permissions(principal)
            .into_iter()
            .collect(),
        issued_at: now,
        expires_at: now + services.tokens.access_ttl,
    };

    match services.signer.issue(&claims) {
        Ok(access_token) => (
            StatusCode::OK,
            Json(json!({
                "access_token": access_token,
                "token_type": "Bearer",
                "expires_in": services.tokens.access_ttl.num_seconds(),
            })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "token issuance failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
    }
}

async fn whoami(
    Extension(tenant): Extension<RequestTenant>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    Json(json!({
        "tenant_id": tenant.tenant_id().to_string(),
        "principal_id": principal.principal_id().to_string(),
        "roles": principal.roles(),
        "permissions": principal.permissions(),
    }))
}
