//! Black-box tests over the router: gate behavior, login, client credentials.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use tower::ServiceExt;

use strata_api::app::{AppServices, build_app, build_services};
use strata_auth::{CredentialHasher, UserRecord, UserStatus};
use strata_core::{PrincipalId, TenantId};
use strata_infra::TenantStatus;

struct Harness {
    app: Router,
    services: Arc<AppServices>,
    tenant_id: TenantId,
}

fn harness() -> Harness {
    let services = Arc::new(build_services(b"test-secret"));
    let tenant_id = TenantId::new();
    services.tenants.insert_active(tenant_id);

    let hasher = CredentialHasher::new();
    services.users.insert(UserRecord {
        id: PrincipalId::new(),
        tenant_id,
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password: hasher.hash("correct horse").unwrap(),
        status: UserStatus::Active,
        last_authenticated_at: None,
    });

    let app = build_app(Arc::clone(&services));
    Harness {
        app,
        services,
        tenant_id,
    }
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, JsonValue) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str, tenant: Option<&str>, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(tenant) = tenant {
        builder = builder.header("x-tenant-id", tenant);
    }
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, tenant: &str, body: JsonValue) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-tenant-id", tenant)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn login(h: &Harness, password: &str) -> (StatusCode, JsonValue) {
    call(
        &h.app,
        post_json(
            "/auth/login",
            &h.tenant_id.to_string(),
            json!({ "identifier": "alice", "password": password }),
        ),
    )
    .await
}

#[tokio::test]
async fn health_bypasses_the_gate() {
    let h = harness();
    let (status, _) = call(&h.app, get("/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_or_malformed_tenant_header_is_a_client_error() {
    let h = harness();

    let (status, body) = call(&h.app, get("/whoami", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_tenant");

    let (status, body) = call(&h.app, get("/whoami", Some("not-a-uuid"), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "malformed_tenant");
}

#[tokio::test]
async fn unknown_and_suspended_tenants_are_refused_identically() {
    let h = harness();

    let unknown = TenantId::new();
    let (status, unknown_body) =
        call(&h.app, get("/whoami", Some(&unknown.to_string()), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let suspended = TenantId::new();
    h.services.tenants.insert_active(suspended);
    h.services
        .tenants
        .set_status(suspended, TenantStatus::Suspended);
    let (status, suspended_body) =
        call(&h.app, get("/whoami", Some(&suspended.to_string()), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // One generic refusal; the caller cannot tell the cases apart.
    assert_eq!(unknown_body, suspended_body);
}

#[tokio::test]
async fn login_then_token_authorizes_whoami() {
    let h = harness();

    let (status, body) = login(&h, "correct horse").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"], h.tenant_id.to_string());
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = call(
        &h.app,
        get("/whoami", Some(&h.tenant_id.to_string()), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"], h.tenant_id.to_string());
}

#[tokio::test]
async fn wrong_password_and_unknown_user_get_the_same_rejection() {
    let h = harness();

    let (status, wrong) = login(&h, "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, unknown) = call(
        &h.app,
        post_json(
            "/auth/login",
            &h.tenant_id.to_string(),
            json!({ "identifier": "nobody", "password": "wrong" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
}

#[tokio::test]
async fn whoami_without_a_token_is_unauthorized() {
    let h = harness();
    let (status, _) = call(&h.app, get("/whoami", Some(&h.tenant_id.to_string()), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn a_token_for_one_tenant_is_refused_under_another() {
    let h = harness();
    let other = TenantId::new();
    h.services.tenants.insert_active(other);

    let (_, body) = login(&h, "correct horse").await;
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, _) = call(
        &h.app,
        get("/whoami", Some(&other.to_string()), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn client_credentials_issue_a_usable_access_token() {
    let h = harness();
    let created = h
        .services
        .accounts
        .create(h.tenant_id, "ci runner", None, Utc::now())
        .unwrap();

    let (status, body) = call(
        &h.app,
        post_json(
            "/auth/token",
            &h.tenant_id.to_string(),
            json!({
                "client_id": created.view.client_id,
                "client_secret": created.client_secret,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = call(
        &h.app,
        get("/whoami", Some(&h.tenant_id.to_string()), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["principal_id"], created.view.id.to_string());

    let (status, _) = call(
        &h.app,
        post_json(
            "/auth/token",
            &h.tenant_id.to_string(),
            json!({
                "client_id": created.view.client_id,
                "client_secret": "wrong",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
