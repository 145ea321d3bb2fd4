//! Error taxonomy to HTTP mapping.
//!
//! Client input 400, credential/authorization rejections 401/403 with one
//! generic message, not-found 404, conflicts 409, internal failures 500 with
//! detail logged and never echoed.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use strata_auth::AuthError;
use strata_infra::ServiceError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn auth_error_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::MalformedIdentifier => json_error(
            StatusCode::BAD_REQUEST,
            "malformed_identifier",
            "login identifier is malformed",
        ),
        AuthError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid credentials",
        ),
        AuthError::Internal(e) => {
            error!(error = ?e, "authentication failed internally");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
    }
}

pub fn service_error_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid client credentials",
        ),
        ServiceError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        ServiceError::Denied => json_error(StatusCode::FORBIDDEN, "forbidden", "access denied"),
        ServiceError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Internal(e) => {
            error!(error = ?e, "service account operation failed internally");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
    }
}
