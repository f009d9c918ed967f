use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use licensedesk_auth::AuthError;
use licensedesk_core::DomainError;
use licensedesk_infra::{ExportError, StoreError};

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(entity) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{entity} not found"))
        }
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "persistence failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "persistence_error", msg)
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    store_error_to_response(err.into())
}

pub fn export_error_to_response(err: ExportError) -> axum::response::Response {
    match err {
        ExportError::NotFound(entity) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{entity} not found"))
        }
        ExportError::Persistence(e) => store_error_to_response(e),
        ExportError::Build(e) => {
            tracing::error!(error = %e, "export build failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "build_error", e.to_string())
        }
        ExportError::Delivery(e) => {
            tracing::error!(error = %e, "export delivery failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "delivery_error",
                format!("export succeeded but delivery failed: {e}"),
            )
        }
    }
}

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", "invalid email or password")
        }
        AuthError::MfaRequired => json_error(StatusCode::UNAUTHORIZED, "mfa_required", err.to_string()),
        AuthError::MfaInvalidCode => json_error(StatusCode::UNAUTHORIZED, "mfa_invalid", err.to_string()),
        AuthError::MfaNotEnrolled => {
            json_error(StatusCode::BAD_REQUEST, "mfa_not_enrolled", err.to_string())
        }
        AuthError::TokenExpired => json_error(StatusCode::UNAUTHORIZED, "token_expired", err.to_string()),
        AuthError::TokenInvalid(_) => json_error(StatusCode::UNAUTHORIZED, "invalid_token", err.to_string()),
        AuthError::Crypto(msg) => {
            tracing::error!(error = %msg, "auth crypto failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "crypto_error", "internal authentication failure")
        }
    }
}

pub fn invalid_id(entity: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {entity} id"))
}

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
