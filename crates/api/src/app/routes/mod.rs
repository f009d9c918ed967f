use std::str::FromStr;

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use licensedesk_infra::ExportOutcome;

use crate::app::errors;

pub mod admin;
pub mod auth;
pub mod devices;
pub mod licenses;
pub mod system;

/// Router for unauthenticated endpoints (registration and login).
pub fn public_router() -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/auth/mfa/status", get(auth::mfa_status))
        .route("/auth/mfa/setup", post(auth::mfa_setup))
        .route("/auth/mfa/verify", post(auth::mfa_verify))
        .route("/auth/mfa/disable", post(auth::mfa_disable))
        .nest("/devices", devices::router())
        .nest("/licenses", licenses::router())
        .nest("/admin", admin::router())
}

pub(crate) fn parse_id<T: FromStr>(raw: &str, entity: &str) -> Result<T, axum::response::Response> {
    raw.parse::<T>().map_err(|_| errors::invalid_id(entity))
}

/// Inline download, or a confirmation once the document was mailed.
pub(crate) fn export_response(outcome: ExportOutcome) -> axum::response::Response {
    match outcome {
        ExportOutcome::Document(report) => {
            let disposition = HeaderValue::from_str(&format!("attachment; filename={}", report.filename))
                .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static(report.content_type)),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                report.bytes,
            )
                .into_response()
        }
        ExportOutcome::Delivered { .. } => Json(json!({ "message": "email sent" })).into_response(),
    }
}
