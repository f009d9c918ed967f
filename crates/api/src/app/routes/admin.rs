//! Operator endpoints.

use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::post, Json, Router};
use chrono::Utc;

use crate::app::dto::ScanResponse;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/expiration-scan", post(run_expiration_scan))
}

/// Run one expiration scan immediately, outside the background schedule.
async fn run_expiration_scan(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let outcome = services.scanner.scan_once(Utc::now()).await;
    tracing::info!(outcome = outcome.label(), "manual expiration scan finished");

    Json(ScanResponse {
        outcome: outcome.label(),
        licenses: outcome.license_count(),
    })
    .into_response()
}
