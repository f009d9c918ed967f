use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::UserContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    let mfa_enabled = match services.store.get_user(user.user_id()).await {
        Ok(found) => found.is_some_and(|u| u.mfa_enabled()),
        Err(e) => return errors::store_error_to_response(e),
    };

    Json(json!({
        "user_id": user.user_id().to_string(),
        "email": user.email(),
        "mfa_enabled": mfa_enabled,
    }))
    .into_response()
}
