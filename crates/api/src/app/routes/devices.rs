use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use licensedesk_core::{DeviceId, DeviceUpdate, NewDevice};

use crate::app::dto::{DeviceSearchQuery, ExportBody, ExportParams, ListQuery};
use crate::app::errors;
use crate::app::routes::{export_response, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_devices).post(create_device))
        .route("/stats", get(device_stats))
        .route("/search", get(search_devices))
        .route("/:id", get(get_device).put(update_device).delete(delete_device))
        .route("/:id/export", post(export_device))
}

async fn list_devices(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListQuery>,
) -> axum::response::Response {
    match services.store.list_devices(query.page()).await {
        Ok(listing) => Json(listing).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn create_device(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewDevice>,
) -> axum::response::Response {
    match services.store.create_device(body, Utc::now()).await {
        Ok(device) => {
            tracing::info!(device_id = %device.id, service_tag = %device.service_tag, "device created");
            (StatusCode::CREATED, Json(device)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn search_devices(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<DeviceSearchQuery>,
) -> axum::response::Response {
    match services.store.search_devices(query.service_tag()).await {
        Ok(devices) => Json(devices).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn device_stats(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.store.device_stats(Utc::now()).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn get_device(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: DeviceId = match parse_id(&id, "device") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.store.get_device_with_licenses(id).await {
        Ok(Some(device)) => Json(device).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "device not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn update_device(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<DeviceUpdate>,
) -> axum::response::Response {
    let id: DeviceId = match parse_id(&id, "device") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.store.update_device(id, body, Utc::now()).await {
        Ok(device) => Json(device).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn delete_device(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: DeviceId = match parse_id(&id, "device") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.store.delete_device(id, Utc::now()).await {
        Ok(()) => {
            tracing::info!(device_id = %id, "device deleted");
            Json(json!({ "message": "device deleted" })).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn export_device(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<ExportParams>,
    ExportBody(body): ExportBody,
) -> axum::response::Response {
    let id: DeviceId = match parse_id(&id, "device") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let request = match ExportParams::merge(query, body) {
        Ok(request) => request,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.exports.export_device(id, request).await {
        Ok(outcome) => export_response(outcome),
        Err(e) => errors::export_error_to_response(e),
    }
}
