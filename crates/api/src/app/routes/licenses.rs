use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::json;

use licensedesk_core::{
    Device, DeviceId, LicenseId, LicenseUpdate, NewLicense, Urgency, days_until_expiry,
    is_expiring, query_cutoff,
};
use licensedesk_infra::{InventoryStore, Listing, StoreError};

use crate::app::dto::{ExpiringLicenseView, ExportBody, ExportParams, LicenseSearchQuery, ListQuery};
use crate::app::errors;
use crate::app::routes::{export_response, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_licenses).post(create_license))
        .route("/stats", get(license_stats))
        .route("/expiring", get(expiring_licenses))
        .route("/search", get(search_licenses))
        .route("/:id", get(get_license).put(update_license).delete(delete_license))
        .route("/:id/export", post(export_license))
}

async fn list_licenses(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListQuery>,
) -> axum::response::Response {
    match services.store.list_licenses(query.page()).await {
        Ok(listing) => Json(listing).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn create_license(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewLicense>,
) -> axum::response::Response {
    match services.store.create_license(body, Utc::now()).await {
        Ok(license) => {
            tracing::info!(license_id = %license.id, license_type = %license.license_type, "license created");
            (StatusCode::CREATED, Json(license)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn search_licenses(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<LicenseSearchQuery>,
) -> axum::response::Response {
    match services.store.search_licenses(query.license_type()).await {
        Ok(licenses) => Json(licenses).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn license_stats(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.store.license_stats(Utc::now()).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn expiring_licenses(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match upcoming_expirations(services.store.as_ref(), Utc::now()).await {
        Ok(views) => Json(Listing {
            count: views.len(),
            data: views,
        })
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Licenses inside the lookahead window that have not expired yet, soonest
/// first, each annotated with its urgency and owning device.
async fn upcoming_expirations(
    store: &dyn InventoryStore,
    now: DateTime<Utc>,
) -> Result<Vec<ExpiringLicenseView>, StoreError> {
    let candidates = store.licenses_expiring_before(query_cutoff(now)).await?;

    let mut devices = HashMap::new();
    let mut views = Vec::new();
    for license in candidates {
        if license.is_expired(now) || !is_expiring(license.expiration_date, now) {
            continue;
        }

        let device = match license.device_id {
            Some(device_id) => lookup_device(store, &mut devices, device_id).await?,
            None => None,
        };

        let days = days_until_expiry(license.expiration_date, now);
        views.push(ExpiringLicenseView {
            license,
            days_until_expiry: days,
            urgency: Urgency::from_days(days),
            device,
        });
    }

    Ok(views)
}

async fn lookup_device(
    store: &dyn InventoryStore,
    cache: &mut HashMap<DeviceId, Option<Device>>,
    id: DeviceId,
) -> Result<Option<Device>, StoreError> {
    if let Some(hit) = cache.get(&id) {
        return Ok(hit.clone());
    }
    let device = store.get_device(id).await?;
    cache.insert(id, device.clone());
    Ok(device)
}

async fn get_license(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: LicenseId = match parse_id(&id, "license") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.store.get_license(id).await {
        Ok(Some(license)) => Json(license).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "license not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn update_license(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<LicenseUpdate>,
) -> axum::response::Response {
    let id: LicenseId = match parse_id(&id, "license") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.store.update_license(id, body, Utc::now()).await {
        Ok(license) => Json(license).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn delete_license(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: LicenseId = match parse_id(&id, "license") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.store.delete_license(id).await {
        Ok(()) => {
            tracing::info!(license_id = %id, "license deleted");
            Json(json!({ "message": "license deleted" })).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn export_license(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<ExportParams>,
    ExportBody(body): ExportBody,
) -> axum::response::Response {
    let id: LicenseId = match parse_id(&id, "license") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let request = match ExportParams::merge(query, body) {
        Ok(request) => request,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.exports.export_license(id, request).await {
        Ok(outcome) => export_response(outcome),
        Err(e) => errors::export_error_to_response(e),
    }
}
