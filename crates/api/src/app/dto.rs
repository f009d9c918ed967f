use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use serde::{Deserialize, Serialize};

use licensedesk_core::{Device, DomainResult, License, Urgency};
use licensedesk_infra::{ExportRequest, Page};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MfaVerifyRequest {
    pub code: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}

/// Export options, accepted as a JSON body or as query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ExportParams {
    /// Body fields win over query fields.
    pub fn merge(query: ExportParams, body: Option<ExportParams>) -> DomainResult<ExportRequest> {
        let body = body.unwrap_or_default();
        let format = body.format.or(query.format);
        let email = body.email.or(query.email);
        ExportRequest::from_raw(format.as_deref(), email.as_deref())
    }
}

/// Optional export body, read as JSON or as a urlencoded form depending on
/// the content type. An empty body yields `None`; a body that cannot be read
/// is rejected rather than ignored.
#[derive(Debug, Default)]
pub struct ExportBody(pub Option<ExportParams>);

#[axum::async_trait]
impl<S> FromRequest<S> for ExportBody
where
    S: Send + Sync,
{
    type Rejection = axum::response::Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase());

        if content_type.as_deref() == Some("application/x-www-form-urlencoded") {
            return Form::<ExportParams>::from_request(req, state)
                .await
                .map(|Form(params)| Self(Some(params)))
                .map_err(|e| invalid_body(e.body_text()));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        if bytes.is_empty() {
            return Ok(Self(None));
        }

        match content_type.as_deref() {
            Some(ct) if ct == "application/json" || ct.ends_with("+json") => {
                Json::<ExportParams>::from_bytes(&bytes)
                    .map(|Json(params)| Self(Some(params)))
                    .map_err(|e| invalid_body(e.body_text()))
            }
            _ => Err(errors::json_error(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                "export options must be JSON or form-encoded",
            )),
        }
    }
}

fn invalid_body(detail: String) -> axum::response::Response {
    errors::json_error(
        StatusCode::BAD_REQUEST,
        "validation_error",
        format!("invalid export options: {detail}"),
    )
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct MfaStatusResponse {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct MfaSetupResponse {
    pub secret: String,
    pub otpauth_url: String,
}

#[derive(Debug, Serialize)]
pub struct ExpiringLicenseView {
    #[serde(flatten)]
    pub license: License,
    pub days_until_expiry: i64,
    pub urgency: Urgency,
    pub device: Option<Device>,
}

/// `?service_tag=`; blank means no filter.
#[derive(Debug, Default, Deserialize)]
pub struct DeviceSearchQuery {
    pub service_tag: Option<String>,
}

impl DeviceSearchQuery {
    pub fn service_tag(&self) -> Option<&str> {
        self.service_tag.as_deref().filter(|t| !t.is_empty())
    }
}

/// `?license_type=`; blank means no filter.
#[derive(Debug, Default, Deserialize)]
pub struct LicenseSearchQuery {
    pub license_type: Option<String>,
}

impl LicenseSearchQuery {
    pub fn license_type(&self) -> Option<&str> {
        self.license_type.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub outcome: &'static str,
    pub licenses: usize,
}
