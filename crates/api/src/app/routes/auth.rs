use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use licensedesk_auth::{AuthError, password, totp};
use licensedesk_core::{NewUser, User, normalize_email};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::UserContext;

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewUser>,
) -> axum::response::Response {
    if let Err(e) = body.validate() {
        return errors::domain_error_to_response(e);
    }

    let hash = match password::hash_password(&body.password) {
        Ok(h) => h,
        Err(e) => return errors::auth_error_to_response(e),
    };

    let user = match body.into_user(hash, Utc::now()) {
        Ok(u) => u,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store.create_user(user).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "user registered");
            (StatusCode::CREATED, Json(user)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let user = match authenticate(&services, &body).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let token = match services.jwt.issue(user.id, &user.email, Utc::now()) {
        Ok(t) => t,
        Err(e) => return errors::auth_error_to_response(e),
    };

    Json(dto::TokenResponse {
        access_token: token,
        token_type: "bearer",
        expires_in: services.jwt.ttl_secs(),
    })
    .into_response()
}

/// Password check, then the second factor when the user has one.
async fn authenticate(
    services: &AppServices,
    body: &dto::LoginRequest,
) -> Result<User, axum::response::Response> {
    let invalid = || errors::auth_error_to_response(AuthError::InvalidCredentials);

    let email = normalize_email(&body.email).map_err(|_| invalid())?;
    let user = services
        .store
        .get_user_by_email(&email)
        .await
        .map_err(errors::store_error_to_response)?
        .ok_or_else(invalid)?;

    let password_ok =
        password::verify_password(&body.password, &user.password_hash).map_err(errors::auth_error_to_response)?;
    if !password_ok {
        tracing::info!(user_id = %user.id, "login rejected: bad password");
        return Err(invalid());
    }

    if let Some(secret) = &user.mfa_secret {
        let code = body
            .otp
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| errors::auth_error_to_response(AuthError::MfaRequired))?;

        let valid = totp::verify_code(secret, code, &services.totp_issuer, &user.email)
            .map_err(errors::auth_error_to_response)?;
        if !valid {
            tracing::info!(user_id = %user.id, "login rejected: bad MFA code");
            return Err(errors::auth_error_to_response(AuthError::MfaInvalidCode));
        }
    }

    Ok(user)
}

pub async fn mfa_setup(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<UserContext>,
) -> axum::response::Response {
    let enrollment = match totp::generate_enrollment(&services.totp_issuer, ctx.email()) {
        Ok(e) => e,
        Err(e) => return errors::auth_error_to_response(e),
    };

    if let Err(e) = services
        .store
        .set_mfa_secret(ctx.user_id(), Some(enrollment.secret.clone()), Utc::now())
        .await
    {
        return errors::store_error_to_response(e);
    }

    tracing::info!(user_id = %ctx.user_id(), "mfa enrolled");
    Json(dto::MfaSetupResponse {
        secret: enrollment.secret,
        otpauth_url: enrollment.otpauth_url,
    })
    .into_response()
}

pub async fn mfa_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<UserContext>,
) -> axum::response::Response {
    match services.store.get_user(ctx.user_id()).await {
        Ok(Some(user)) => Json(dto::MfaStatusResponse {
            enabled: user.mfa_enabled(),
        })
        .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn mfa_verify(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<UserContext>,
    Json(body): Json<dto::MfaVerifyRequest>,
) -> axum::response::Response {
    let user = match services.store.get_user(ctx.user_id()).await {
        Ok(Some(u)) => u,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
        Err(e) => return errors::store_error_to_response(e),
    };

    let Some(secret) = user.mfa_secret.as_deref() else {
        return errors::auth_error_to_response(AuthError::MfaNotEnrolled);
    };

    match totp::verify_code(secret, &body.code, &services.totp_issuer, &user.email) {
        Ok(valid) => Json(json!({ "valid": valid })).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn mfa_disable(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<UserContext>,
) -> axum::response::Response {
    match services.store.set_mfa_secret(ctx.user_id(), None, Utc::now()).await {
        Ok(_) => {
            tracing::info!(user_id = %ctx.user_id(), "mfa disabled");
            Json(json!({ "message": "mfa disabled" })).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
