use crate::AppState;
use crate::api::ApiError;
use crate::session::{SessionToken, session_from_headers};
use axum::extract::Extension;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Json};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct VerifyResponse {
    pub ok: bool,
}

#[derive(Serialize, Deserialize)]
pub struct CheckResponse {
    pub authenticated: bool,
}

#[derive(Serialize, Deserialize)]
pub struct DownloadResponse {
    pub url: String,
}

/// POST /api/verify
///
/// Exchanges the shared password for a session cookie.
pub async fn verify_password(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: VerifyRequest = serde_json::from_slice(&body).map_err(|error| {
        warn!(%error, "Unparseable verify body");
        ApiError::InvalidBody
    })?;

    let matches = request
        .password
        .as_deref()
        .is_some_and(|password| state.password_matches(password));
    if !matches {
        return Err(ApiError::WrongPassword);
    }

    let token = state.authority.issue();
    let cookie = state.cookie_policy.session_cookie(&token).map_err(|error| {
        error!(%error, "Failed to build session cookie");
        ApiError::Configuration
    })?;

    info!(issued_at = token.issued_at_millis(), "Session issued");
    Ok(([(header::SET_COOKIE, cookie)], Json(VerifyResponse { ok: true })))
}

/// GET /api/check
pub async fn check_session(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Json<CheckResponse> {
    let authenticated =
        session_from_headers(&headers).is_some_and(|token| state.authority.validate(token));

    Json(CheckResponse { authenticated })
}

/// GET /api/download
///
/// Runs behind [`session_auth_middleware`](crate::session::session_auth_middleware),
/// so the storage provider is only contacted for authenticated requests.
pub async fn download_link(
    Extension(state): Extension<AppState>,
    Extension(session): Extension<SessionToken>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let Some(storage) = &state.storage else {
        error!("Missing storage URL or service key");
        return Err(ApiError::Configuration);
    };

    match storage.signed_download_url().await {
        Ok(url) => {
            info!(
                issued_at = session.issued_at_millis(),
                link_expiry_secs = storage.link_expiry().as_secs(),
                "Download link generated"
            );
            Ok(Json(DownloadResponse { url }))
        }
        Err(error) => {
            error!(%error, "Storage signing failed");
            Err(ApiError::LinkGeneration)
        }
    }
}

/// Fallback for every API route hit with the wrong method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
