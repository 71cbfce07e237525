use crate::api::ApiError;
use crate::session::TokenAuthority;
use crate::session::cookie::session_from_headers;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{debug, warn};

/// Middleware guarding routes that require a valid session cookie.
///
/// Rejects with 401 before the wrapped handler runs. On success the verified
/// [`SessionToken`](crate::session::SessionToken) is stored in the request
/// extensions.
pub async fn session_auth_middleware(
    State(authority): State<Arc<TokenAuthority>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = session_from_headers(req.headers()) else {
        warn!(path = %req.uri().path(), "Missing session cookie");
        return ApiError::NotAuthenticated.into_response();
    };

    let session = match authority.verify(token) {
        Ok(session) => session,
        Err(reason) => {
            warn!(path = %req.uri().path(), %reason, "Rejected session cookie");
            return ApiError::NotAuthenticated.into_response();
        }
    };

    debug!(issued_at = session.issued_at_millis(), "Session accepted");
    req.extensions_mut().insert(session);
    next.run(req).await
}
