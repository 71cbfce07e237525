pub mod api;
pub mod app_state;
pub mod config;
pub mod session;
pub mod storage;

use anyhow::Context;
use axum::Router;
use axum::extract::Extension;
use axum::routing::{get, post};
use std::path::Path;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

//
// Re-export
//
pub use api::{ApiError, check_session, download_link, log_request_errors, verify_password};
pub use app_state::AppState;
pub use config::Config;
pub use session::{
    CookiePolicy, SESSION_COOKIE, SessionToken, TokenAuthority, TokenError,
    session_auth_middleware,
};
pub use storage::{StorageClient, StorageConfig, StorageError};

/// Build the router: the three gate endpoints plus static files for everything else.
pub fn app(state: AppState, public_dir: &Path) -> Router {
    let download = get(download_link)
        .fallback(api::method_not_allowed)
        .route_layer(axum::middleware::from_fn_with_state(
            state.authority.clone(),
            session_auth_middleware,
        ));

    let static_files = ServeDir::new(public_dir).append_index_html_on_directories(true);

    Router::new()
        .route(
            "/api/verify",
            post(verify_password).fallback(api::method_not_allowed),
        )
        .route(
            "/api/check",
            get(check_session).fallback(api::method_not_allowed),
        )
        .route("/api/download", download)
        .fallback_service(static_files)
        .layer(axum::middleware::from_fn(api::log_request_errors))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    let state = AppState::new(&config)?;

    let public_dir = Path::new(&config.public_dir);
    if !public_dir.is_dir() {
        warn!(public_dir = ?public_dir, "Public directory does not exist");
    }

    let app = app(state, public_dir);

    let addr = format!("0.0.0.0:{}", config.listen_on_port);
    info!("Listening on {addr}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app).await?;
    Ok(())
}
