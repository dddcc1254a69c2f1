//! HTTP JSON API hosting the automation, queue, recommendation and
//! account-linking handlers.
//!
//! Endpoints:
//! - GET  /health                          - Server status (no auth)
//! - POST /automation-enforce/run          - Enforce enabled automation rules
//! - POST /process-queue/run               - Drain queued operations/actions
//! - POST /generate-recommendations/run    - Generate recommendations
//! - POST /link-account                    - Link a cloud account
//!
//! Every POST route requires `Authorization: Bearer <jwt>`. All responses
//! are JSON; errors are `{"error": "..."}`.

mod error;
mod handlers;

use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use self::error::ApiError;
use self::handlers::{
    handle_drain, handle_enforce, handle_generate, handle_health, handle_link,
    handle_method_not_allowed, handle_not_found,
};
use crate::store::RowStore;

/// State shared across request handlers.
pub struct AppState {
    pub store: Arc<dyn RowStore>,
    /// Queue batch size when the request does not name one.
    pub queue_default_max: usize,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    // the dashboard UI calls from the browser
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health).fallback(handle_not_found))
        .route(
            "/automation-enforce/run",
            post(handle_enforce).fallback(handle_not_found),
        )
        .route(
            "/process-queue/run",
            post(handle_drain).fallback(handle_not_found),
        )
        .route(
            "/generate-recommendations/run",
            post(handle_generate).fallback(handle_method_not_allowed),
        )
        .route(
            "/link-account",
            post(handle_link).fallback(handle_method_not_allowed),
        )
        .fallback(handle_not_found)
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl+C.
pub async fn serve(bind: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %bind, "cloudkeep listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
