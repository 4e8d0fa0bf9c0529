//! HTTP Server Module
//!
//! Maps the `/api/v2` routes onto [`NamespacedStore`] calls.
//!
//! ## Routes
//!
//! ```text
//! GET    /api/v2/scenes/{id}            SCENES   read
//! POST   /api/v2/scenes                 SCENES   write under a fresh id
//! GET    /api/v2/rooms/{id}             ROOMS    read
//! PUT    /api/v2/rooms/{id}             ROOMS    write
//! GET    /api/v2/files/{id}             FILES    read
//! PUT    /api/v2/files/{id}             FILES    write
//! PATCH  /api/v2/files/{id}/timestamp   FILES    touch
//! GET    /api/v2/health                 SETTINGS heartbeat write
//! ```

pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::storage::NamespacedStore;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<NamespacedStore>,
}

impl AppState {
    pub fn new(store: Arc<NamespacedStore>) -> Self {
        Self { store }
    }
}

/// Builds the application router.
pub fn router(state: AppState, max_payload_bytes: usize) -> Router {
    let api = Router::new()
        .route("/scenes", post(handlers::create_scene))
        .route("/scenes/{id}", get(handlers::get_scene))
        .route("/rooms/{id}", get(handlers::get_room).put(handlers::put_room))
        .route("/files/{id}", get(handlers::get_file).put(handlers::put_file))
        .route("/files/{id}/timestamp", patch(handlers::touch_file))
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v2", api)
        .layer(DefaultBodyLimit::max(max_payload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `app` on `listener` until Ctrl+C or SIGTERM.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}
