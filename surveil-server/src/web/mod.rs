//! Web server: axum REST API and event streams over the engine.

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::engine::Engine;

pub mod routes;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub engine: Arc<Engine>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Ingest
        .route("/api/v1/bursts", post(routes::api_ingest_burst))
        // Aircraft
        .route("/api/aircraft", get(routes::api_aircraft))
        .route("/api/aircraft/stream", get(routes::api_aircraft_stream))
        // Conflicts
        .route("/api/conflicts", get(routes::api_conflicts))
        .route("/api/conflicts/history", get(routes::api_conflict_history))
        .route("/api/conflicts/stats", get(routes::api_conflict_stats))
        .route("/api/conflicts/stream", get(routes::api_conflict_stream))
        .route("/api/conflicts/:id", get(routes::api_conflict_detail))
        .route("/api/conflicts/:id/status", post(routes::api_conflict_status))
        .with_state(state)
        .layer(cors)
}

/// Serve the API on `addr` until `shutdown` completes. In-flight requests
/// are allowed to finish.
pub async fn serve<F>(engine: Arc<Engine>, addr: &str, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(Arc::new(AppState { engine }));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "surveillance server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
