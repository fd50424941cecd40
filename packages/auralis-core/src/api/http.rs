//! Router construction.

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::stream::stream_audio;
use super::AppState;

/// Builds the axum router: `GET /stream.mp3` plus a liveness probe.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/stream.mp3", get(stream_audio))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
