//! `GET /stream.mp3` handler: joins a new session to the Broadcast Engine
//! and turns its receiver into a chunked HTTP response body.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap},
    response::Response,
};
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::api::AppState;
use crate::error::{AppError, BroadcastError};
use crate::protocol_constants::{ICY_METAINT, SERVER_HEADER, STREAM_EXPIRES_HEADER};

/// `id` is accepted but unused beyond logging: this crate runs exactly one
/// Broadcast Engine per `AppState`, matching the single shared-broadcast
/// model described in the component design. A multi-stream embedder would
/// key `AppState` by `id` instead.
pub(super) async fn stream_audio(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    state
        .broadcast_engine
        .ensure_ready()
        .map_err(AppError::Broadcast)?;

    log::info!("new listener connection for stream '{id}'");

    let wants_icy = headers
        .get("icy-metadata")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "1")
        .unwrap_or(false);

    let (_session, receiver) = state.broadcast_engine.join_session(wants_icy);
    let body_stream = ReceiverStream::new(receiver).map(Ok::<_, Infallible>);

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .header(header::SERVER, SERVER_HEADER)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, STREAM_EXPIRES_HEADER)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        )
        .header("icy-name", state.config.broadcast.library_name.clone());

    if wants_icy {
        builder = builder.header("icy-metaint", ICY_METAINT.to_string());
    }

    builder
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Broadcast(BroadcastError::Encoder(e.to_string())))
}
