//! Centralized error types for the Auralis core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Errors produced by the Transcoder and Broadcast Engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// The Transcoder could not build an encoder for the declared input quality.
    #[error("unsupported media quality: {0}")]
    Unsupported(String),

    /// The MP3 encoder reported a failure mid-stream.
    #[error("encoder error: {0}")]
    Encoder(String),

    /// The requested stream id has no active engine behind it.
    #[error("no broadcast engine for stream: {0}")]
    StreamNotFound(String),
}

impl ErrorCode for BroadcastError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unsupported(_) => "unsupported_media_quality",
            Self::Encoder(_) => "encoder_error",
            Self::StreamNotFound(_) => "stream_not_found",
        }
    }
}

impl BroadcastError {
    /// Maps the error to an appropriate HTTP status code per the external
    /// interface contract: encoder-unavailable is 404, everything else that
    /// reaches the HTTP layer after acceptance is 503.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unsupported(_) | Self::StreamNotFound(_) => StatusCode::NOT_FOUND,
            Self::Encoder(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Disposition returned by a `LibrarySource` scan or mutation method.
///
/// Mirrors the three-way result a library source reports: success, a
/// generic failure, or "this source does not own the path" (used by
/// mutation commands to fall through to the next source in order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceResult {
    Ok,
    Error,
    PathInvalid,
}

/// Errors produced by the Library Coordinator and Command Queue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LibraryError {
    /// A mutation or scan was requested while a scan was already in progress.
    #[error("a library scan is already in progress")]
    ScanInProgress,

    /// Every registered source rejected a mutation command (none returned OK,
    /// and the terminal non-OK result was not the distinguished "path invalid").
    #[error("no library source accepted the command: {0}")]
    NoSourceAccepted(String),

    /// A registered `LibrarySource` is missing a mandatory scan method.
    #[error("library source '{0}' is missing mandatory method '{1}'")]
    IncompleteSource(String, &'static str),

    /// The command queue's dispatcher task has shut down.
    #[error("command queue dispatcher is no longer running")]
    DispatcherGone,
}

impl ErrorCode for LibraryError {
    fn code(&self) -> &'static str {
        match self {
            Self::ScanInProgress => "scan_in_progress",
            Self::NoSourceAccepted(_) => "no_source_accepted",
            Self::IncompleteSource(_, _) => "incomplete_source",
            Self::DispatcherGone => "dispatcher_gone",
        }
    }
}

impl LibraryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ScanInProgress => StatusCode::CONFLICT,
            Self::NoSourceAccepted(_) => StatusCode::BAD_REQUEST,
            Self::IncompleteSource(_, _) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DispatcherGone => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application-wide error type for the Auralis server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Broadcast engine / transcoder failure.
    #[error("broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),

    /// Library coordinator failure.
    #[error("library error: {0}")]
    Library(#[from] LibraryError),

    /// Client sent an invalid or malformed request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Broadcast(e) => e.code(),
            Self::Library(e) => e.code(),
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Broadcast(e) => e.status_code(),
            Self::Library(e) => e.status_code(),
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type AppResult<T> = Result<T, AppError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_quality_returns_not_found() {
        let err = AppError::Broadcast(BroadcastError::Unsupported("96kHz".into()));
        assert_eq!(err.code(), "unsupported_media_quality");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn encoder_error_returns_service_unavailable() {
        let err = AppError::Broadcast(BroadcastError::Encoder("lame init failed".into()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn scan_in_progress_returns_conflict() {
        let err = AppError::Library(LibraryError::ScanInProgress);
        assert_eq!(err.code(), "scan_in_progress");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
