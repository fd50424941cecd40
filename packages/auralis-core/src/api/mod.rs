//! HTTP API layer: the demonstration transport for the Broadcast Engine.
//!
//! Thin handlers only - they delegate entirely to [`crate::broadcast`] and
//! [`crate::library`]. Routing, auth, and the rest of a real server's HTTP
//! surface are explicitly out of scope; this module exists to prove the
//! Broadcast Engine's `GET /stream.mp3` contract end to end.

use std::sync::Arc;

use thiserror::Error;

use crate::broadcast::BroadcastEngine;
use crate::library::LibraryCoordinator;
use crate::state::Config;

pub mod http;
mod stream;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("no available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    /// The Broadcast Engine backing `/stream.mp3`.
    pub broadcast_engine: Arc<BroadcastEngine>,
    /// The Library Coordinator (not yet exposed over HTTP; held here so a
    /// future endpoint can reach it without re-threading dependencies).
    pub library_coordinator: Arc<LibraryCoordinator>,
    /// Application configuration.
    pub config: Arc<Config>,
}

/// Builder for constructing an `AppState`.
#[derive(Default)]
pub struct AppStateBuilder {
    broadcast_engine: Option<Arc<BroadcastEngine>>,
    library_coordinator: Option<Arc<LibraryCoordinator>>,
    config: Option<Arc<Config>>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates the service fields from a `BootstrappedServices` container.
    pub fn from_services(mut self, services: &crate::BootstrappedServices) -> Self {
        self.broadcast_engine = Some(Arc::clone(&services.broadcast_engine));
        self.library_coordinator = Some(Arc::clone(&services.library_coordinator));
        self
    }

    pub fn broadcast_engine(mut self, engine: Arc<BroadcastEngine>) -> Self {
        self.broadcast_engine = Some(engine);
        self
    }

    pub fn library_coordinator(mut self, coordinator: Arc<LibraryCoordinator>) -> Self {
        self.library_coordinator = Some(coordinator);
        self
    }

    pub fn config(mut self, config: Arc<Config>) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the `AppState`, panicking if required fields are missing.
    pub fn build(self) -> AppState {
        AppState {
            broadcast_engine: self.broadcast_engine.expect("broadcast_engine is required"),
            library_coordinator: self
                .library_coordinator
                .expect("library_coordinator is required"),
            config: self.config.expect("config is required"),
        }
    }
}

impl AppState {
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

async fn find_available_port(
    start: u16,
    end: u16,
) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    for port in start..=end {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Starts the HTTP server on the configured or auto-discovered port.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let preferred_port = state.config.preferred_port;
    let (port, listener) = if preferred_port > 0 {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], preferred_port));
        (preferred_port, tokio::net::TcpListener::bind(&addr).await?)
    } else {
        find_available_port(49400, 49410).await?
    };

    log::info!("server listening on http://0.0.0.0:{port}");
    let app = http::create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}
