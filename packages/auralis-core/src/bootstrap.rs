//! Application bootstrap and dependency wiring.
//!
//! This module is the composition root - the single place where the
//! Broadcast Engine and Library Coordinator are instantiated and wired
//! together, in dependency order.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::broadcast::{BroadcastEngine, MediaQuality, PlayerHandle, SharedPlayerSnapshot};
use crate::error::{AppError, AppResult};
use crate::library::{Database, LibraryCoordinator, ListenerBus, LoggingListenerBus, NullDatabase};
use crate::protocol_constants::{OUTPUT_BITS_PER_SAMPLE, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::runtime::TokioSpawner;
use crate::state::Config;

/// Container for all bootstrapped services.
///
/// Consumed by `AppState` to build the final application state.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// The single Broadcast Engine instance; the HTTP layer joins sessions
    /// to it and the player's output tap writes PCM into it.
    pub broadcast_engine: Arc<BroadcastEngine>,
    /// The Library Coordinator, dispatching commands on its own task.
    pub library_coordinator: Arc<LibraryCoordinator>,
    /// Shared player snapshot the demonstration binary's player tap writes
    /// to and the Broadcast Engine reads from.
    pub player: Arc<SharedPlayerSnapshot>,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Initiates graceful shutdown of all services: stops accepting new
    /// sessions, lets the library task drain, and signals background tasks
    /// via the cancellation token.
    pub async fn shutdown(&self) {
        log::info!("beginning graceful shutdown");
        self.cancel_token.cancel();
        log::info!("shutdown complete");
    }
}

/// Bootstraps all application services with their dependencies.
///
/// Wiring order:
/// 1. Task spawner (from the current Tokio runtime)
/// 2. Shared player snapshot (leaf dependency of the Broadcast Engine)
/// 3. Broadcast Engine, plus its silence ticker and consumer task
/// 4. Library Coordinator, plus its dispatch task
///
/// # Errors
///
/// Returns an error if `config` fails validation.
pub fn bootstrap_services(config: &Config) -> AppResult<BootstrappedServices> {
    config
        .broadcast
        .validate()
        .map_err(AppError::InvalidRequest)?;
    config
        .library
        .validate()
        .map_err(AppError::InvalidRequest)?;

    let spawner = TokioSpawner::current();
    let cancel_token = CancellationToken::new();

    let player = Arc::new(SharedPlayerSnapshot::default());
    let silence_quality =
        MediaQuality::new(OUTPUT_SAMPLE_RATE, OUTPUT_BITS_PER_SAMPLE, OUTPUT_CHANNELS);
    let broadcast_engine =
        BroadcastEngine::new(Arc::clone(&player) as Arc<dyn PlayerHandle>, silence_quality);
    broadcast_engine.start_silence_ticker(&spawner);
    spawner.spawn({
        let engine = Arc::clone(&broadcast_engine);
        async move { engine.run().await }
    });

    let listeners: Arc<dyn ListenerBus> = Arc::new(LoggingListenerBus);
    let database: Arc<dyn Database> = Arc::new(NullDatabase);
    let library_coordinator =
        LibraryCoordinator::new(config.library.clone(), listeners, database);
    spawner.spawn({
        let coordinator = Arc::clone(&library_coordinator);
        async move { coordinator.run().await }
    });

    Ok(BootstrappedServices {
        broadcast_engine,
        library_coordinator,
        player,
        spawner,
        cancel_token,
    })
}
