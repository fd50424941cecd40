//! Auralis Core - MP3 broadcast engine and library coordinator.
//!
//! This crate streams a home media server's currently playing audio as a
//! single shared MP3/ICY broadcast to any number of HTTP listeners, and
//! runs a dedicated library coordinator that sequences scans and mutation
//! commands against a pluggable set of library sources.
//!
//! # Architecture
//!
//! - [`broadcast`]: Transcoder, ICY formatting, session registry, silence
//!   ticker, and the Broadcast Engine that ties them together
//! - [`library`]: Library sources, the Command Queue, the Update Debouncer,
//!   and the Library Coordinator
//! - [`api`]: Demonstration HTTP transport (`GET /stream.mp3`)
//! - [`bootstrap`]: Wires the above into a runnable set of services
//! - [`state`]: Typed, validated configuration
//! - [`error`]: Centralized error types
//! - [`runtime`]: Task spawning abstraction for runtime independence

#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod broadcast;
pub mod error;
pub mod library;
pub mod protocol_constants;
pub mod runtime;
pub mod state;
pub mod utils;

pub use bootstrap::{bootstrap_services, BootstrappedServices};
pub use broadcast::{
    BroadcastEngine, EngineState, MediaQuality, PcmFrame, PlayState, PlayerHandle,
    PlayerSnapshot, SharedPlayerSnapshot,
};
pub use error::{AppError, AppResult, BroadcastError, ErrorCode, LibraryError, SourceResult};
pub use library::{
    Command, CommandOutcome, CommandQueue, Database, EventMask, LibraryCoordinator,
    LibrarySource, ListenerBus,
};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use state::{BroadcastConfig, Config, LibraryConfig};
pub use utils::now_millis;

pub use api::{start_server, AppState, AppStateBuilder, ServerError};
