//! Standalone server binary hosting the Auralis MP3 broadcast engine and
//! library coordinator behind a small HTTP demonstration transport.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use auralis_core::{bootstrap_services, start_server, AppState};
use config::ServerConfig;

/// Command-line arguments, each overridable via its matching environment
/// variable so the binary runs unconfigured in a container just as well as
/// from a shell.
#[derive(Parser, Debug)]
#[command(name = "auralis-server", about = "Auralis MP3 broadcast server")]
struct Args {
    /// Path to a YAML configuration file.
    #[arg(long, env = "AURALIS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "AURALIS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Port to bind the HTTP server to. Overrides the config file.
    #[arg(long, env = "AURALIS_BIND_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let mut server_config = ServerConfig::load(args.config.as_deref())
        .context("failed to load server configuration")?;
    if let Some(port) = args.port {
        server_config.bind_port = port;
    }

    let config = server_config
        .to_core_config()
        .context("invalid server configuration")?;

    log::info!("bootstrapping auralis services");
    let services = bootstrap_services(&config).context("failed to bootstrap services")?;
    services.library_coordinator.init_scan().await;

    let app_state = AppState::builder()
        .from_services(&services)
        .config(std::sync::Arc::new(config))
        .build();

    let server_task = tokio::spawn(async move {
        if let Err(err) = start_server(app_state).await {
            log::error!("server task exited with error: {err}");
        }
    });

    shutdown_signal().await;
    log::info!("shutdown signal received");

    services.shutdown().await;
    server_task.abort();

    Ok(())
}

/// Waits for either Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
