//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to. 0 auto-allocates.
    /// Override: `AURALIS_BIND_PORT`
    pub bind_port: u16,

    /// Library display name sent as the `icy-name` header.
    /// Override: `AURALIS_LIBRARY_NAME`
    pub library_name: String,

    /// Maximum number of concurrent streaming sessions. 0 means unbounded.
    pub max_sessions: usize,

    /// Debounce window for coalescing database-change notifications (ms).
    pub debounce_window_ms: u64,

    /// Skip the purge-cruft step after partial scans.
    pub filescan_disable: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let defaults = auralis_core::Config::default();
        Self {
            bind_port: defaults.preferred_port,
            library_name: defaults.broadcast.library_name,
            max_sessions: defaults.broadcast.max_sessions,
            debounce_window_ms: defaults.library.debounce_window_ms,
            filescan_disable: defaults.library.filescan_disable,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AURALIS_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("AURALIS_LIBRARY_NAME") {
            self.library_name = val;
        }
    }

    /// Converts to auralis-core's `Config` type, validating the result.
    pub fn to_core_config(&self) -> Result<auralis_core::Config> {
        let broadcast = auralis_core::BroadcastConfig::new(
            self.library_name.clone(),
            self.max_sessions,
        )
        .map_err(anyhow::Error::msg)?;
        let library = auralis_core::LibraryConfig {
            debounce_window_ms: self.debounce_window_ms,
            filescan_disable: self.filescan_disable,
            ..auralis_core::LibraryConfig::default()
        };
        library.validate().map_err(anyhow::Error::msg)?;

        Ok(auralis_core::Config {
            preferred_port: self.bind_port,
            broadcast,
            library,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_converts_to_a_valid_core_config() {
        let config = ServerConfig::default();
        assert!(config.to_core_config().is_ok());
    }
}
