//! Core application configuration types.
//!
//! Provides validated, serde-typed configuration for the broadcast engine
//! ([`BroadcastConfig`]) and the library coordinator ([`LibraryConfig`]),
//! plus the top-level [`Config`] that groups both.

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    COMMAND_QUEUE_CAPACITY, ICY_METAINT, ICY_TITLE_MAX_BYTES, SILENCE_TICK_MS,
    UPDATE_DEBOUNCE_MS,
};

/// Configuration for the MP3 broadcast engine.
///
/// Groups the tunable knobs this crate itself owns; the output media
/// quality (44100 Hz / 16-bit / 2 ch) is a protocol constant, not
/// user-configurable, and lives in `protocol_constants`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BroadcastConfig {
    /// Library display name sent as the `icy-name` header.
    pub library_name: String,

    /// ICY metadata interval in bytes. Defaults to the protocol constant;
    /// only exposed for tests that want a smaller interval.
    #[serde(default = "default_icy_metaint")]
    pub icy_metaint: usize,

    /// Maximum ICY title length in bytes before truncation.
    #[serde(default = "default_icy_title_max_bytes")]
    pub icy_title_max_bytes: usize,

    /// Silence ticker interval in milliseconds.
    #[serde(default = "default_silence_tick_ms")]
    pub silence_tick_ms: u64,

    /// Maximum number of concurrent streaming sessions. Zero means unbounded.
    #[serde(default)]
    pub max_sessions: usize,
}

fn default_icy_metaint() -> usize {
    ICY_METAINT
}

fn default_icy_title_max_bytes() -> usize {
    ICY_TITLE_MAX_BYTES
}

fn default_silence_tick_ms() -> u64 {
    SILENCE_TICK_MS
}

impl BroadcastConfig {
    /// Creates a new `BroadcastConfig` with validated values.
    ///
    /// # Errors
    ///
    /// Returns an error if any value would cause runtime issues.
    pub fn new(library_name: String, max_sessions: usize) -> Result<Self, String> {
        let config = Self {
            library_name,
            icy_metaint: default_icy_metaint(),
            icy_title_max_bytes: default_icy_title_max_bytes(),
            silence_tick_ms: default_silence_tick_ms(),
            max_sessions,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.library_name.trim().is_empty() {
            return Err("library_name must not be empty".to_string());
        }
        if self.icy_metaint == 0 {
            return Err("icy_metaint must be >= 1".to_string());
        }
        if self.silence_tick_ms == 0 {
            return Err("silence_tick_ms must be >= 1".to_string());
        }
        Ok(())
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            library_name: "Auralis".to_string(),
            icy_metaint: default_icy_metaint(),
            icy_title_max_bytes: default_icy_title_max_bytes(),
            silence_tick_ms: default_silence_tick_ms(),
            max_sessions: 0,
        }
    }
}

/// Configuration for the library coordinator.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LibraryConfig {
    /// Debounce window for coalescing database-change notifications (ms).
    #[serde(default = "default_debounce_ms")]
    pub debounce_window_ms: u64,

    /// Skip the purge-cruft step after partial scans (rescan/metarescan).
    /// Full rescans and init scans always purge regardless of this flag.
    #[serde(default)]
    pub filescan_disable: bool,

    /// Whether the play queue is cleared when playback stops.
    /// Read by collaborating player logic, not used internally by the
    /// coordinator, but carried here since §6 names it as a typed config read.
    #[serde(default)]
    pub clear_queue_on_stop_disable: bool,

    /// Capacity of the Command Queue channel.
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,
}

fn default_debounce_ms() -> u64 {
    UPDATE_DEBOUNCE_MS
}

fn default_command_queue_capacity() -> usize {
    COMMAND_QUEUE_CAPACITY
}

impl LibraryConfig {
    pub fn new(debounce_window_ms: u64) -> Result<Self, String> {
        let config = Self {
            debounce_window_ms,
            filescan_disable: false,
            clear_queue_on_stop_disable: false,
            command_queue_capacity: default_command_queue_capacity(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.debounce_window_ms == 0 {
            return Err("debounce_window_ms must be >= 1".to_string());
        }
        if self.command_queue_capacity == 0 {
            return Err(
                "command_queue_capacity must be >= 1 (mpsc::channel panics on 0)".to_string(),
            );
        }
        Ok(())
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: default_debounce_ms(),
            filescan_disable: false,
            clear_queue_on_stop_disable: false,
            command_queue_capacity: default_command_queue_capacity(),
        }
    }
}

/// Top-level configuration for the Auralis application.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Preferred port for the HTTP server (0 = auto-allocate).
    pub preferred_port: u16,

    /// Broadcast engine configuration.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Library coordinator configuration.
    #[serde(default)]
    pub library: LibraryConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_config_default_is_valid() {
        let config = BroadcastConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn broadcast_config_rejects_empty_name() {
        assert!(BroadcastConfig::new(String::new(), 0).is_err());
    }

    #[test]
    fn library_config_default_is_valid() {
        let config = LibraryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.debounce_window_ms, UPDATE_DEBOUNCE_MS);
    }

    #[test]
    fn library_config_rejects_zero_debounce() {
        assert!(LibraryConfig::new(0).is_err());
    }

    #[test]
    fn config_default_is_sensible() {
        let config = Config::default();
        assert_eq!(config.preferred_port, 0);
        assert_eq!(config.broadcast.library_name, "Auralis");
    }
}
