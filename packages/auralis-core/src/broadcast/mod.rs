//! MP3 broadcast engine: transcoding, ICY metadata, session fan-out.
//!
//! The module tree mirrors the component design: [`transcoder`] wraps the
//! MP3 encoder, [`icy`] formats and injects Shoutcast metadata, [`session`]
//! holds the registry of connected clients, [`silence`] drives the 1-second
//! keepalive timer, and [`engine`] ties all four together into the single
//! producer/many-consumer `BroadcastEngine`.

pub mod engine;
pub mod icy;
pub mod session;
pub mod silence;
pub mod transcoder;

pub use engine::{BroadcastEngine, EngineState};
pub use icy::{IcyFormatter, IcyMetadataInjector};
pub use session::{SessionRegistry, StreamingSession};
pub use silence::SilenceTicker;
pub use transcoder::{EncoderContext, Mp3Transcoder, Transcoder};

use std::sync::atomic::{AtomicBool, AtomicU64};

use bytes::Bytes;
use parking_lot::RwLock;

/// The triple describing a PCM stream's format. Immutable per frame; two
/// qualities are equal iff all three fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaQuality {
    pub sample_rate_hz: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl MediaQuality {
    pub const fn new(sample_rate_hz: u32, bits_per_sample: u16, channels: u16) -> Self {
        Self {
            sample_rate_hz,
            bits_per_sample,
            channels,
        }
    }

    /// Returns whether `bits_per_sample` is one of the three values the
    /// Transcoder accepts as input (16, 24, 32).
    pub fn is_supported_depth(&self) -> bool {
        matches!(self.bits_per_sample, 16 | 24 | 32)
    }

    /// Bytes occupied by one sample frame (one sample per channel).
    pub fn bytes_per_frame(&self) -> usize {
        (self.bits_per_sample as usize / 8) * self.channels as usize
    }
}

/// An opaque block of PCM bytes at a declared [`MediaQuality`].
///
/// Length in bytes must equal `samples * channels * bits_per_sample / 8`
/// under `quality`; this is a caller invariant, not enforced here, mirroring
/// the "opaque byte block" framing of the source component.
#[derive(Debug, Clone)]
pub struct PcmFrame {
    pub quality: MediaQuality,
    pub bytes: Bytes,
    /// Set for frames produced by the [`silence`](super::silence) ticker
    /// rather than real player output. The engine only encodes these while
    /// the player reports [`PlayState::Paused`]; a `Playing` snapshot means
    /// real audio is expected and the ticker's tick is dropped instead.
    pub is_silence: bool,
}

impl PcmFrame {
    pub fn new(quality: MediaQuality, bytes: Bytes) -> Self {
        Self {
            quality,
            bytes,
            is_silence: false,
        }
    }

    /// Builds a silence-ticker-originated frame.
    pub fn silence(quality: MediaQuality, bytes: Bytes) -> Self {
        Self {
            quality,
            bytes,
            is_silence: true,
        }
    }

    /// Number of samples per channel carried by this frame, derived from
    /// its byte length and declared quality.
    pub fn samples(&self) -> usize {
        let per_frame = self.quality.bytes_per_frame();
        if per_frame == 0 {
            0
        } else {
            self.bytes.len() / per_frame
        }
    }
}

/// Playback state as observed by the Broadcast Engine from the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
    Stopped,
}

/// Last observed `(current_track_id, play_state)`, mutated only by the
/// Broadcast Engine's consumer-side event loop and re-fetched whenever the
/// player signals "something changed".
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub current_track_id: Option<u64>,
    pub play_state: PlayState,
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            current_track_id: None,
            play_state: PlayState::Stopped,
            title: None,
            artist: None,
        }
    }
}

/// Read-side handle to the player, matching the collaborator interface in
/// the external-interfaces section: `get_status(&snapshot)`.
pub trait PlayerHandle: Send + Sync {
    /// Fetches the current player snapshot.
    fn get_status(&self) -> PlayerSnapshot;
}

/// A player handle backed by a plain in-memory snapshot, swappable by
/// whatever owns actual playback. Sufficient for the demonstration binary
/// and for tests; a real media player would implement [`PlayerHandle`]
/// directly against its own state.
#[derive(Default)]
pub struct SharedPlayerSnapshot {
    inner: RwLock<PlayerSnapshot>,
    /// Set whenever the player posts a state/track change; cleared by the
    /// consumer loop after it refreshes its cached snapshot and ICY title.
    changed: AtomicBool,
    /// Monotonic generation counter, bumped alongside `changed`. Exists so
    /// tests can assert an update was observed without racing on the flag.
    generation: AtomicU64,
}

impl SharedPlayerSnapshot {
    pub fn new(initial: PlayerSnapshot) -> Self {
        Self {
            inner: RwLock::new(initial),
            changed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Publishes a new snapshot and marks the player-changed flag.
    pub fn publish(&self, snapshot: PlayerSnapshot) {
        use std::sync::atomic::Ordering;
        *self.inner.write() = snapshot;
        self.changed.store(true, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Clears and returns whether the player-changed flag was set.
    pub fn take_changed(&self) -> bool {
        use std::sync::atomic::Ordering;
        self.changed.swap(false, Ordering::AcqRel)
    }
}

impl PlayerHandle for SharedPlayerSnapshot {
    fn get_status(&self) -> PlayerSnapshot {
        self.inner.read().clone()
    }
}
