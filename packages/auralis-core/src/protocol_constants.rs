//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the ICY/Shoutcast protocol and by the
//! broadcast engine's own design and changing them would break client
//! compatibility or violate the invariants documented alongside each
//! component.

// ─────────────────────────────────────────────────────────────────────────────
// Output Media Quality
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed MP3 output sample rate (Hz). The Transcoder always resamples/encodes
/// to this quality regardless of the incoming PCM quality.
pub const OUTPUT_SAMPLE_RATE: u32 = 44100;

/// Fixed MP3 output channel count.
pub const OUTPUT_CHANNELS: u16 = 2;

/// Fixed MP3 output bit depth (bits per sample), pre-encode.
pub const OUTPUT_BITS_PER_SAMPLE: u16 = 16;

/// MP3 encoding bitrate (kbps).
pub const OUTPUT_BITRATE_KBPS: u32 = 192;

// ─────────────────────────────────────────────────────────────────────────────
// ICY Protocol (Shoutcast/Icecast metadata)
// ─────────────────────────────────────────────────────────────────────────────

/// ICY metadata interval (bytes between metadata blocks).
///
/// This is a protocol specification constant, not a tunable parameter.
pub const ICY_METAINT: usize = 8192;

/// Maximum ICY title length in bytes before truncation.
///
/// A single ICY length byte addresses at most 255 16-byte blocks
/// (255 * 16 = 4080 bytes of `StreamTitle='...';` payload).
pub const ICY_TITLE_MAX_BYTES: usize = 4080;

// ─────────────────────────────────────────────────────────────────────────────
// Broadcast Engine Timing
// ─────────────────────────────────────────────────────────────────────────────

/// Interval of the silence ticker while the engine is active (ms).
///
/// Fires once per second, delivering a zero-filled PCM block so paused
/// playback still produces output and clients do not time out.
pub const SILENCE_TICK_MS: u64 = 1000;

/// Capacity of the non-blocking audio pipe (PCM frames) from player to engine.
///
/// The producer side drops frames past this bound rather than blocking
/// the player thread; see `BroadcastEngine::write`.
pub const AUDIO_PIPE_CAPACITY: usize = 64;

/// Capacity of the non-blocking quality-change pipe from player to engine.
pub const QUALITY_PIPE_CAPACITY: usize = 4;

/// Capacity of the broadcast fan-out channel delivering encoded MP3 bytes
/// to each session's HTTP response stream.
pub const SESSION_CHANNEL_CAPACITY: usize = 256;

// ─────────────────────────────────────────────────────────────────────────────
// Library Coordinator Timing
// ─────────────────────────────────────────────────────────────────────────────

/// Debounce window for coalescing database-change notifications (ms).
pub const UPDATE_DEBOUNCE_MS: u64 = 5000;

/// Capacity of the Command Queue channel.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Product/version string sent in the `Server` response header.
pub const SERVER_HEADER: &str = concat!("auralis/", env!("CARGO_PKG_VERSION"));

/// Literal `Expires` header value required by long-lived streaming clients
/// that treat a past, fixed date as "never cache this".
pub const STREAM_EXPIRES_HEADER: &str = "Mon, 31 Aug 2015 06:00:00 GMT";
