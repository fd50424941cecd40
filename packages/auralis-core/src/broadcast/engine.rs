//! The Broadcast Engine: single producer, single consumer task, many
//! fan-out sessions.
//!
//! A producer (typically the media player's output tap) calls
//! [`BroadcastEngine::write`] with PCM frames; the consumer loop owned by
//! [`BroadcastEngine::run`] pulls them off a bounded channel, re-encodes
//! through the current [`EncoderContext`] (rebuilding it if the declared
//! quality changes), and fans the resulting MP3 bytes out to every
//! registered [`StreamingSession`]. A [`SilenceTicker`] feeds the same
//! channel unconditionally; the consumer only actually encodes and fans out
//! a tick while the player reports paused, so a real `Playing` stream is
//! never interrupted by a stray silence frame.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;

use super::session::{SessionRegistry, StreamingSession};
use super::silence::SilenceTicker;
use super::transcoder::EncoderContext;
use super::{MediaQuality, PcmFrame, PlayState, PlayerHandle};
use crate::error::BroadcastError;
use crate::protocol_constants::AUDIO_PIPE_CAPACITY;
use crate::runtime::TaskSpawner;

/// Coarse lifecycle state of one engine instance, exposed for diagnostics
/// and tests; the encode/fan-out behavior itself is driven by the player's
/// [`PlayState`], not this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Idle = 0,
    Running = 1,
    Stopped = 2,
}

impl EngineState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

/// One broadcast engine instance, one per logical stream endpoint.
///
/// `write()` is the producer-side, non-blocking entry point; `run()` is the
/// consumer-side loop, intended to be spawned once via a [`TaskSpawner`]
/// and to live for the lifetime of the stream.
pub struct BroadcastEngine {
    ingest_tx: mpsc::Sender<PcmFrame>,
    ingest_rx: parking_lot::Mutex<Option<mpsc::Receiver<PcmFrame>>>,
    sessions: Arc<SessionRegistry>,
    player: Arc<dyn PlayerHandle>,
    state: AtomicU8,
    silence_quality: MediaQuality,
    /// Sticky flag set once the transcoder fails to build an encoder for a
    /// declared quality. While set, `ensure_ready` degrades every request to
    /// 404 and existing sessions are drained; cleared the next time a
    /// quality-change event rebuilds the encoder successfully.
    not_supported: AtomicBool,
}

impl BroadcastEngine {
    pub fn new(player: Arc<dyn PlayerHandle>, silence_quality: MediaQuality) -> Arc<Self> {
        let (ingest_tx, ingest_rx) = mpsc::channel(AUDIO_PIPE_CAPACITY);
        Arc::new(Self {
            ingest_tx,
            ingest_rx: parking_lot::Mutex::new(Some(ingest_rx)),
            sessions: Arc::new(SessionRegistry::new()),
            player,
            state: AtomicU8::new(EngineState::Idle as u8),
            silence_quality,
            not_supported: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Registers a new streaming session and returns the receiver half the
    /// HTTP handler should turn into a response body stream.
    pub fn join_session(&self, wants_icy: bool) -> (Arc<StreamingSession>, mpsc::Receiver<bytes::Bytes>) {
        let (session, receiver) = StreamingSession::new(wants_icy);
        self.sessions.join(session.clone());
        (session, receiver)
    }

    /// Producer-side write: non-blocking, matches a pipe write under
    /// O_NONBLOCK. A full channel means the consumer can't keep up and the
    /// frame is dropped with a warning (EAGAIN equivalent); a closed
    /// channel means the engine has shut down and the write is silently
    /// ignored (EBADF equivalent).
    pub fn write(&self, frame: PcmFrame) {
        match self.ingest_tx.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("broadcast engine ingest pipe full, dropping frame");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Starts the silence ticker as a background task via `spawner`,
    /// feeding the same ingest channel this engine drains.
    pub fn start_silence_ticker(&self, spawner: &dyn TaskSpawner) {
        let ticker = SilenceTicker::new(self.silence_quality);
        let sender = self.ingest_tx.clone();
        spawner.spawn(async move {
            ticker.run(sender).await;
        });
    }

    /// Runs the consumer loop: pulls frames, re-encodes as needed, fans out
    /// to sessions, and periodically reaps closed sessions. Consumes
    /// `self`'s ingest receiver; calling this twice on the same engine
    /// panics via the `expect`, mirroring the single-dedicated-task
    /// invariant from the component design.
    pub async fn run(self: Arc<Self>) {
        let mut receiver = self
            .ingest_rx
            .lock()
            .take()
            .expect("BroadcastEngine::run called more than once");

        self.state.store(EngineState::Running as u8, Ordering::Release);

        let mut encoder: Option<EncoderContext> = None;
        let mut reap_tick = tokio::time::interval(std::time::Duration::from_secs(5));

        loop {
            tokio::select! {
                maybe_frame = receiver.recv() => {
                    let Some(frame) = maybe_frame else { break };
                    self.handle_frame(frame, &mut encoder);
                }
                _ = reap_tick.tick() => {
                    self.sessions.reap_closed();
                }
            }
        }

        self.state.store(EngineState::Stopped as u8, Ordering::Release);
    }

    fn handle_frame(&self, frame: PcmFrame, encoder: &mut Option<EncoderContext>) {
        if frame.is_silence {
            let play_state = self.player.get_status().play_state;
            if !matches!(play_state, PlayState::Paused) {
                // Real audio is expected (or the player is stopped); drop
                // this tick rather than injecting an audible glitch.
                return;
            }
        }

        let needs_rebuild = match encoder {
            Some(ctx) => ctx.quality != frame.quality,
            None => true,
        };

        if needs_rebuild {
            match EncoderContext::new(frame.quality) {
                Ok(ctx) => {
                    debug!(
                        "rebuilding encoder for quality {}Hz/{}bit/{}ch",
                        frame.quality.sample_rate_hz,
                        frame.quality.bits_per_sample,
                        frame.quality.channels
                    );
                    if let Some(mut old) = encoder.take() {
                        if let Ok(tail) = old.flush() {
                            self.fan_out(&tail);
                        }
                    }
                    *encoder = Some(ctx);
                    self.not_supported.store(false, Ordering::Release);
                }
                Err(err) => {
                    warn!("cannot build encoder for frame quality: {err}");
                    self.not_supported.store(true, Ordering::Release);
                    self.sessions.drain_all();
                    return;
                }
            }
        }

        let Some(ctx) = encoder.as_mut() else { return };
        match ctx.encode(&frame.bytes) {
            Ok(mp3_bytes) if !mp3_bytes.is_empty() => self.fan_out(&mp3_bytes),
            Ok(_) => {}
            Err(err) => warn!("encode error: {err}"),
        }
    }

    fn fan_out(&self, mp3_bytes: &[u8]) {
        if self.sessions.is_empty() {
            return;
        }
        let snapshot = self.player.get_status();
        let play_state_blocks_playback = matches!(snapshot.play_state, PlayState::Stopped);
        if play_state_blocks_playback {
            return;
        }
        self.sessions.broadcast(
            mp3_bytes,
            snapshot.title.as_deref(),
            snapshot.artist.as_deref(),
        );
    }

    /// Returns an error if the engine has stopped, or if the transcoder's
    /// sticky `not_supported` flag is set (encoder build failed and hasn't
    /// yet recovered via a successful rebuild).
    pub fn ensure_ready(&self) -> Result<(), BroadcastError> {
        if self.not_supported.load(Ordering::Acquire) {
            return Err(BroadcastError::Unsupported(
                "encoder unavailable for the current media quality".into(),
            ));
        }
        if self.state() == EngineState::Stopped {
            return Err(BroadcastError::StreamNotFound("engine stopped".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{PlayerSnapshot, SharedPlayerSnapshot};
    use crate::runtime::TokioSpawner;
    use bytes::Bytes;

    fn playing_snapshot() -> Arc<SharedPlayerSnapshot> {
        let shared = Arc::new(SharedPlayerSnapshot::new(PlayerSnapshot {
            current_track_id: Some(1),
            play_state: PlayState::Playing,
            title: Some("Song".into()),
            artist: Some("Artist".into()),
        }));
        shared
    }

    #[tokio::test]
    async fn write_then_run_fans_out_encoded_audio() {
        let player = playing_snapshot();
        let quality = MediaQuality::new(44100, 16, 2);
        let engine = BroadcastEngine::new(player, quality);

        let (_session, mut receiver) = engine.join_session(false);

        let run_handle = tokio::spawn(engine.clone().run());

        let frame = PcmFrame::new(quality, Bytes::from(vec![0u8; 4 * 1152]));
        engine.write(frame);

        let received = tokio::time::timeout(std::time::Duration::from_secs(2), receiver.recv())
            .await
            .expect("did not time out")
            .expect("frame delivered");
        assert!(!received.is_empty());

        drop(engine);
        let _ = run_handle.abort();
    }

    #[tokio::test]
    async fn stopped_player_suppresses_fan_out() {
        let player = Arc::new(SharedPlayerSnapshot::new(PlayerSnapshot {
            current_track_id: None,
            play_state: PlayState::Stopped,
            title: None,
            artist: None,
        }));
        let quality = MediaQuality::new(44100, 16, 2);
        let engine = BroadcastEngine::new(player, quality);
        let (_session, mut receiver) = engine.join_session(false);

        let run_handle = tokio::spawn(engine.clone().run());
        engine.write(PcmFrame::new(quality, Bytes::from(vec![0u8; 4 * 1152])));

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(200), receiver.recv()).await;
        assert!(result.is_err(), "no frame should be delivered while stopped");

        run_handle.abort();
    }

    #[tokio::test]
    async fn start_silence_ticker_feeds_ingest_while_paused() {
        let player = Arc::new(SharedPlayerSnapshot::new(PlayerSnapshot {
            current_track_id: Some(1),
            play_state: PlayState::Paused,
            title: Some("Song".into()),
            artist: Some("Artist".into()),
        }));
        let quality = MediaQuality::new(44100, 16, 2);
        let engine = BroadcastEngine::new(player, quality);
        let (_session, mut receiver) = engine.join_session(false);

        let spawner = TokioSpawner::current();
        engine.start_silence_ticker(&spawner);
        let run_handle = tokio::spawn(engine.clone().run());

        let received = tokio::time::timeout(std::time::Duration::from_secs(3), receiver.recv())
            .await
            .expect("did not time out")
            .expect("silence frame delivered eventually");
        assert!(!received.is_empty());

        run_handle.abort();
    }

    #[tokio::test]
    async fn silence_frame_is_dropped_while_playing() {
        let player = playing_snapshot();
        let quality = MediaQuality::new(44100, 16, 2);
        let engine = BroadcastEngine::new(player, quality);
        let (_session, mut receiver) = engine.join_session(false);

        let mut encoder = None;
        let silence = PcmFrame::silence(quality, Bytes::from(vec![0u8; 4 * 1152]));
        engine.handle_frame(silence, &mut encoder);

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(100), receiver.recv()).await;
        assert!(
            result.is_err(),
            "silence-ticker frames must not reach a Playing session"
        );
        assert!(encoder.is_none(), "no encoder should be built for a dropped silence tick");
    }

    #[tokio::test]
    async fn silence_frame_is_encoded_while_paused() {
        let player = Arc::new(SharedPlayerSnapshot::new(PlayerSnapshot {
            current_track_id: Some(1),
            play_state: PlayState::Paused,
            title: Some("Song".into()),
            artist: Some("Artist".into()),
        }));
        let quality = MediaQuality::new(44100, 16, 2);
        let engine = BroadcastEngine::new(player, quality);
        let (_session, mut receiver) = engine.join_session(false);

        let mut encoder = None;
        let silence = PcmFrame::silence(quality, Bytes::from(vec![0u8; 4 * 1152]));
        engine.handle_frame(silence, &mut encoder);

        let received = tokio::time::timeout(std::time::Duration::from_millis(500), receiver.recv())
            .await
            .expect("did not time out")
            .expect("silence frame delivered while paused");
        assert!(!received.is_empty());
        assert!(encoder.is_some());
    }

    #[tokio::test]
    async fn encoder_build_failure_sets_sticky_flag_and_drains_sessions() {
        let player = playing_snapshot();
        let quality = MediaQuality::new(44100, 16, 2);
        let engine = BroadcastEngine::new(player, quality);
        let (_session, _receiver) = engine.join_session(false);
        assert_eq!(engine.sessions().len(), 1);

        let unsupported_quality = MediaQuality::new(44100, 8, 2);
        let mut encoder = None;
        let frame = PcmFrame::new(unsupported_quality, Bytes::from(vec![0u8; 4]));
        engine.handle_frame(frame, &mut encoder);

        assert!(engine.ensure_ready().is_err());
        assert_eq!(engine.sessions().len(), 0);

        match engine.ensure_ready().unwrap_err() {
            BroadcastError::Unsupported(_) => {}
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_rebuild_clears_sticky_not_supported_flag() {
        let player = playing_snapshot();
        let quality = MediaQuality::new(44100, 16, 2);
        let engine = BroadcastEngine::new(player, quality);

        let unsupported_quality = MediaQuality::new(44100, 8, 2);
        let mut encoder = None;
        engine.handle_frame(
            PcmFrame::new(unsupported_quality, Bytes::from(vec![0u8; 4])),
            &mut encoder,
        );
        assert!(engine.ensure_ready().is_err());

        engine.handle_frame(
            PcmFrame::new(quality, Bytes::from(vec![0u8; 4 * 1152])),
            &mut encoder,
        );
        assert!(engine.ensure_ready().is_ok());
    }

    #[tokio::test]
    async fn quality_change_rebuilds_encoder_between_writes() {
        let player = playing_snapshot();
        let quality_16 = MediaQuality::new(44100, 16, 2);
        let engine = BroadcastEngine::new(player, quality_16);
        let (_session, mut receiver) = engine.join_session(false);

        let run_handle = tokio::spawn(engine.clone().run());

        engine.write(PcmFrame::new(quality_16, Bytes::from(vec![0u8; 4 * 1152])));
        let first = tokio::time::timeout(std::time::Duration::from_secs(2), receiver.recv())
            .await
            .expect("did not time out")
            .expect("16-bit frame delivered");
        assert!(!first.is_empty());

        let quality_24 = MediaQuality::new(44100, 24, 2);
        engine.write(PcmFrame::new(quality_24, Bytes::from(vec![0u8; 6 * 1152])));
        let second = tokio::time::timeout(std::time::Duration::from_secs(2), receiver.recv())
            .await
            .expect("did not time out")
            .expect("24-bit frame delivered after encoder rebuild");
        assert!(!second.is_empty());

        run_handle.abort();
    }
}
