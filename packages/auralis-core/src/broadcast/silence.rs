//! Silence keepalive: feeds encoded silence to the engine whenever the
//! player is paused or stopped, so connected clients never see the stream
//! go quiet and disconnect on a read timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;

use super::{MediaQuality, PcmFrame};
use crate::protocol_constants::SILENCE_TICK_MS;

/// Emits a zeroed [`PcmFrame`] at `quality` once per tick on its own
/// interval, into the same ingest channel the producer uses. The engine's
/// consumer loop decides whether to actually encode these frames (only
/// while the player reports paused); the ticker itself is unconditional.
pub struct SilenceTicker {
    quality: MediaQuality,
    tick: Duration,
}

impl SilenceTicker {
    pub fn new(quality: MediaQuality) -> Self {
        Self {
            quality,
            tick: Duration::from_millis(SILENCE_TICK_MS),
        }
    }

    pub fn with_tick_ms(quality: MediaQuality, tick_ms: u64) -> Self {
        Self {
            quality,
            tick: Duration::from_millis(tick_ms),
        }
    }

    /// Runs the ticker loop until `sender` is closed, sending one silent
    /// frame's worth of zeroed PCM per tick. One tick's worth of samples is
    /// derived from the tick duration and the configured sample rate, so a
    /// 1-second tick at 44100 Hz / 16-bit / stereo produces exactly one
    /// second of decodable silence.
    pub async fn run(self, sender: mpsc::Sender<PcmFrame>) {
        let mut ticker = interval(self.tick);
        let samples_per_tick =
            (self.quality.sample_rate_hz as u64 * self.tick.as_millis() as u64 / 1000) as usize;
        let frame_bytes = samples_per_tick * self.quality.bytes_per_frame();
        let silence = bytes::Bytes::from(vec![0u8; frame_bytes]);

        loop {
            ticker.tick().await;
            let frame = PcmFrame::silence(self.quality, silence.clone());
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    }
}
