//! PCM-to-MP3 transcoding via `mp3lame-encoder`.
//!
//! One [`EncoderContext`] is created per distinct [`MediaQuality`] a
//! producer announces and is torn down when that producer disconnects.
//! Input depths other than 16-bit are downsampled in depth (never in rate)
//! before handing samples to LAME, since its interleaved API only accepts
//! `i16`.

use log::error;
use mp3lame_encoder::{Bitrate, Builder, Encoder, FlushNoGap, InterleavedPcm, Quality};

use crate::error::BroadcastError;
use crate::protocol_constants::{OUTPUT_BITRATE_KBPS, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};

use super::MediaQuality;

/// Converts PCM byte blocks at a declared quality into MP3 frames.
///
/// Implementations are not required to be thread-safe; the Broadcast Engine
/// owns exactly one transcoder per input quality and drives it from a single
/// consumer task.
pub trait Transcoder: Send {
    /// Encodes one block of interleaved PCM bytes, appending MP3 output to
    /// an internal buffer and returning the bytes produced (may be empty if
    /// LAME is still buffering input).
    fn encode(&mut self, pcm_bytes: &[u8]) -> Result<Vec<u8>, BroadcastError>;

    /// Flushes any buffered input, producing the final MP3 bytes. Called
    /// once when the producer quality changes or the engine shuts down.
    fn flush(&mut self) -> Result<Vec<u8>, BroadcastError>;
}

/// Per-quality encoder state: the LAME encoder plus the input quality it
/// was built for, so the engine can detect a quality change and rebuild.
pub struct EncoderContext {
    pub quality: MediaQuality,
    transcoder: Mp3Transcoder,
}

impl EncoderContext {
    pub fn new(quality: MediaQuality) -> Result<Self, BroadcastError> {
        Ok(Self {
            quality,
            transcoder: Mp3Transcoder::new(quality)?,
        })
    }

    pub fn encode(&mut self, pcm_bytes: &[u8]) -> Result<Vec<u8>, BroadcastError> {
        self.transcoder.encode(pcm_bytes)
    }

    pub fn flush(&mut self) -> Result<Vec<u8>, BroadcastError> {
        self.transcoder.flush()
    }
}

/// LAME-backed MP3 encoder fixed at the protocol output quality
/// (44100 Hz / 16-bit / 2 ch / 192 kbps), accepting PCM at any supported
/// input depth.
pub struct Mp3Transcoder {
    encoder: Encoder,
    input_quality: MediaQuality,
    /// Scratch buffer reused across calls to avoid per-frame allocation.
    sample_scratch: Vec<i16>,
}

impl Mp3Transcoder {
    pub fn new(input_quality: MediaQuality) -> Result<Self, BroadcastError> {
        if !input_quality.is_supported_depth() {
            return Err(BroadcastError::Unsupported(format!(
                "{}-bit input is not supported",
                input_quality.bits_per_sample
            )));
        }

        let mut builder = Builder::new()
            .ok_or_else(|| BroadcastError::Encoder("failed to create LAME builder".into()))?;
        builder
            .set_num_channels(OUTPUT_CHANNELS as u8)
            .map_err(|e| BroadcastError::Encoder(format!("set_num_channels: {e:?}")))?;
        builder
            .set_sample_rate(OUTPUT_SAMPLE_RATE)
            .map_err(|e| BroadcastError::Encoder(format!("set_sample_rate: {e:?}")))?;
        builder
            .set_brate(bitrate_for_kbps(OUTPUT_BITRATE_KBPS))
            .map_err(|e| BroadcastError::Encoder(format!("set_brate: {e:?}")))?;
        builder
            .set_quality(Quality::Best)
            .map_err(|e| BroadcastError::Encoder(format!("set_quality: {e:?}")))?;
        let encoder = builder
            .build()
            .map_err(|e| BroadcastError::Encoder(format!("build: {e:?}")))?;

        Ok(Self {
            encoder,
            input_quality,
            sample_scratch: Vec::new(),
        })
    }

    /// Converts raw input bytes (at `self.input_quality`'s depth) into a
    /// slice of `i16` interleaved samples, downsampling depth as needed.
    fn fill_i16_scratch(&mut self, pcm_bytes: &[u8]) {
        self.sample_scratch.clear();
        match self.input_quality.bits_per_sample {
            16 => {
                self.sample_scratch
                    .extend(pcm_bytes.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])));
            }
            24 => {
                self.sample_scratch.extend(pcm_bytes.chunks_exact(3).map(|c| {
                    let sample24 = i32::from_le_bytes([c[0], c[1], c[2], 0]) << 8 >> 8;
                    (sample24 >> 8) as i16
                }));
            }
            32 => {
                self.sample_scratch.extend(
                    pcm_bytes
                        .chunks_exact(4)
                        .map(|c| (i32::from_le_bytes([c[0], c[1], c[2], c[3]]) >> 16) as i16),
                );
            }
            other => {
                error!("unreachable input depth {other} reached transcoder scratch fill");
            }
        }
    }
}

impl Transcoder for Mp3Transcoder {
    fn encode(&mut self, pcm_bytes: &[u8]) -> Result<Vec<u8>, BroadcastError> {
        self.fill_i16_scratch(pcm_bytes);
        let input = InterleavedPcm(&self.sample_scratch);
        let max_out = mp3lame_encoder::max_required_buffer_size(self.sample_scratch.len());
        let mut out = Vec::with_capacity(max_out);
        self.encoder
            .encode_to_vec(input, &mut out)
            .map_err(|e| BroadcastError::Encoder(format!("encode: {e:?}")))?;
        Ok(out)
    }

    fn flush(&mut self) -> Result<Vec<u8>, BroadcastError> {
        let max_out = mp3lame_encoder::max_required_buffer_size(0).max(7200);
        let mut out = Vec::with_capacity(max_out);
        self.encoder
            .flush_to_vec::<FlushNoGap>(&mut out)
            .map_err(|e| BroadcastError::Encoder(format!("flush: {e:?}")))?;
        Ok(out)
    }
}

fn bitrate_for_kbps(kbps: u32) -> Bitrate {
    match kbps {
        96 => Bitrate::Kbps96,
        128 => Bitrate::Kbps128,
        160 => Bitrate::Kbps160,
        192 => Bitrate::Kbps192,
        256 => Bitrate::Kbps256,
        320 => Bitrate::Kbps320,
        _ => Bitrate::Kbps192,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_input_depth() {
        let quality = MediaQuality::new(44100, 8, 2);
        let result = Mp3Transcoder::new(quality);
        assert!(result.is_err());
    }

    #[test]
    fn encodes_silence_without_error() {
        let quality = MediaQuality::new(44100, 16, 2);
        let mut transcoder = Mp3Transcoder::new(quality).expect("encoder builds");
        let silent_frame = vec![0u8; 4 * 1152]; // 1152 stereo 16-bit frames
        let encoded = transcoder.encode(&silent_frame).expect("encode succeeds");
        // LAME buffers internally; early calls may yield zero bytes, which is fine.
        let _ = encoded;
        let flushed = transcoder.flush().expect("flush succeeds");
        let _ = flushed;
    }

    #[test]
    fn accepts_24_and_32_bit_input() {
        for depth in [24u16, 32u16] {
            let quality = MediaQuality::new(44100, depth, 2);
            let mut transcoder = Mp3Transcoder::new(quality).expect("encoder builds");
            let bytes_per_frame = (depth as usize / 8) * 2;
            let frame = vec![0u8; bytes_per_frame * 1152];
            transcoder.encode(&frame).expect("encode succeeds");
        }
    }
}
