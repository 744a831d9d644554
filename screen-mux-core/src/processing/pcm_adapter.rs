//! Converts microphone PCM blocks into track-ready samples.
//!
//! Output payload is interleaved signed 16-bit little-endian PCM at the
//! source rate. The source rate and channel count must be the ones the
//! microphone track declares; blocks in any other format are dropped. The
//! presentation timestamp is the block's host capture time; the session
//! anchor is applied later by the container.

use crate::models::audio::{ChannelLayout, PcmBlock, PcmFormat};
use crate::models::config::{AudioEncoding, AudioTrackSettings};
use crate::models::media::{MediaTime, RawSample, SampleFormat, TrackKind};

/// Channel counts above this are not representable in the audio track.
pub const MAX_CHANNELS: u16 = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct PcmSampleAdapter {
    track: AudioTrackSettings,
}

/// Validated description of a PCM source format.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FormatDescription {
    sample_rate: f64,
    channels: u16,
}

impl PcmSampleAdapter {
    /// Adapter producing samples for a track with `track` settings.
    pub fn new(track: AudioTrackSettings) -> Self {
        Self { track }
    }

    pub fn track(&self) -> &AudioTrackSettings {
        &self.track
    }

    /// Convert one block. Returns `None` if the block cannot be represented;
    /// the block is then lost.
    pub fn convert(&self, block: PcmBlock<'_>) -> Option<RawSample> {
        let description = match Self::describe(&block.format) {
            Ok(d) => d,
            Err(reason) => {
                log::warn!("Dropping microphone block: format description failed: {}", reason);
                return None;
            }
        };

        if let Err(reason) = self.check_track(&description) {
            log::warn!("Dropping microphone block: {}", reason);
            return None;
        }

        let frames = match Self::frame_count(block.samples, description.channels) {
            Ok(n) => n,
            Err(reason) => {
                log::warn!("Dropping microphone block: buffer assembly failed: {}", reason);
                return None;
            }
        };

        let duration = MediaTime::from_secs_f64(frames as f64 / description.sample_rate);
        let data = Self::convert_to_int16_pcm(block.samples);

        Some(RawSample::new(
            TrackKind::MicrophoneAudio,
            block.host_time,
            Some(duration),
            frames as u32,
            SampleFormat::Audio {
                sample_rate: description.sample_rate,
                channels: description.channels,
            },
            data,
        ))
    }

    fn describe(format: &PcmFormat) -> Result<FormatDescription, String> {
        if !(format.sample_rate.is_finite() && format.sample_rate > 0.0) {
            return Err(format!("invalid sample rate {}", format.sample_rate));
        }
        if format.channels == 0 || format.channels > MAX_CHANNELS {
            return Err(format!("unsupported channel count {}", format.channels));
        }
        if format.layout == ChannelLayout::NonInterleaved && format.channels > 1 {
            return Err("non-interleaved multi-channel layout".into());
        }
        Ok(FormatDescription {
            sample_rate: format.sample_rate,
            channels: format.channels,
        })
    }

    fn check_track(&self, description: &FormatDescription) -> Result<(), String> {
        if self.track.encoding != AudioEncoding::LinearPcm {
            return Err(format!("track expects {:?}, adapter produces linear PCM", self.track.encoding));
        }
        if !self.track.matches(description.sample_rate, description.channels) {
            return Err(format!(
                "source is {} Hz/{} ch, track expects {} Hz/{} ch",
                description.sample_rate, description.channels, self.track.sample_rate, self.track.channels
            ));
        }
        Ok(())
    }

    fn frame_count(samples: &[f32], channels: u16) -> Result<usize, String> {
        if samples.is_empty() {
            return Err("empty block".into());
        }
        let channels = channels as usize;
        if samples.len() % channels != 0 {
            return Err(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            ));
        }
        let frames = samples.len() / channels;
        if frames > u32::MAX as usize {
            return Err(format!("block of {} frames is too large", frames));
        }
        Ok(frames)
    }

    /// Convert f32 samples `[-1.0, 1.0]` to 16-bit PCM (little-endian bytes).
    ///
    /// Clamps out-of-range values. Output length = `samples.len() * 2` bytes.
    pub fn convert_to_int16_pcm(samples: &[f32]) -> Vec<u8> {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            let int16_value = (clamped * i16::MAX as f32) as i16;
            data.extend_from_slice(&int16_value.to_le_bytes());
        }
        data
    }
}
