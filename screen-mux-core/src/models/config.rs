use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::media::{SampleFormat, TrackKind};

/// Video codec and color space of the video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    H264Srgb,
    HevcDisplayP3,
}

/// Audio encoding requested for an audio track.
///
/// `LinearPcm` is interleaved signed 16-bit little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    Aac,
    LinearPcm,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioTrackSettings {
    pub encoding: AudioEncoding,
    pub sample_rate: f64,
    pub channels: u16,
}

impl AudioTrackSettings {
    /// Whether a payload at `sample_rate` with `channels` is what this track stores.
    pub fn matches(&self, sample_rate: f64, channels: u16) -> bool {
        self.sample_rate == sample_rate && self.channels == channels
    }
}

impl Default for AudioTrackSettings {
    fn default() -> Self {
        Self {
            encoding: AudioEncoding::LinearPcm,
            sample_rate: 44100.0,
            channels: 2,
        }
    }
}

/// Output settings for one container track.
///
/// Serialized into the container header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "media", rename_all = "lowercase")]
pub enum TrackSettings {
    Video {
        codec: VideoCodec,
        width: u32,
        height: u32,
        frame_rate: u32,
        /// Samples the track may hold before it reports not-ready.
        queue_depth: usize,
    },
    Audio {
        #[serde(flatten)]
        audio: AudioTrackSettings,
        queue_depth: usize,
    },
}

impl TrackSettings {
    pub fn queue_depth(&self) -> usize {
        match self {
            Self::Video { queue_depth, .. } | Self::Audio { queue_depth, .. } => *queue_depth,
        }
    }

    /// Whether a sample of `format` may be stored in this track as is.
    pub fn accepts(&self, format: &SampleFormat) -> bool {
        match (self, format) {
            (Self::Video { .. }, SampleFormat::Video { .. }) => true,
            (Self::Audio { audio, .. }, SampleFormat::Audio { sample_rate, channels }) => {
                audio.matches(*sample_rate, *channels)
            }
            _ => false,
        }
    }
}

/// Fixed product configuration of a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingConfiguration {
    /// Captured width in pixels (display points × scale factor).
    pub width: u32,

    /// Captured height in pixels.
    pub height: u32,

    /// Physical pixels per logical point (2 on retina displays).
    pub display_scale_factor: u32,

    pub video_codec: VideoCodec,

    pub frame_rate: u32,

    /// Depth of the screen frame queue, and of the video track.
    pub queue_depth: usize,

    pub shows_cursor: bool,

    pub excludes_current_process_audio: bool,

    /// Output settings shared by the system-audio and microphone tracks.
    pub audio: AudioTrackSettings,

    pub audio_queue_depth: usize,

    /// Directory where recording files are written.
    pub output_directory: PathBuf,
}

impl RecordingConfiguration {
    /// Configuration for a display of `points_width` × `points_height` logical points.
    pub fn for_display(points_width: u32, points_height: u32) -> Self {
        let defaults = Self::default();
        Self {
            width: points_width * defaults.display_scale_factor,
            height: points_height * defaults.display_scale_factor,
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("invalid capture size: {}x{}", self.width, self.height));
        }
        if self.frame_rate == 0 {
            return Err("frame rate must be positive".into());
        }
        if self.queue_depth == 0 || self.audio_queue_depth == 0 {
            return Err("queue depth must be positive".into());
        }
        if !(self.audio.sample_rate.is_finite() && self.audio.sample_rate > 0.0) {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.audio.channels) {
            return Err(format!("unsupported channel count: {}", self.audio.channels));
        }
        Ok(())
    }

    /// Output settings for the track of `kind`.
    pub fn track_settings(&self, kind: TrackKind) -> TrackSettings {
        match kind {
            TrackKind::Video => TrackSettings::Video {
                codec: self.video_codec,
                width: self.width,
                height: self.height,
                frame_rate: self.frame_rate,
                queue_depth: self.queue_depth,
            },
            TrackKind::SystemAudio | TrackKind::MicrophoneAudio => TrackSettings::Audio {
                audio: self.audio,
                queue_depth: self.audio_queue_depth,
            },
        }
    }
}

impl Default for RecordingConfiguration {
    fn default() -> Self {
        Self {
            width: 1512 * 2,
            height: 982 * 2,
            display_scale_factor: 2,
            video_codec: VideoCodec::HevcDisplayP3,
            frame_rate: 60,
            queue_depth: 5,
            shows_cursor: false,
            excludes_current_process_audio: true,
            audio: AudioTrackSettings::default(),
            audio_queue_depth: 32,
            output_directory: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(RecordingConfiguration::default().validate().is_ok());
    }

    #[test]
    fn for_display_applies_scale_factor() {
        let config = RecordingConfiguration::for_display(1440, 900);
        assert_eq!(config.width, 2880);
        assert_eq!(config.height, 1800);
    }

    #[test]
    fn rejects_zero_size() {
        let config = RecordingConfiguration {
            width: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn audio_tracks_share_settings() {
        let config = RecordingConfiguration::default();
        assert_eq!(
            config.track_settings(TrackKind::SystemAudio),
            config.track_settings(TrackKind::MicrophoneAudio)
        );
        assert_eq!(config.track_settings(TrackKind::Video).queue_depth(), 5);
    }

    #[test]
    fn track_settings_serialize_with_media_tag() {
        let json = serde_json::to_string(&RecordingConfiguration::default().track_settings(TrackKind::SystemAudio)).unwrap();
        assert!(json.contains("\"media\":\"audio\""));
        assert!(json.contains("\"sample_rate\":44100.0"));
        assert!(json.contains("\"encoding\":\"linear_pcm\""));
    }

    #[test]
    fn audio_track_accepts_only_its_own_format() {
        let settings = RecordingConfiguration::default().track_settings(TrackKind::MicrophoneAudio);
        assert!(settings.accepts(&SampleFormat::Audio {
            sample_rate: 44100.0,
            channels: 2
        }));
        assert!(!settings.accepts(&SampleFormat::Audio {
            sample_rate: 48000.0,
            channels: 1
        }));
        assert!(!settings.accepts(&SampleFormat::Video { width: 4, height: 4 }));
    }
}
