use std::ops::{Add, Sub};
use std::sync::OnceLock;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Which destination track a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackKind {
    Video,
    SystemAudio,
    MicrophoneAudio,
}

impl TrackKind {
    /// All kinds in container track order.
    pub const ALL: [TrackKind; 3] = [Self::Video, Self::SystemAudio, Self::MicrophoneAudio];

    /// Position of this kind in [`TrackKind::ALL`].
    pub fn index(self) -> usize {
        match self {
            Self::Video => 0,
            Self::SystemAudio => 1,
            Self::MicrophoneAudio => 2,
        }
    }

    pub fn is_audio(self) -> bool {
        !matches!(self, Self::Video)
    }

    /// Wire tag used by the `.smux` format.
    pub fn to_u8(self) -> u8 {
        self.index() as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::SystemAudio => "system-audio",
            Self::MicrophoneAudio => "microphone-audio",
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point (or span) on the monotonic host clock, in nanoseconds.
///
/// Signed: samples captured before the session anchor have negative
/// offsets relative to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MediaTime(i64);

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros * 1_000)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis * 1_000_000)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * 1e9).round() as i64)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// Current reading of the process-wide host clock.
    ///
    /// The epoch is the first call in this process; only differences
    /// between readings are meaningful.
    pub fn host_now() -> Self {
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        let epoch = EPOCH.get_or_init(Instant::now);
        Self(epoch.elapsed().as_nanos() as i64)
    }
}

impl Add for MediaTime {
    type Output = MediaTime;

    fn add(self, rhs: MediaTime) -> MediaTime {
        MediaTime(self.0.saturating_add(rhs.0))
    }
}

impl Sub for MediaTime {
    type Output = MediaTime;

    fn sub(self, rhs: MediaTime) -> MediaTime {
        MediaTime(self.0.saturating_sub(rhs.0))
    }
}

/// Description of the payload carried by a [`RawSample`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleFormat {
    /// One encoded or raw picture.
    Video { width: u32, height: u32 },
    /// Interleaved signed 16-bit little-endian PCM.
    Audio { sample_rate: f64, channels: u16 },
}

/// One timestamped unit of media on its way to a track.
///
/// Immutable once built; handed to the session writer by value.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    kind: TrackKind,
    pts: MediaTime,
    duration: Option<MediaTime>,
    sample_count: u32,
    format: SampleFormat,
    data: Vec<u8>,
}

impl RawSample {
    pub fn new(
        kind: TrackKind,
        pts: MediaTime,
        duration: Option<MediaTime>,
        sample_count: u32,
        format: SampleFormat,
        data: Vec<u8>,
    ) -> Self {
        Self {
            kind,
            pts,
            duration,
            sample_count,
            format,
            data,
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Presentation timestamp on the host clock.
    pub fn pts(&self) -> MediaTime {
        self.pts
    }

    pub fn duration(&self) -> Option<MediaTime> {
        self.duration
    }

    /// Number of media samples (1 per video frame, frames per audio block).
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of submitting a sample to a track sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmitOutcome {
    Written,
    DroppedNotReady,
    DroppedNotWriting,
}

/// Per-track submission counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackStats {
    pub written: u64,
    pub dropped_not_ready: u64,
    pub dropped_not_writing: u64,
}

impl TrackStats {
    pub fn submitted(&self) -> u64 {
        self.written + self.dropped_not_ready + self.dropped_not_writing
    }
}
