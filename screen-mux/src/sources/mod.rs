//! Synthetic capture collaborators.
//!
//! These stand in for a platform screen-capture stream and a hardware
//! microphone so the whole pipeline can run on any host.

pub mod test_pattern;
pub mod tone_microphone;

use std::time::{Duration, Instant};

use screen_mux_core::CapturePermissions;

pub use test_pattern::TestPatternSource;
pub use tone_microphone::ToneMicrophone;

/// Synthetic sources need no system grants.
pub struct LocalPermissions;

impl CapturePermissions for LocalPermissions {
    fn has_screen_capture_access(&self) -> bool {
        true
    }

    fn has_microphone_access(&self) -> bool {
        true
    }
}

/// Fixed-rate tick schedule for a delivery thread.
pub(crate) struct Ticker {
    interval: Duration,
    next: Instant,
}

impl Ticker {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Sleep until the next tick. Missed ticks are skipped, not replayed.
    pub(crate) fn wait(&mut self) {
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
        }
        self.next += self.interval;
        if self.next < now {
            self.next = now + self.interval;
        }
    }
}

/// `len` frames of a sine wave, duplicated across `channels`, starting at `phase`.
///
/// Returns the interleaved samples and the phase to continue from.
pub(crate) fn sine_block(frequency: f64, sample_rate: f64, channels: usize, len: usize, phase: f64, amplitude: f32) -> (Vec<f32>, f64) {
    let step = std::f64::consts::TAU * frequency / sample_rate;
    let mut samples = Vec::with_capacity(len * channels);
    let mut phase = phase;
    for _ in 0..len {
        let value = (phase.sin() as f32) * amplitude;
        samples.extend(std::iter::repeat(value).take(channels));
        phase = (phase + step) % std::f64::consts::TAU;
    }
    (samples, phase)
}
