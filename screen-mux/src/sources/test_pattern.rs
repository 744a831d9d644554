use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use screen_mux_core::models::media::SampleFormat;
use screen_mux_core::models::video::{FrameGeometry, FrameStatus, Rect, SurfaceRef};
use screen_mux_core::{
    CaptureError, CaptureSource, MediaTime, PcmSampleAdapter, RawSample, RecordingConfiguration, StreamOutput,
    TrackKind, VideoFrame,
};

use super::{sine_block, Ticker};

/// Width and height of the thumbnail each synthetic frame carries.
const PATTERN_WIDTH: u32 = 64;
const PATTERN_HEIGHT: u32 = 36;

/// Every n-th frame reports an unchanged screen.
const IDLE_EVERY: u64 = 30;

const SYSTEM_AUDIO_BLOCK: Duration = Duration::from_millis(10);

/// Top-left corner of the synthetic cursor, in thumbnail pixels.
const CURSOR_AT: (u32, u32) = (8, 8);
const CURSOR_SIZE: u32 = 3;

/// Amplitude of the hum this process plays into the system mix.
const HUM_AMPLITUDE: f32 = 0.05;

/// Moving-bar screen stream plus a quiet system-audio hum.
///
/// Screen samples and system audio are delivered on two independent
/// threads, like a platform capture stream. The first screen sample is a
/// `Started` notification and periodic samples are `Idle`, so consumers see
/// the same mix of frames and non-frames a real stream produces.
///
/// The hum is played by this process, so it is captured as silence when
/// the configuration excludes the current process's audio. The cursor is
/// drawn into frames only when the configuration shows it.
pub struct TestPatternSource {
    config: RecordingConfiguration,
    running: Arc<AtomicBool>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl TestPatternSource {
    pub fn new(config: RecordingConfiguration) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }

    fn spawn(&mut self, name: &str, body: impl FnOnce() + Send + 'static) -> Result<(), CaptureError> {
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(body)
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn {} thread: {}", name, e)))?;
        self.handles.push(handle);
        Ok(())
    }
}

impl CaptureSource for TestPatternSource {
    fn start(&mut self, output: Arc<dyn StreamOutput>) -> Result<(), CaptureError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::ConfigurationFailed("test pattern already running".into()));
        }

        let screen = ScreenPattern::new(&self.config);
        let running = Arc::clone(&self.running);
        let screen_output = Arc::clone(&output);
        let frame_interval = Duration::from_secs_f64(1.0 / self.config.frame_rate as f64);
        let screen_result = self.spawn("screen-capture", move || {
            let mut ticker = Ticker::new(frame_interval);
            let mut index = 0u64;
            while running.load(Ordering::SeqCst) {
                ticker.wait();
                screen_output.on_video_frame(screen.frame(index, MediaTime::host_now()));
                index += 1;
            }
        });

        let running = Arc::clone(&self.running);
        let sample_rate = self.config.audio.sample_rate;
        let channels = self.config.audio.channels;
        let amplitude = hum_amplitude(&self.config);
        let audio_result = screen_result.and_then(|_| {
            self.spawn("system-audio-capture", move || {
                let mut ticker = Ticker::new(SYSTEM_AUDIO_BLOCK);
                let frames = (sample_rate * SYSTEM_AUDIO_BLOCK.as_secs_f64()).round() as usize;
                let mut phase = 0.0;
                while running.load(Ordering::SeqCst) {
                    ticker.wait();
                    let (samples, next) = sine_block(110.0, sample_rate, channels as usize, frames, phase, amplitude);
                    phase = next;
                    output.on_system_audio(RawSample::new(
                        TrackKind::SystemAudio,
                        MediaTime::host_now(),
                        Some(MediaTime::from_secs_f64(frames as f64 / sample_rate)),
                        frames as u32,
                        SampleFormat::Audio { sample_rate, channels },
                        PcmSampleAdapter::convert_to_int16_pcm(&samples),
                    ));
                }
            })
        });

        if let Err(e) = audio_result {
            self.stop()?;
            return Err(e);
        }
        log::info!(
            "Test pattern started: {}x{} at {} fps, cursor {}, own audio {}",
            self.config.width,
            self.config.height,
            self.config.frame_rate,
            if self.config.shows_cursor { "shown" } else { "hidden" },
            if self.config.excludes_current_process_audio { "excluded" } else { "captured" }
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("Test pattern thread panicked");
            }
        }
        Ok(())
    }
}

impl Drop for TestPatternSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Frame factory for the screen thread.
struct ScreenPattern {
    surface_size: (u32, u32),
    shows_cursor: bool,
    geometry: FrameGeometry,
}

impl ScreenPattern {
    fn new(config: &RecordingConfiguration) -> Self {
        let scale = config.display_scale_factor as f64;
        Self {
            surface_size: (config.width, config.height),
            shows_cursor: config.shows_cursor,
            geometry: FrameGeometry {
                content_rect: Rect {
                    x: 0.0,
                    y: 0.0,
                    width: config.width as f64 / scale,
                    height: config.height as f64 / scale,
                },
                content_scale: 1.0,
                scale_factor: scale,
            },
        }
    }

    fn status(index: u64) -> FrameStatus {
        if index == 0 {
            FrameStatus::Started
        } else if index % IDLE_EVERY == 0 {
            FrameStatus::Idle
        } else {
            FrameStatus::Complete
        }
    }

    fn frame(&self, index: u64, pts: MediaTime) -> VideoFrame {
        let status = Self::status(index);
        let (data, surface) = if status == FrameStatus::Complete {
            let surface = SurfaceRef {
                id: (index % u32::MAX as u64) as u32 + 1,
                width: self.surface_size.0,
                height: self.surface_size.1,
            };
            (bar_thumbnail(index, self.shows_cursor), Some(surface))
        } else {
            (Vec::new(), None)
        };

        let sample = RawSample::new(
            TrackKind::Video,
            pts,
            None,
            1,
            SampleFormat::Video {
                width: PATTERN_WIDTH,
                height: PATTERN_HEIGHT,
            },
            data,
        );
        VideoFrame::new(sample, surface, vec![self.geometry.attachments(status)])
    }
}

fn hum_amplitude(config: &RecordingConfiguration) -> f32 {
    if config.excludes_current_process_audio {
        0.0
    } else {
        HUM_AMPLITUDE
    }
}

/// Grayscale thumbnail with a vertical bar sweeping left to right, and a
/// black cursor square on top when `cursor` is set.
fn bar_thumbnail(index: u64, cursor: bool) -> Vec<u8> {
    let bar = (index % PATTERN_WIDTH as u64) as u32;
    let in_cursor = |x: u32, y: u32| {
        cursor && (CURSOR_AT.0..CURSOR_AT.0 + CURSOR_SIZE).contains(&x) && (CURSOR_AT.1..CURSOR_AT.1 + CURSOR_SIZE).contains(&y)
    };
    let mut pixels = Vec::with_capacity((PATTERN_WIDTH * PATTERN_HEIGHT) as usize);
    for y in 0..PATTERN_HEIGHT {
        pixels.extend((0..PATTERN_WIDTH).map(|x| {
            if in_cursor(x, y) {
                0x00
            } else if x.abs_diff(bar) < 2 {
                0xFF
            } else {
                0x20
            }
        }));
    }
    pixels
}
