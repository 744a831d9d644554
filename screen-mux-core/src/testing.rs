//! In-memory collaborators shared by the unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use parking_lot::Mutex;

use crate::models::audio::PcmFormat;
use crate::models::config::TrackSettings;
use crate::models::error::CaptureError;
use crate::models::media::{MediaTime, RawSample, SampleFormat, TrackKind};
use crate::models::recording_result::RecordingResult;
use crate::models::state::{ContainerStatus, WriterState};
use crate::models::video::{FrameGeometry, FrameStatus, Rect, SurfaceRef, VideoFrame};
use crate::traits::audio_input::{AudioInput, PcmBlockCallback};
use crate::traits::capture_source::{CaptureSource, StreamOutput};
use crate::traits::container_writer::ContainerWriter;
use crate::traits::permissions::CapturePermissions;
use crate::traits::session_delegate::SessionDelegate;

/// Scripted container writer that records every call.
pub(crate) struct MockContainer {
    path: PathBuf,
    tracks: Mutex<Vec<(TrackKind, TrackSettings)>>,
    ready: [AtomicBool; 3],
    status: AtomicU8,
    error: Mutex<Option<CaptureError>>,
    start_writing_calls: AtomicUsize,
    sessions: Mutex<Vec<MediaTime>>,
    appended: Mutex<Vec<(TrackKind, MediaTime)>>,
    appended_before_session: AtomicBool,
    finish_calls: AtomicUsize,
    appended_at_finish: Mutex<Option<usize>>,
    append_gate: Mutex<Option<Arc<Barrier>>>,
    start_failure: Mutex<Option<String>>,
    append_failure: Mutex<Option<String>>,
    finish_failure: Mutex<Option<String>>,
}

impl MockContainer {
    pub fn new() -> Self {
        Self::with_path(PathBuf::from("/tmp/mock-recording.smux"))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            tracks: Mutex::new(Vec::new()),
            ready: [AtomicBool::new(true), AtomicBool::new(true), AtomicBool::new(true)],
            status: AtomicU8::new(ContainerStatus::Unknown as u8),
            error: Mutex::new(None),
            start_writing_calls: AtomicUsize::new(0),
            sessions: Mutex::new(Vec::new()),
            appended: Mutex::new(Vec::new()),
            appended_before_session: AtomicBool::new(false),
            finish_calls: AtomicUsize::new(0),
            appended_at_finish: Mutex::new(None),
            append_gate: Mutex::new(None),
            start_failure: Mutex::new(None),
            append_failure: Mutex::new(None),
            finish_failure: Mutex::new(None),
        }
    }

    pub fn set_ready(&self, kind: TrackKind, ready: bool) {
        self.ready[kind.index()].store(ready, Ordering::SeqCst);
    }

    pub fn fail_start(&self, message: &str) {
        *self.start_failure.lock() = Some(message.to_string());
    }

    pub fn fail_appends(&self, message: &str) {
        *self.append_failure.lock() = Some(message.to_string());
    }

    /// Report failure from now on, as a writer thread hitting an I/O error would.
    pub fn fail_now(&self, message: &str) {
        self.set_failed(CaptureError::ContainerFailed(message.to_string()));
    }

    /// Every later append meets `gate` twice: once on entry, once before returning.
    pub fn hold_appends(&self, gate: Arc<Barrier>) {
        *self.append_gate.lock() = Some(gate);
    }

    /// Number of appends recorded when `finish` was called.
    pub fn appended_at_finish(&self) -> Option<usize> {
        *self.appended_at_finish.lock()
    }

    pub fn fail_finish(&self, message: &str) {
        *self.finish_failure.lock() = Some(message.to_string());
    }

    pub fn tracks(&self) -> Vec<TrackKind> {
        self.tracks.lock().iter().map(|(kind, _)| *kind).collect()
    }

    pub fn start_writing_calls(&self) -> usize {
        self.start_writing_calls.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<MediaTime> {
        self.sessions.lock().clone()
    }

    pub fn appended(&self) -> Vec<(TrackKind, MediaTime)> {
        self.appended.lock().clone()
    }

    /// Whether any append arrived before `start_session`.
    pub fn appended_before_session(&self) -> bool {
        self.appended_before_session.load(Ordering::SeqCst)
    }

    pub fn finish_calls(&self) -> usize {
        self.finish_calls.load(Ordering::SeqCst)
    }

    fn set_failed(&self, error: CaptureError) {
        *self.error.lock() = Some(error);
        self.status.store(ContainerStatus::Failed as u8, Ordering::SeqCst);
    }
}

impl ContainerWriter for MockContainer {
    fn add_track(&self, kind: TrackKind, settings: TrackSettings) -> Result<(), CaptureError> {
        self.tracks.lock().push((kind, settings));
        Ok(())
    }

    fn start_writing(&self) -> Result<(), CaptureError> {
        self.start_writing_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.start_failure.lock().clone() {
            let error = CaptureError::ContainerFailed(message);
            self.set_failed(error.clone());
            return Err(error);
        }
        self.status.store(ContainerStatus::Writing as u8, Ordering::SeqCst);
        Ok(())
    }

    fn start_session(&self, anchor: MediaTime) -> Result<(), CaptureError> {
        self.sessions.lock().push(anchor);
        Ok(())
    }

    fn append(&self, kind: TrackKind, sample: &RawSample) -> bool {
        if let Some(message) = self.append_failure.lock().clone() {
            self.set_failed(CaptureError::ContainerFailed(message));
            return false;
        }
        if self.sessions.lock().is_empty() {
            self.appended_before_session.store(true, Ordering::SeqCst);
        }
        let gate = self.append_gate.lock().clone();
        if let Some(ref gate) = gate {
            gate.wait();
        }
        self.appended.lock().push((kind, sample.pts()));
        if let Some(ref gate) = gate {
            gate.wait();
        }
        true
    }

    fn is_ready_for_more_data(&self, kind: TrackKind) -> bool {
        self.ready[kind.index()].load(Ordering::SeqCst)
    }

    fn status(&self) -> ContainerStatus {
        ContainerStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    fn error(&self) -> Option<CaptureError> {
        self.error.lock().clone()
    }

    fn finish(&self) -> Result<PathBuf, CaptureError> {
        self.finish_calls.fetch_add(1, Ordering::SeqCst);
        *self.appended_at_finish.lock() = Some(self.appended.lock().len());
        if let Some(message) = self.finish_failure.lock().clone() {
            let error = CaptureError::StorageError(message);
            self.set_failed(error.clone());
            return Err(error);
        }
        self.status.store(ContainerStatus::Completed as u8, Ordering::SeqCst);
        Ok(self.path.clone())
    }

    fn output_path(&self) -> &Path {
        &self.path
    }
}

/// Delegate that records every notification.
#[derive(Default)]
pub(crate) struct RecordingDelegate {
    pub states: Mutex<Vec<WriterState>>,
    pub errors: Mutex<Vec<CaptureError>>,
    pub finished: Mutex<Vec<RecordingResult>>,
}

impl SessionDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: WriterState) {
        self.states.lock().push(state);
    }

    fn on_error(&self, error: &CaptureError) {
        self.errors.lock().push(error.clone());
    }

    fn on_recording_finished(&self, result: &RecordingResult) {
        self.finished.lock().push(result.clone());
    }
}

/// 10 ms stereo audio sample at `millis` on the host clock.
pub(crate) fn audio_sample(kind: TrackKind, millis: i64) -> RawSample {
    RawSample::new(
        kind,
        MediaTime::from_millis(millis),
        Some(MediaTime::from_millis(10)),
        441,
        SampleFormat::Audio {
            sample_rate: 44100.0,
            channels: 2,
        },
        vec![0u8; 441 * 4],
    )
}

pub(crate) fn video_sample(millis: i64) -> RawSample {
    RawSample::new(
        TrackKind::Video,
        MediaTime::from_millis(millis),
        Some(MediaTime::from_micros(16_667)),
        1,
        SampleFormat::Video { width: 64, height: 32 },
        vec![0x80u8; 64 * 32],
    )
}

pub(crate) fn test_geometry() -> FrameGeometry {
    FrameGeometry {
        content_rect: Rect {
            x: 0.0,
            y: 0.0,
            width: 32.0,
            height: 16.0,
        },
        content_scale: 1.0,
        scale_factor: 2.0,
    }
}

pub(crate) fn video_frame(millis: i64, status: FrameStatus) -> VideoFrame {
    VideoFrame::new(
        video_sample(millis),
        Some(SurfaceRef {
            id: 1,
            width: 64,
            height: 32,
        }),
        vec![test_geometry().attachments(status)],
    )
}

/// Capture source that hands its output back to the test.
#[derive(Default)]
pub(crate) struct FakeSource {
    pub output: Arc<Mutex<Option<Arc<dyn StreamOutput>>>>,
    pub start_calls: Arc<AtomicUsize>,
    pub stop_calls: Arc<AtomicUsize>,
    pub fail_start: bool,
}

impl CaptureSource for FakeSource {
    fn start(&mut self, output: Arc<dyn StreamOutput>) -> Result<(), CaptureError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(CaptureError::StreamFailed("stream refused to start".into()));
        }
        *self.output.lock() = Some(output);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        *self.output.lock() = None;
        Ok(())
    }
}

/// Microphone that hands its callback back to the test.
pub(crate) struct FakeMicrophone {
    pub callback: Arc<Mutex<Option<PcmBlockCallback>>>,
    pub available: bool,
}

impl Default for FakeMicrophone {
    fn default() -> Self {
        Self {
            callback: Arc::new(Mutex::new(None)),
            available: true,
        }
    }
}

impl AudioInput for FakeMicrophone {
    fn is_available(&self) -> bool {
        self.available
    }

    fn input_format(&self) -> PcmFormat {
        PcmFormat::interleaved(44100.0, 2)
    }

    fn start(&mut self, callback: PcmBlockCallback) -> Result<(), CaptureError> {
        *self.callback.lock() = Some(callback);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        *self.callback.lock() = None;
        Ok(())
    }
}

pub(crate) struct StaticPermissions {
    pub screen: bool,
    pub microphone: bool,
}

impl CapturePermissions for StaticPermissions {
    fn has_screen_capture_access(&self) -> bool {
        self.screen
    }

    fn has_microphone_access(&self) -> bool {
        self.microphone
    }
}
