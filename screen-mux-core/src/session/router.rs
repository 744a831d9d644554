use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::audio::PcmBlock;
use crate::models::config::AudioTrackSettings;
use crate::models::error::CaptureError;
use crate::models::media::{RawSample, SubmitOutcome};
use crate::models::video::VideoFrame;
use crate::processing::frame_validator::FrameValidator;
use crate::processing::pcm_adapter::PcmSampleAdapter;
use crate::session::session_writer::SessionWriter;
use crate::traits::capture_source::StreamOutput;
use crate::traits::session_delegate::SessionDelegate;

/// Single dispatch point between the delivery threads and a session.
///
/// Screen samples go through [`FrameValidator`], microphone blocks through
/// [`PcmSampleAdapter`], system audio goes straight through.
pub struct SessionRouter {
    session: Arc<SessionWriter>,
    validator: FrameValidator,
    adapter: PcmSampleAdapter,
    delegate: Option<Arc<dyn SessionDelegate>>,
    rejected_frames: AtomicU64,
    lost_mic_blocks: AtomicU64,
}

impl SessionRouter {
    /// `microphone` is the output format of the microphone track.
    pub fn new(
        session: Arc<SessionWriter>,
        microphone: AudioTrackSettings,
        delegate: Option<Arc<dyn SessionDelegate>>,
    ) -> Self {
        Self {
            session,
            validator: FrameValidator::new(),
            adapter: PcmSampleAdapter::new(microphone),
            delegate,
            rejected_frames: AtomicU64::new(0),
            lost_mic_blocks: AtomicU64::new(0),
        }
    }

    pub fn session(&self) -> &Arc<SessionWriter> {
        &self.session
    }

    /// Returns `None` when the sample is not a complete frame.
    pub fn route_video(&self, frame: VideoFrame) -> Option<SubmitOutcome> {
        if !self.validator.validate(&frame) {
            self.rejected_frames.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        Some(self.session.append(frame.into_sample()))
    }

    pub fn route_system_audio(&self, sample: RawSample) -> SubmitOutcome {
        self.session.append(sample)
    }

    /// Returns `None` when the block could not be converted.
    pub fn route_microphone(&self, block: PcmBlock<'_>) -> Option<SubmitOutcome> {
        match self.adapter.convert(block) {
            Some(sample) => Some(self.session.append(sample)),
            None => {
                self.lost_mic_blocks.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Screen samples filtered out as non-frames.
    pub fn rejected_frames(&self) -> u64 {
        self.rejected_frames.load(Ordering::Relaxed)
    }

    /// Microphone blocks lost to conversion failures.
    pub fn lost_mic_blocks(&self) -> u64 {
        self.lost_mic_blocks.load(Ordering::Relaxed)
    }
}

impl StreamOutput for SessionRouter {
    fn on_video_frame(&self, frame: VideoFrame) {
        self.route_video(frame);
    }

    fn on_system_audio(&self, sample: RawSample) {
        self.route_system_audio(sample);
    }

    fn on_stream_error(&self, error: CaptureError) {
        // The session keeps running until an explicit stop.
        log::error!("An error occurred while capturing: {}", error);
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(&error);
        }
    }
}
