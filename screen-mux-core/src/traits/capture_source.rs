use std::sync::Arc;

use crate::models::error::CaptureError;
use crate::models::media::RawSample;
use crate::models::video::VideoFrame;

/// Receiver for everything a capture source delivers.
///
/// Screen and system-audio samples arrive on two independent delivery
/// threads; each thread is strictly ordered, the two are not ordered
/// relative to each other. Implementations must not block.
pub trait StreamOutput: Send + Sync {
    /// Called for every screen sample, including non-frame notifications.
    fn on_video_frame(&self, frame: VideoFrame);

    /// Called for every loopback system-audio sample.
    fn on_system_audio(&self, sample: RawSample);

    /// Called once if the capture stream dies.
    fn on_stream_error(&self, error: CaptureError);
}

/// Interface for platform screen + system-audio capture.
pub trait CaptureSource: Send + Sync {
    /// Start delivering samples to `output`.
    fn start(&mut self, output: Arc<dyn StreamOutput>) -> Result<(), CaptureError>;

    /// Stop delivery and release the stream.
    ///
    /// After this returns no further calls reach the output.
    fn stop(&mut self) -> Result<(), CaptureError>;
}
