use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::WriterState;

/// Event delegate for recording session notifications.
///
/// Methods may be called from any delivery thread. Implementations should
/// return quickly and marshal elsewhere if they need to do real work.
pub trait SessionDelegate: Send + Sync {
    /// Called when the session writer changes state.
    fn on_state_changed(&self, state: WriterState);

    /// Called when an error occurs during capture or writing.
    fn on_error(&self, error: &CaptureError);

    /// Called when the recording is finalized.
    fn on_recording_finished(&self, result: &RecordingResult);
}
