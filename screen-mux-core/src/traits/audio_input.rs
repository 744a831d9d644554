use std::sync::Arc;

use crate::models::audio::{PcmBlock, PcmFormat};
use crate::models::error::CaptureError;

/// Callback invoked on the input's real-time thread for every PCM block.
pub type PcmBlockCallback = Arc<dyn Fn(PcmBlock<'_>) + Send + Sync + 'static>;

/// Interface for the microphone input.
pub trait AudioInput: Send + Sync {
    /// Whether an input device is present.
    fn is_available(&self) -> bool;

    /// Native format blocks will be delivered in.
    fn input_format(&self) -> PcmFormat;

    /// Start capturing, delivering blocks via `callback`.
    ///
    /// The callback fires on a real-time audio thread. Keep processing minimal.
    fn start(&mut self, callback: PcmBlockCallback) -> Result<(), CaptureError>;

    /// Stop capturing and release the device.
    fn stop(&mut self) -> Result<(), CaptureError>;
}
