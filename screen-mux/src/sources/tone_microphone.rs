use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use screen_mux_core::{AudioInput, CaptureError, MediaTime, PcmBlock, PcmBlockCallback, PcmFormat};

use super::{sine_block, Ticker};

/// Frames per delivered block, matching a typical input tap.
pub const BLOCK_FRAMES: usize = 1024;

/// Microphone stand-in that plays a steady sine tone.
///
/// Delivers interleaved Float32 blocks stamped with the host clock on a
/// dedicated `tone-microphone` thread.
pub struct ToneMicrophone {
    frequency: f64,
    format: PcmFormat,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ToneMicrophone {
    pub fn new(frequency: f64) -> Self {
        Self {
            frequency,
            format: PcmFormat::interleaved(44100.0, 2),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }
}

impl AudioInput for ToneMicrophone {
    fn is_available(&self) -> bool {
        true
    }

    fn input_format(&self) -> PcmFormat {
        self.format
    }

    fn start(&mut self, callback: PcmBlockCallback) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::ConfigurationFailed("tone microphone already running".into()));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let format = self.format;
        let frequency = self.frequency;

        let handle = thread::Builder::new()
            .name("tone-microphone".into())
            .spawn(move || {
                let mut ticker = Ticker::new(Duration::from_secs_f64(BLOCK_FRAMES as f64 / format.sample_rate));
                let mut phase = 0.0;
                while running.load(Ordering::SeqCst) {
                    ticker.wait();
                    let (samples, next) = sine_block(
                        frequency,
                        format.sample_rate,
                        format.channels as usize,
                        BLOCK_FRAMES,
                        phase,
                        0.25,
                    );
                    phase = next;
                    callback(PcmBlock::new(&samples, format, MediaTime::host_now()));
                }
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::Unknown(format!("failed to spawn microphone thread: {}", e))
            })?;

        *self.handle.lock() = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl Drop for ToneMicrophone {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
