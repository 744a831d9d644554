use std::path::Path;
use std::sync::Arc;

use crate::models::audio::PcmBlock;
use crate::models::config::RecordingConfiguration;
use crate::models::error::CaptureError;
use crate::models::media::TrackStats;
use crate::models::recording_result::RecordingResult;
use crate::models::state::WriterState;
use crate::session::router::SessionRouter;
use crate::session::session_writer::SessionWriter;
use crate::traits::audio_input::{AudioInput, PcmBlockCallback};
use crate::traits::capture_source::CaptureSource;
use crate::traits::container_writer::ContainerFactory;
use crate::traits::permissions::CapturePermissions;
use crate::traits::session_delegate::SessionDelegate;

/// Owns the capture channels and the lifecycle of one recording at a time.
///
/// Generic over the screen/system-audio source and the microphone input.
/// Holds no business logic beyond wiring:
/// ```text
/// [CaptureSource] ─ video/system audio ─┐
///                                       ├→ [SessionRouter] → [SessionWriter] → [ContainerWriter]
/// [AudioInput]    ─ PCM blocks ─────────┘
/// ```
pub struct CaptureOrchestrator<S: CaptureSource, A: AudioInput> {
    source: S,
    microphone: A,
    config: RecordingConfiguration,
    permissions: Box<dyn CapturePermissions>,
    factory: ContainerFactory,
    delegate: Option<Arc<dyn SessionDelegate>>,
    session: Option<Arc<SessionWriter>>,
    router: Option<Arc<SessionRouter>>,
    source_running: bool,
    microphone_running: bool,
}

impl<S: CaptureSource, A: AudioInput> CaptureOrchestrator<S, A> {
    pub fn new(
        source: S,
        microphone: A,
        config: RecordingConfiguration,
        permissions: Box<dyn CapturePermissions>,
        factory: ContainerFactory,
    ) -> Self {
        Self {
            source,
            microphone,
            config,
            permissions,
            factory,
            delegate: None,
            session: None,
            router: None,
            source_running: false,
            microphone_running: false,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn SessionDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn config(&self) -> &RecordingConfiguration {
        &self.config
    }

    /// State of the current (or last) session writer.
    pub fn state(&self) -> Option<WriterState> {
        self.session.as_ref().map(|s| s.state())
    }

    pub fn session(&self) -> Option<&Arc<SessionWriter>> {
        self.session.as_ref()
    }

    pub fn router(&self) -> Option<&Arc<SessionRouter>> {
        self.router.as_ref()
    }

    /// Per-track counters of the current session, in track order.
    pub fn stats(&self) -> Option<[TrackStats; 3]> {
        self.session.as_ref().map(|s| s.all_stats())
    }

    /// Start a new recording into `output_path`.
    ///
    /// Refused while the previous session is neither closed nor failed.
    pub fn start(&mut self, output_path: &Path) -> Result<(), CaptureError> {
        if let Some(ref session) = self.session {
            if !session.state().is_terminal() {
                return Err(CaptureError::SessionActive);
            }
        }
        // A failed session may still have live channels.
        self.teardown();

        self.config.validate().map_err(CaptureError::ConfigurationFailed)?;

        if !self.permissions.has_screen_capture_access() {
            return Err(CaptureError::PermissionDenied("no screen capture permission".into()));
        }

        let writer = (self.factory)(output_path)?;
        let session = Arc::new(SessionWriter::new(writer, &self.config, self.delegate.clone())?);
        let router = Arc::new(SessionRouter::new(
            Arc::clone(&session),
            self.config.audio,
            self.delegate.clone(),
        ));
        self.session = Some(Arc::clone(&session));
        self.router = Some(Arc::clone(&router));

        self.start_microphone(&router);

        if let Err(e) = self.source.start(router) {
            log::error!("Failed to start screen capture: {}", e);
            self.teardown();
            session.finalize();
            return Err(e);
        }
        self.source_running = true;

        log::info!("Recording started into {}", session.output_path().display());
        Ok(())
    }

    /// The recording continues without a microphone track if this fails.
    fn start_microphone(&mut self, router: &Arc<SessionRouter>) {
        if !self.permissions.has_microphone_access() {
            log::warn!("No microphone permission, recording without microphone");
            return;
        }
        if !self.microphone.is_available() {
            let error = CaptureError::DeviceNotAvailable;
            log::warn!("Microphone: {}, recording without microphone", error);
            if let Some(ref delegate) = self.delegate {
                delegate.on_error(&error);
            }
            return;
        }

        let format = self.microphone.input_format();
        log::debug!(
            "Microphone format: {} Hz, {} channels",
            format.sample_rate,
            format.channels
        );
        if !self.config.audio.matches(format.sample_rate, format.channels) {
            log::warn!(
                "Microphone delivers {} Hz/{} ch but the track stores {} Hz/{} ch, its blocks will be dropped",
                format.sample_rate,
                format.channels,
                self.config.audio.sample_rate,
                self.config.audio.channels
            );
        }

        let router = Arc::clone(router);
        let callback: PcmBlockCallback = Arc::new(move |block: PcmBlock<'_>| {
            router.route_microphone(block);
        });

        match self.microphone.start(callback) {
            Ok(()) => self.microphone_running = true,
            Err(e) => log::warn!("Error starting microphone recording: {}", e),
        }
    }

    /// Tear down the capture channels, then finalize the session.
    ///
    /// Returns the finished recording, or `None` if nothing was recorded or
    /// finalizing failed. Calling it again returns the same result.
    pub fn stop(&mut self) -> Option<RecordingResult> {
        let session = self.session.clone()?;
        self.teardown();
        session.finalize()
    }

    fn teardown(&mut self) {
        if self.source_running {
            if let Err(e) = self.source.stop() {
                log::error!("Error stopping screen capture: {}", e);
            }
            self.source_running = false;
        }
        if self.microphone_running {
            if let Err(e) = self.microphone.stop() {
                log::error!("Error stopping microphone: {}", e);
            }
            self.microphone_running = false;
        }
    }
}

impl<S: CaptureSource, A: AudioInput> Drop for CaptureOrchestrator<S, A> {
    fn drop(&mut self) {
        self.teardown();
    }
}
