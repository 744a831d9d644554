//! # screen-mux-core
//!
//! Real-time multiplexer for a screen recording: one video track plus
//! system audio and microphone audio, written into a single container.
//!
//! Capture backends implement [`CaptureSource`] and [`AudioInput`] and plug
//! into the generic [`CaptureOrchestrator`]. The first complete screen frame
//! anchors the session timeline; samples are dropped rather than queued when
//! a track cannot keep up.
//!
//! ## Architecture
//!
//! ```text
//! screen-mux-core (this crate)
//! ├── traits/       ← CaptureSource, StreamOutput, AudioInput, ContainerWriter, SessionDelegate
//! ├── models/       ← CaptureError, WriterState, MediaTime, RawSample, VideoFrame, RecordingConfiguration
//! ├── processing/   ← FrameValidator, PcmSampleAdapter
//! ├── session/      ← TrackSink, SessionWriter, SessionRouter, CaptureOrchestrator
//! └── storage/      ← MuxFileWriter, .smux format, metadata
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

pub use models::audio::{PcmBlock, PcmFormat};
pub use models::config::RecordingConfiguration;
pub use models::error::CaptureError;
pub use models::media::{MediaTime, RawSample, SubmitOutcome, TrackKind, TrackStats};
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::WriterState;
pub use models::video::VideoFrame;
pub use processing::frame_validator::FrameValidator;
pub use processing::pcm_adapter::PcmSampleAdapter;
pub use session::orchestrator::CaptureOrchestrator;
pub use session::session_writer::SessionWriter;
pub use session::track_sink::TrackSink;
pub use storage::mux_writer::{mux_file_factory, MuxFileWriter};
pub use traits::audio_input::{AudioInput, PcmBlockCallback};
pub use traits::capture_source::{CaptureSource, StreamOutput};
pub use traits::container_writer::{ContainerFactory, ContainerWriter};
pub use traits::permissions::CapturePermissions;
pub use traits::session_delegate::SessionDelegate;
