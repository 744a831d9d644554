use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::config::TrackSettings;
use crate::models::error::CaptureError;
use crate::models::media::{MediaTime, RawSample, TrackKind};
use crate::models::state::ContainerStatus;

/// Multi-track container writer.
///
/// Owned exclusively by one `SessionWriter`. `append` and
/// `is_ready_for_more_data` are called concurrently from the delivery
/// threads, one thread per track, and must not block.
pub trait ContainerWriter: Send + Sync {
    /// Declare a track. Only valid before `start_writing`.
    fn add_track(&self, kind: TrackKind, settings: TrackSettings) -> Result<(), CaptureError>;

    /// Open the output and move to `ContainerStatus::Writing`.
    fn start_writing(&self) -> Result<(), CaptureError>;

    /// Anchor the session timeline at `anchor`.
    fn start_session(&self, anchor: MediaTime) -> Result<(), CaptureError>;

    /// Hand one sample to the track of `kind`. Returns whether it was accepted.
    fn append(&self, kind: TrackKind, sample: &RawSample) -> bool;

    /// Whether the track of `kind` can take another sample right now.
    ///
    /// Maintained by the writer's own encoding side.
    fn is_ready_for_more_data(&self, kind: TrackKind) -> bool;

    fn status(&self) -> ContainerStatus;

    /// The error that moved the writer to `Failed`, if any.
    fn error(&self) -> Option<CaptureError>;

    /// Finish all tracks and close the file.
    fn finish(&self) -> Result<PathBuf, CaptureError>;

    fn output_path(&self) -> &Path;

    /// SHA-256 hex digest of the finished file, when the writer computes one.
    fn checksum(&self) -> Option<String> {
        None
    }
}

/// Creates the container for a new recording at the given path.
pub type ContainerFactory =
    Box<dyn Fn(&Path) -> Result<Arc<dyn ContainerWriter>, CaptureError> + Send + Sync>;
