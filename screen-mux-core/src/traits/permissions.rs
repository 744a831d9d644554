/// Preflight access checks run before any capture starts.
pub trait CapturePermissions: Send + Sync {
    fn has_screen_capture_access(&self) -> bool;

    /// Missing microphone access does not block a recording.
    fn has_microphone_access(&self) -> bool;
}
