use thiserror::Error;

/// Errors that can occur while setting up or running a recording.
///
/// Producer paths never return these across a delivery boundary; they are
/// logged and reported through `SessionDelegate::on_error` instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("a recording session is already active")]
    SessionActive,

    #[error("container failed: {0}")]
    ContainerFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("capture stream failed: {0}")]
    StreamFailed(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}
