use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Session provisioning failed: {0}")]
    Provisioning(String),

    #[error("Session channel error: {0}")]
    Channel(String),

    #[error("Media transport error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid turn state transition: {0}")]
    InvalidTransition(String),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Failure taxonomy for the speech-capture stream, surfaced to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no speech detected")]
    NoSpeech,

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("network failure during capture: {0}")]
    Network(String),

    #[error("capture failed: {0}")]
    Other(String),
}

/// What the coordinator should do with the current stream after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDisposition {
    /// Non-fatal; the stream keeps running (e.g. nothing was said yet).
    Continue,
    /// Fatal to the stream but not the session; the caller may retry.
    EndStream,
}

impl CaptureError {
    pub fn disposition(&self) -> StreamDisposition {
        match self {
            CaptureError::NoSpeech => StreamDisposition::Continue,
            CaptureError::DeviceUnavailable(_)
            | CaptureError::PermissionDenied
            | CaptureError::Network(_)
            | CaptureError::Other(_) => StreamDisposition::EndStream,
        }
    }
}
