//! Core types for speech capture

use parlor_foundation::CaptureError;

/// Events emitted by a live capture stream
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// The platform acknowledged the stream; audio is flowing.
    Started,
    /// A recognition result. Interim results refresh the live caption only;
    /// final results are candidates for dispatch.
    Result {
        text: String,
        is_final: bool,
        confidence: Option<f32>,
    },
    /// A capture error; consult its disposition for whether the stream
    /// survives.
    Error { error: CaptureError },
    /// The stream ended. Ending does not imply restart.
    Ended,
}

/// Lifecycle of the single capture stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureStreamState {
    #[default]
    Absent,
    Starting,
    Active,
    Ended,
}
