//! Platform speech-capture contract

use crate::types::RecognitionEvent;
use async_trait::async_trait;
use parlor_foundation::CaptureError;
use tokio::sync::mpsc;

/// A platform speech-capture capability.
///
/// Implementations own at most one live stream at a time; `start` on an
/// implementation with a live stream is an error. Events for the stream are
/// delivered on the sender handed to `start`, ending with
/// [`RecognitionEvent::Ended`] exactly once per stream.
#[async_trait]
pub trait SpeechCapture: Send {
    /// Open a new capture stream. Returns once the platform accepted the
    /// request; the `Started` acknowledgement arrives on `events`.
    async fn start(&mut self, events: mpsc::Sender<RecognitionEvent>) -> Result<(), CaptureError>;

    /// Forcibly end the active stream, if any. Must be safe to call when no
    /// stream is live and must cause `Ended` to be delivered for a live one.
    async fn stop(&mut self);
}
