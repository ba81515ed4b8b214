//! Capture stream gating
//!
//! The controller owns the lifecycle of the single live capture stream.
//! `try_start` is a no-op unless every gating condition holds; end-of-stream
//! clears the reference and never restarts on its own: restart authority
//! belongs solely to the coordinator's synthesis-completion handler, so one
//! authority decides when listening resumes and restart attempts cannot
//! race.

use parlor_foundation::CaptureError;
use parlor_stt::{CaptureStreamState, RecognitionEvent, SpeechCapture};
use tokio::sync::mpsc;
use tracing::debug;

/// Gating conditions sampled by the coordinator at the moment of the call.
#[derive(Debug, Clone, Copy)]
pub struct CaptureGates {
    pub ready: bool,
    pub speaking: bool,
    pub muted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRefusal {
    NotReady,
    AlreadyCapturing,
    Speaking,
    Muted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    Refused(StartRefusal),
}

pub struct CaptureController<C> {
    service: C,
    state: CaptureStreamState,
}

impl<C: SpeechCapture> CaptureController<C> {
    pub fn new(service: C) -> Self {
        Self {
            service,
            state: CaptureStreamState::Absent,
        }
    }

    pub fn stream_state(&self) -> CaptureStreamState {
        self.state
    }

    /// A stream exists (live or being opened). The presence check that
    /// enforces the at-most-one invariant: there is no preemption between
    /// this check and creation in the single-writer model.
    pub fn has_stream(&self) -> bool {
        matches!(
            self.state,
            CaptureStreamState::Starting | CaptureStreamState::Active
        )
    }

    pub async fn try_start(
        &mut self,
        gates: CaptureGates,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<StartOutcome, CaptureError> {
        if !gates.ready {
            return Ok(StartOutcome::Refused(StartRefusal::NotReady));
        }
        if self.has_stream() {
            return Ok(StartOutcome::Refused(StartRefusal::AlreadyCapturing));
        }
        if gates.speaking {
            return Ok(StartOutcome::Refused(StartRefusal::Speaking));
        }
        if gates.muted {
            return Ok(StartOutcome::Refused(StartRefusal::Muted));
        }

        self.state = CaptureStreamState::Starting;
        match self.service.start(events).await {
            Ok(()) => Ok(StartOutcome::Started),
            Err(e) => {
                self.state = CaptureStreamState::Absent;
                Err(e)
            }
        }
    }

    /// Forcibly end the stream and clear state. Safe when no stream exists.
    pub async fn stop(&mut self) {
        if self.state != CaptureStreamState::Absent {
            debug!(target: "capture", from = ?self.state, "stopping capture stream");
        }
        self.service.stop().await;
        self.state = CaptureStreamState::Absent;
    }

    /// The platform acknowledged the stream start.
    pub fn mark_active(&mut self) {
        if self.state == CaptureStreamState::Starting {
            self.state = CaptureStreamState::Active;
        }
    }

    /// End-of-stream observed. Clears the reference; no restart.
    pub fn mark_ended(&mut self) {
        if self.has_stream() {
            self.state = CaptureStreamState::Ended;
        }
    }
}
