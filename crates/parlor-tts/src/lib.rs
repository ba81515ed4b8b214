//! Synthesis abstraction layer for Parlor
//!
//! This crate covers the assistant's side of a turn: tracking one synthesis
//! job at a time, sequencing its streamed audio fragments into strictly
//! ordered playback with speech-appropriate pauses, and degrading through
//! single-shot and local synthesis when streaming is unavailable.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod engine;
pub mod error;
pub mod renderer;
pub mod sequencer;
pub mod sink;
pub mod timing;
pub mod tracker;
pub mod types;

pub use engine::{LocalSynthesis, SingleShotSynthesis, StreamingSynthesis};
pub use error::{SynthError, SynthResult};
pub use renderer::{RenderHandle, RendererConfig, SpeechRenderer};
pub use sequencer::{PlaybackSequencer, PlaybackSummary};
pub use sink::{AudioSink, PacedSink};
pub use timing::{PausePolicy, PauseTiming};
pub use tracker::{CompletionNotice, SynthesisTracker};
pub use types::{AudioFragment, JobId, SynthesisStatus};

static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique synthesis job ID
pub fn next_job_id() -> JobId {
    JOB_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}
