//! Synthesis service contracts
//!
//! Three ways to turn text into speech, tried in order by the renderer:
//! streaming (fragments over a channel), single-shot (one opaque payload),
//! and local/on-device synthesis that plays directly.

use crate::error::SynthResult;
use crate::types::AudioFragment;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Streaming synthesis: one utterance as a sequence of audio fragments.
///
/// Fragments may arrive out of ordinal order; every fragment declares the
/// total count. The channel closing is the end of the stream.
#[async_trait]
pub trait StreamingSynthesis: Send + Sync {
    async fn stream(&self, text: &str, voice: &str) -> SynthResult<mpsc::Receiver<AudioFragment>>;
}

/// Single-shot synthesis: the whole utterance as one opaque audio payload.
#[async_trait]
pub trait SingleShotSynthesis: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> SynthResult<Vec<u8>>;
}

/// Local/on-device synthesis. Plays through the device itself; resolves when
/// playback has ended.
#[async_trait]
pub trait LocalSynthesis: Send + Sync {
    async fn speak(&self, text: &str) -> SynthResult<()>;
}
