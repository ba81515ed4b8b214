//! Audio playback sink

use crate::error::{SynthError, SynthResult};
use crate::types::AudioFragment;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Plays one fragment to completion. Decoding and the device pipeline are
/// the embedding's concern; the sequencer only needs `play` to resolve when
/// the fragment has finished sounding.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, fragment: &AudioFragment) -> SynthResult<()>;
}

#[async_trait]
impl<T: AudioSink + ?Sized> AudioSink for std::sync::Arc<T> {
    async fn play(&self, fragment: &AudioFragment) -> SynthResult<()> {
        (**self).play(fragment).await
    }
}

/// A sink that paces playback by payload size without touching an audio
/// device: it sleeps for the estimated duration of the fragment. Keeps the
/// turn cadence honest in headless runs and tests.
pub struct PacedSink {
    bytes_per_second: usize,
    max_fragment: Duration,
}

impl PacedSink {
    pub fn new(bytes_per_second: usize) -> Self {
        Self {
            bytes_per_second: bytes_per_second.max(1),
            max_fragment: Duration::from_secs(10),
        }
    }

    fn estimate(&self, payload_len: usize) -> Duration {
        let secs = payload_len as f64 / self.bytes_per_second as f64;
        Duration::from_secs_f64(secs).min(self.max_fragment)
    }
}

impl Default for PacedSink {
    fn default() -> Self {
        // 16-bit mono at 24 kHz
        Self::new(48_000)
    }
}

#[async_trait]
impl AudioSink for PacedSink {
    async fn play(&self, fragment: &AudioFragment) -> SynthResult<()> {
        if fragment.payload.is_empty() {
            return Err(SynthError::Sink("empty payload".into()));
        }
        let pace = self.estimate(fragment.payload.len());
        debug!(
            target: "synth",
            index = fragment.index,
            bytes = fragment.payload.len(),
            ms = pace.as_millis() as u64,
            "pacing fragment"
        );
        tokio::time::sleep(pace).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(payload: Vec<u8>) -> AudioFragment {
        AudioFragment {
            index: 0,
            total: 1,
            text: "x".into(),
            payload,
            error: None,
        }
    }

    #[test]
    fn estimate_scales_with_payload() {
        let sink = PacedSink::new(48_000);
        assert_eq!(sink.estimate(48_000), Duration::from_secs(1));
        assert_eq!(sink.estimate(24_000), Duration::from_millis(500));
    }

    #[test]
    fn estimate_is_capped() {
        let sink = PacedSink::new(1);
        assert_eq!(sink.estimate(1_000_000), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn empty_payload_is_a_sink_error() {
        let sink = PacedSink::default();
        assert!(sink.play(&fragment(Vec::new())).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn playback_takes_the_estimated_time() {
        let sink = PacedSink::new(48_000);
        let start = tokio::time::Instant::now();
        sink.play(&fragment(vec![0u8; 24_000])).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }
}
