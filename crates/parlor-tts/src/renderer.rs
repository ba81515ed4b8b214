//! Speech rendering
//!
//! One entry point per assistant utterance: open a job, try the streaming
//! path, degrade through single-shot and local synthesis, and in every case
//! end with the tracker's completion. The render itself runs as a spawned
//! task so the caller's event loop stays responsive; the returned handle
//! carries the completion receiver and the task for manual-override aborts.

use crate::engine::{LocalSynthesis, SingleShotSynthesis, StreamingSynthesis};
use crate::sequencer::PlaybackSequencer;
use crate::sink::AudioSink;
use crate::timing::{PausePolicy, PauseTiming};
use crate::tracker::{CompletionNotice, SynthesisTracker};
use crate::types::{AudioFragment, JobId, SynthesisStatus};
use parking_lot::Mutex;
use parlor_telemetry::TurnMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub voice: String,
    /// Hard cap on a whole job, measured from its start.
    pub stall_timeout: Duration,
    pub pause: PauseTiming,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            voice: "alloy".to_string(),
            stall_timeout: Duration::from_secs(15),
            pause: PauseTiming::default(),
        }
    }
}

/// A render in flight. Aborting `task` and resetting the tracker is the
/// manual-override ("skip") path; `completion` resolves on every normal
/// path, including fallbacks and the hard timeout.
pub struct RenderHandle {
    pub job_id: JobId,
    pub completion: oneshot::Receiver<CompletionNotice>,
    pub task: JoinHandle<()>,
}

pub struct SpeechRenderer {
    tracker: Arc<Mutex<SynthesisTracker>>,
    streaming: Arc<dyn StreamingSynthesis>,
    single_shot: Option<Arc<dyn SingleShotSynthesis>>,
    local: Option<Arc<dyn LocalSynthesis>>,
    sink: Arc<dyn AudioSink>,
    config: RendererConfig,
    metrics: TurnMetrics,
}

impl SpeechRenderer {
    pub fn new(
        tracker: Arc<Mutex<SynthesisTracker>>,
        streaming: Arc<dyn StreamingSynthesis>,
        single_shot: Option<Arc<dyn SingleShotSynthesis>>,
        local: Option<Arc<dyn LocalSynthesis>>,
        sink: Arc<dyn AudioSink>,
        config: RendererConfig,
        metrics: TurnMetrics,
    ) -> Self {
        Self {
            tracker,
            streaming,
            single_shot,
            local,
            sink,
            config,
            metrics,
        }
    }

    pub fn tracker(&self) -> Arc<Mutex<SynthesisTracker>> {
        self.tracker.clone()
    }

    /// Open a job for `text` and start rendering it. The job is opened and
    /// subscribed to synchronously, so the caller can never miss the
    /// completion of a job it just started.
    pub fn begin(&self, text: &str) -> RenderHandle {
        let (job_id, completion) = {
            let mut tracker = self.tracker.lock();
            let id = tracker.start(text);
            (id, tracker.subscribe())
        };
        TurnMetrics::incr(&self.metrics.jobs_started);

        let tracker = self.tracker.clone();
        let streaming = self.streaming.clone();
        let single_shot = self.single_shot.clone();
        let local = self.local.clone();
        let sink = self.sink.clone();
        let config = self.config.clone();
        let metrics = self.metrics.clone();
        let text = text.to_string();

        let task = tokio::spawn(async move {
            let render = render_job(
                job_id,
                &text,
                &tracker,
                streaming,
                single_shot,
                local,
                sink,
                &config,
                &metrics,
            );
            if tokio::time::timeout(config.stall_timeout, render)
                .await
                .is_err()
            {
                warn!(target: "synth", job_id, "render deadline reached, forcing completion");
                TurnMetrics::incr(&metrics.jobs_timed_out);
            }
            if tracker.lock().complete(job_id) {
                TurnMetrics::incr(&metrics.jobs_completed);
            }
        });

        RenderHandle {
            job_id,
            completion,
            task,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn render_job(
    job_id: JobId,
    text: &str,
    tracker: &Arc<Mutex<SynthesisTracker>>,
    streaming: Arc<dyn StreamingSynthesis>,
    single_shot: Option<Arc<dyn SingleShotSynthesis>>,
    local: Option<Arc<dyn LocalSynthesis>>,
    sink: Arc<dyn AudioSink>,
    config: &RendererConfig,
    metrics: &TurnMetrics,
) {
    tracker.lock().set_status(job_id, SynthesisStatus::Streaming);

    match streaming.stream(text, &config.voice).await {
        Ok(rx) => {
            tracker.lock().set_status(job_id, SynthesisStatus::Playing);
            let sequencer = PlaybackSequencer::new(
                sink,
                PausePolicy::new(config.pause),
                config.stall_timeout,
            );
            let summary = sequencer.play(rx).await;
            metrics
                .fragments_played
                .fetch_add(summary.played as u64, std::sync::atomic::Ordering::Relaxed);
            metrics
                .fragments_skipped
                .fetch_add(summary.skipped as u64, std::sync::atomic::Ordering::Relaxed);
            if summary.timed_out {
                TurnMetrics::incr(&metrics.jobs_timed_out);
            }
            info!(
                target: "synth",
                job_id,
                played = summary.played,
                skipped = summary.skipped,
                timed_out = summary.timed_out,
                "streamed playback finished"
            );
        }
        Err(e) => {
            warn!(target: "synth", job_id, error = %e, "streaming synthesis unavailable, falling back");
            tracker.lock().set_status(job_id, SynthesisStatus::Failed);
            render_fallback(job_id, text, tracker, single_shot, local, sink, config, metrics).await;
        }
    }
}

/// Fallback chain: single-shot synthesis, then local synthesis, then silent
/// completion. Degrades gracefully rather than hanging the turn state.
#[allow(clippy::too_many_arguments)]
async fn render_fallback(
    job_id: JobId,
    text: &str,
    tracker: &Arc<Mutex<SynthesisTracker>>,
    single_shot: Option<Arc<dyn SingleShotSynthesis>>,
    local: Option<Arc<dyn LocalSynthesis>>,
    sink: Arc<dyn AudioSink>,
    config: &RendererConfig,
    metrics: &TurnMetrics,
) {
    if let Some(synth) = single_shot {
        match synth.synthesize(text, &config.voice).await {
            Ok(payload) if !payload.is_empty() => {
                TurnMetrics::incr(&metrics.fallback_single_shot);
                tracker.lock().set_status(job_id, SynthesisStatus::Playing);
                let fragment = AudioFragment {
                    index: 0,
                    total: 1,
                    text: text.to_string(),
                    payload,
                    error: None,
                };
                match sink.play(&fragment).await {
                    Ok(()) => TurnMetrics::incr(&metrics.fragments_played),
                    Err(e) => {
                        warn!(target: "synth", job_id, error = %e, "single-shot playback failed");
                        TurnMetrics::incr(&metrics.fragments_skipped);
                    }
                }
                return;
            }
            Ok(_) => warn!(target: "synth", job_id, "single-shot synthesis returned no audio"),
            Err(e) => warn!(target: "synth", job_id, error = %e, "single-shot synthesis failed"),
        }
    }

    if let Some(local) = local {
        tracker.lock().set_status(job_id, SynthesisStatus::Playing);
        match local.speak(text).await {
            Ok(()) => {
                TurnMetrics::incr(&metrics.fallback_local);
                return;
            }
            Err(e) => warn!(target: "synth", job_id, error = %e, "local synthesis failed"),
        }
    }

    warn!(target: "synth", job_id, "no synthesis path available, completing without audio");
    TurnMetrics::incr(&metrics.fallback_silent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SynthError, SynthResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::mpsc;

    struct HealthyStream;

    #[async_trait]
    impl StreamingSynthesis for HealthyStream {
        async fn stream(
            &self,
            text: &str,
            _voice: &str,
        ) -> SynthResult<mpsc::Receiver<AudioFragment>> {
            let (tx, rx) = mpsc::channel(4);
            let text = text.to_string();
            tokio::spawn(async move {
                let _ = tx
                    .send(AudioFragment {
                        index: 0,
                        total: 1,
                        text,
                        payload: vec![0u8; 8],
                        error: None,
                    })
                    .await;
            });
            Ok(rx)
        }
    }

    struct DeadStream;

    #[async_trait]
    impl StreamingSynthesis for DeadStream {
        async fn stream(
            &self,
            _text: &str,
            _voice: &str,
        ) -> SynthResult<mpsc::Receiver<AudioFragment>> {
            Err(SynthError::StreamUnavailable("connection refused".into()))
        }
    }

    struct StalledStream;

    #[async_trait]
    impl StreamingSynthesis for StalledStream {
        async fn stream(
            &self,
            _text: &str,
            _voice: &str,
        ) -> SynthResult<mpsc::Receiver<AudioFragment>> {
            let (tx, rx) = mpsc::channel(1);
            // Leak the sender so the channel never closes.
            std::mem::forget(tx);
            Ok(rx)
        }
    }

    struct FlakySingleShot {
        works: bool,
    }

    #[async_trait]
    impl SingleShotSynthesis for FlakySingleShot {
        async fn synthesize(&self, _text: &str, _voice: &str) -> SynthResult<Vec<u8>> {
            if self.works {
                Ok(vec![1u8; 8])
            } else {
                Err(SynthError::SingleShotFailed("boom".into()))
            }
        }
    }

    struct CountingLocal {
        spoken: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LocalSynthesis for CountingLocal {
        async fn speak(&self, _text: &str) -> SynthResult<()> {
            self.spoken.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InstantSink;

    #[async_trait]
    impl AudioSink for InstantSink {
        async fn play(&self, _fragment: &AudioFragment) -> SynthResult<()> {
            Ok(())
        }
    }

    fn renderer(
        streaming: Arc<dyn StreamingSynthesis>,
        single_shot: Option<Arc<dyn SingleShotSynthesis>>,
        local: Option<Arc<dyn LocalSynthesis>>,
        metrics: TurnMetrics,
    ) -> SpeechRenderer {
        SpeechRenderer::new(
            Arc::new(Mutex::new(SynthesisTracker::new())),
            streaming,
            single_shot,
            local,
            Arc::new(InstantSink),
            RendererConfig::default(),
            metrics,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_stream_completes_the_job() {
        let metrics = TurnMetrics::new();
        let r = renderer(Arc::new(HealthyStream), None, None, metrics.clone());
        let handle = r.begin("Hello there.");
        let notice = handle.completion.await.unwrap();
        assert_eq!(notice.job_id, Some(handle.job_id));
        assert!(r.tracker().lock().is_idle());
        assert_eq!(metrics.fragments_played.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.jobs_completed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dead_stream_falls_back_to_single_shot() {
        let metrics = TurnMetrics::new();
        let r = renderer(
            Arc::new(DeadStream),
            Some(Arc::new(FlakySingleShot { works: true })),
            None,
            metrics.clone(),
        );
        let handle = r.begin("fallback please");
        handle.completion.await.unwrap();
        assert_eq!(metrics.fallback_single_shot.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.fallback_local.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_single_shot_falls_back_to_local() {
        let metrics = TurnMetrics::new();
        let spoken = Arc::new(AtomicU32::new(0));
        let r = renderer(
            Arc::new(DeadStream),
            Some(Arc::new(FlakySingleShot { works: false })),
            Some(Arc::new(CountingLocal {
                spoken: spoken.clone(),
            })),
            metrics.clone(),
        );
        let handle = r.begin("still trying");
        handle.completion.await.unwrap();
        assert_eq!(spoken.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.fallback_local.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_synthesis_path_completes_silently() {
        let metrics = TurnMetrics::new();
        let r = renderer(Arc::new(DeadStream), None, None, metrics.clone());
        let handle = r.begin("nothing works");
        let notice = handle.completion.await.unwrap();
        assert_eq!(notice.job_id, Some(handle.job_id));
        assert_eq!(metrics.fallback_silent.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.jobs_completed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_stream_is_forced_complete_exactly_once() {
        let metrics = TurnMetrics::new();
        let r = renderer(Arc::new(StalledStream), None, None, metrics.clone());
        let handle = r.begin("never arrives");
        let notice = handle.completion.await.unwrap();
        assert_eq!(notice.job_id, Some(handle.job_id));
        assert_eq!(metrics.jobs_timed_out.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.jobs_completed.load(Ordering::Relaxed), 1);
        assert!(r.tracker().lock().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn aborting_the_task_leaves_completion_to_reset() {
        let metrics = TurnMetrics::new();
        let r = renderer(Arc::new(StalledStream), None, None, metrics.clone());
        let handle = r.begin("skip me");
        handle.task.abort();
        r.tracker().lock().reset();
        // Subscribers observe cancellation, not a completion notice.
        assert!(handle.completion.await.is_err());
        assert!(r.tracker().lock().is_idle());
    }
}
