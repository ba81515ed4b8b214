//! Turn coordinator scenario tests
//!
//! Every external collaborator is mocked; time is virtual, so the debounce
//! window, the warm-up, and the post-synthesis safety delay run at their
//! real configured values without slowing the suite down.

use super::*;
use crate::session::{ConversationSession, MediaEvent, MediaTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use parlor_foundation::{
    AppError, BlockReason, CaptureError, ConnectivityState, TurnState,
};
use parlor_protocol::{ClientMessage, ServerMessage, SessionGrant};
use parlor_stt::{PhraseListFilter, RecognitionEvent, SpeechCapture};
use parlor_telemetry::TurnMetrics;
use parlor_tts::{
    AudioFragment, RendererConfig, SpeechRenderer, StreamingSynthesis, SynthError, SynthResult,
    SynthesisTracker,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone, Default)]
struct CaptureProbe {
    starts: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
    events: Arc<Mutex<Option<mpsc::Sender<RecognitionEvent>>>>,
}

impl CaptureProbe {
    fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    fn stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }

    async fn emit(&self, ev: RecognitionEvent) {
        let tx = self.events.lock().clone();
        tx.expect("no live capture stream").send(ev).await.unwrap();
    }

    async fn say(&self, text: &str) {
        self.emit(RecognitionEvent::Result {
            text: text.to_string(),
            is_final: true,
            confidence: None,
        })
        .await;
    }
}

struct MockCapture {
    probe: CaptureProbe,
}

#[async_trait]
impl SpeechCapture for MockCapture {
    async fn start(&mut self, events: mpsc::Sender<RecognitionEvent>) -> Result<(), CaptureError> {
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        let _ = events.send(RecognitionEvent::Started).await;
        *self.probe.events.lock() = Some(events);
        Ok(())
    }

    async fn stop(&mut self) {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        let tx = self.probe.events.lock().take();
        if let Some(tx) = tx {
            let _ = tx.send(RecognitionEvent::Ended).await;
        }
    }
}

#[derive(Default)]
struct StubTransport {
    mic_enabled: Arc<AtomicBool>,
}

#[async_trait]
impl MediaTransport for StubTransport {
    async fn connect(
        &mut self,
        _url: &str,
        _token: &str,
    ) -> Result<mpsc::Receiver<MediaEvent>, AppError> {
        unreachable!("tests feed media events directly")
    }

    async fn disconnect(&mut self) {}

    async fn set_microphone_enabled(&mut self, enabled: bool) {
        self.mic_enabled.store(enabled, Ordering::SeqCst);
    }
}

/// Streaming synthesis that delivers one fragment after `delay`.
struct SlowStream {
    delay: Duration,
}

#[async_trait]
impl StreamingSynthesis for SlowStream {
    async fn stream(&self, text: &str, _voice: &str) -> SynthResult<mpsc::Receiver<AudioFragment>> {
        let (tx, rx) = mpsc::channel(4);
        let delay = self.delay;
        let text = text.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
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

/// Streaming synthesis whose channel never delivers and never closes.
struct StalledStream;

#[async_trait]
impl StreamingSynthesis for StalledStream {
    async fn stream(
        &self,
        _text: &str,
        _voice: &str,
    ) -> SynthResult<mpsc::Receiver<AudioFragment>> {
        let (tx, rx) = mpsc::channel(1);
        std::mem::forget(tx);
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
        Err(SynthError::StreamUnavailable("refused".into()))
    }
}

struct InstantSink;

#[async_trait]
impl parlor_tts::AudioSink for InstantSink {
    async fn play(&self, _fragment: &AudioFragment) -> SynthResult<()> {
        Ok(())
    }
}

struct Harness {
    handle: CoordinatorHandle,
    run: JoinHandle<()>,
    media_tx: mpsc::Sender<MediaEvent>,
    server_tx: mpsc::Sender<ServerMessage>,
    client_rx: mpsc::Receiver<ClientMessage>,
    probe: CaptureProbe,
    metrics: TurnMetrics,
}

fn grant() -> SessionGrant {
    SessionGrant {
        session_id: "s-test".into(),
        room_name: "voice-ai-s-test".into(),
        token: "tok".into(),
        media_url: "offline://".into(),
    }
}

fn spawn_harness(streaming: Arc<dyn StreamingSynthesis>) -> Harness {
    let metrics = TurnMetrics::new();
    let (server_tx, server_rx) = mpsc::channel(8);
    let (client_tx, client_rx) = mpsc::channel(8);
    let (media_tx, media_rx) = mpsc::channel(8);

    let renderer = SpeechRenderer::new(
        Arc::new(Mutex::new(SynthesisTracker::new())),
        streaming,
        None,
        None,
        Arc::new(InstantSink),
        RendererConfig::default(),
        metrics.clone(),
    );

    let probe = CaptureProbe::default();
    let capture = MockCapture {
        probe: probe.clone(),
    };

    let (coordinator, handle) = TurnCoordinator::new(
        TurnConfig::default(),
        ConversationSession::new(grant()),
        capture,
        Box::new(PhraseListFilter::default()),
        renderer,
        server_rx,
        client_tx,
        media_rx,
        Box::new(StubTransport::default()),
        metrics.clone(),
    );
    let run = tokio::spawn(coordinator.run());

    Harness {
        handle,
        run,
        media_tx,
        server_tx,
        client_rx,
        probe,
        metrics,
    }
}

/// Let queued events drain and the virtual clock tick over.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

impl Harness {
    async fn bring_ready(&self) {
        self.media_tx
            .send(MediaEvent::ConnectivityChanged(ConnectivityState::Connected))
            .await
            .unwrap();
        // Default warm-up is 1000 ms.
        tokio::time::sleep(Duration::from_millis(1100)).await;
    }

    async fn shutdown(mut self) {
        self.handle.end().await;
        let _ = (&mut self.run).await;
    }
}

#[tokio::test(start_paused = true)]
async fn full_turn_cycle_restarts_capture_after_the_safety_delay() {
    let mut h = spawn_harness(Arc::new(SlowStream {
        delay: Duration::from_millis(100),
    }));

    h.bring_ready().await;
    assert_eq!(h.handle.state(), TurnState::Listening);
    assert_eq!(h.probe.starts(), 1);

    h.probe.say("what's the weather").await;
    tokio::time::sleep(Duration::from_millis(2100)).await;

    match h.client_rx.try_recv().unwrap() {
        ClientMessage::AudioTranscript { text, .. } => assert_eq!(text, "what's the weather"),
        other => panic!("unexpected dispatch: {:?}", other),
    }
    assert_eq!(h.handle.state(), TurnState::AwaitingResponse);

    h.server_tx
        .send(ServerMessage::AiResponse {
            text: "Sunny all day.".into(),
            session_id: None,
        })
        .await
        .unwrap();
    settle().await;
    assert_eq!(h.handle.state(), TurnState::Speaking);
    assert!(h.probe.stops() >= 1);

    // 100 ms of playback plus the 500 ms safety delay.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(h.handle.state(), TurnState::Listening);
    assert_eq!(h.probe.starts(), 2);
    assert_eq!(h.metrics.jobs_completed.load(Ordering::Relaxed), 1);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn only_the_last_final_in_a_burst_is_dispatched() {
    let mut h = spawn_harness(Arc::new(SlowStream {
        delay: Duration::from_millis(10),
    }));
    h.bring_ready().await;

    h.probe.say("turn on").await;
    tokio::time::sleep(Duration::from_millis(800)).await;
    h.probe.say("turn on the lights").await;
    tokio::time::sleep(Duration::from_millis(2100)).await;

    match h.client_rx.try_recv().unwrap() {
        ClientMessage::AudioTranscript { text, .. } => assert_eq!(text, "turn on the lights"),
        other => panic!("unexpected dispatch: {:?}", other),
    }
    assert!(h.client_rx.try_recv().is_err());
    assert_eq!(h.metrics.transcripts_committed.load(Ordering::Relaxed), 1);
    assert_eq!(h.metrics.transcripts_superseded.load(Ordering::Relaxed), 1);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn assistant_echo_is_filtered_not_dispatched() {
    let mut h = spawn_harness(Arc::new(SlowStream {
        delay: Duration::from_millis(10),
    }));
    h.bring_ready().await;

    h.probe.say("That's a great question, let me think").await;
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert!(h.client_rx.try_recv().is_err());
    assert_eq!(h.metrics.transcripts_filtered.load(Ordering::Relaxed), 1);
    assert_eq!(h.handle.state(), TurnState::Listening);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn pending_transcript_is_abandoned_when_speech_begins() {
    let mut h = spawn_harness(Arc::new(SlowStream {
        delay: Duration::from_millis(50),
    }));
    h.bring_ready().await;

    h.probe.say("is that you").await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    // A server-pushed response lands before the quiet period elapses.
    h.server_tx
        .send(ServerMessage::AiResponse {
            text: "Yes, it's me.".into(),
            session_id: None,
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(3000)).await;

    assert!(h.client_rx.try_recv().is_err());
    assert_eq!(h.metrics.transcripts_abandoned.load(Ordering::Relaxed), 1);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn mute_during_speaking_blocks_instead_of_listening() {
    let h = spawn_harness(Arc::new(SlowStream {
        delay: Duration::from_millis(400),
    }));
    h.bring_ready().await;

    h.server_tx
        .send(ServerMessage::AiResponse {
            text: "Speaking now.".into(),
            session_id: None,
        })
        .await
        .unwrap();
    settle().await;
    assert_eq!(h.handle.state(), TurnState::Speaking);

    h.handle.set_muted(true).await;
    settle().await;
    assert_eq!(h.handle.state(), TurnState::Speaking);

    // Playback finishes, the safety delay passes; muted wins over listening.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(h.handle.state(), TurnState::Blocked(BlockReason::Muted));
    // Capture was started once on ready and never restarted.
    assert_eq!(h.probe.starts(), 1);

    h.handle.set_muted(false).await;
    settle().await;
    assert_eq!(h.handle.state(), TurnState::Listening);
    assert_eq!(h.probe.starts(), 2);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn skip_recovers_from_a_stalled_render() {
    let h = spawn_harness(Arc::new(StalledStream));
    h.bring_ready().await;

    h.server_tx
        .send(ServerMessage::AiResponse {
            text: "This will wedge.".into(),
            session_id: None,
        })
        .await
        .unwrap();
    settle().await;
    assert_eq!(h.handle.state(), TurnState::Speaking);

    h.handle.skip().await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(h.handle.state(), TurnState::Listening);
    assert_eq!(h.metrics.jobs_skipped.load(Ordering::Relaxed), 1);
    assert_eq!(h.probe.starts(), 2);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stalled_stream_force_completes_and_re_arms_capture() {
    let h = spawn_harness(Arc::new(StalledStream));
    h.bring_ready().await;

    h.server_tx
        .send(ServerMessage::AiResponse {
            text: "Nothing will arrive.".into(),
            session_id: None,
        })
        .await
        .unwrap();
    settle().await;
    assert_eq!(h.handle.state(), TurnState::Speaking);

    // Hard timeout (15 s) plus the safety delay.
    tokio::time::sleep(Duration::from_millis(15_600)).await;
    assert_eq!(h.handle.state(), TurnState::Listening);
    assert_eq!(h.metrics.jobs_timed_out.load(Ordering::Relaxed), 1);
    assert_eq!(h.metrics.jobs_completed.load(Ordering::Relaxed), 1);
    assert_eq!(h.probe.starts(), 2);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unavailable_synthesis_still_releases_the_floor() {
    let h = spawn_harness(Arc::new(DeadStream));
    h.bring_ready().await;

    h.server_tx
        .send(ServerMessage::AiResponse {
            text: "Silence, then.".into(),
            session_id: None,
        })
        .await
        .unwrap();
    // Silent completion, then the safety delay re-authorizes capture.
    tokio::time::sleep(Duration::from_millis(700)).await;

    assert_eq!(h.handle.state(), TurnState::Listening);
    assert_eq!(h.metrics.fallback_silent.load(Ordering::Relaxed), 1);
    assert_eq!(h.probe.starts(), 2);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn capture_end_does_not_restart_on_its_own() {
    let h = spawn_harness(Arc::new(SlowStream {
        delay: Duration::from_millis(10),
    }));
    h.bring_ready().await;
    assert_eq!(h.probe.starts(), 1);

    h.probe.emit(RecognitionEvent::Ended).await;
    tokio::time::sleep(Duration::from_millis(3000)).await;

    // Ended cleared the stream; nothing restarted it.
    assert_eq!(h.probe.starts(), 1);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn no_capture_before_ready() {
    let h = spawn_harness(Arc::new(SlowStream {
        delay: Duration::from_millis(10),
    }));

    assert_eq!(h.handle.state(), TurnState::Blocked(BlockReason::NotReady));
    h.media_tx
        .send(MediaEvent::ConnectivityChanged(ConnectivityState::Connected))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Connected but still warming up.
    assert_eq!(h.probe.starts(), 0);
    assert_eq!(h.handle.state(), TurnState::Blocked(BlockReason::NotReady));

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(h.probe.starts(), 1);
    assert_eq!(h.handle.state(), TurnState::Listening);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn media_disconnect_ends_the_conversation() {
    let h = spawn_harness(Arc::new(SlowStream {
        delay: Duration::from_millis(10),
    }));
    h.bring_ready().await;

    h.media_tx
        .send(MediaEvent::ConnectivityChanged(
            ConnectivityState::Disconnected,
        ))
        .await
        .unwrap();
    settle().await;

    assert!(h.run.is_finished());
    assert!(h.probe.stops() >= 1);
}

#[tokio::test(start_paused = true)]
async fn server_error_returns_the_floor_to_the_user() {
    let mut h = spawn_harness(Arc::new(SlowStream {
        delay: Duration::from_millis(10),
    }));
    h.bring_ready().await;

    h.probe.say("hello").await;
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(h.client_rx.try_recv().is_ok());
    assert_eq!(h.handle.state(), TurnState::AwaitingResponse);

    h.server_tx
        .send(ServerMessage::Error {
            message: "generation failed".into(),
            session_id: None,
        })
        .await
        .unwrap();
    settle().await;

    assert_eq!(h.handle.state(), TurnState::Listening);

    h.shutdown().await;
}
