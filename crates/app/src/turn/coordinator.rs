//! Conversation turn coordinator
//!
//! The coordinator decides, at every instant, whether the system is
//! listening, waiting, or speaking. It is the sole writer of all shared
//! turn state: the speaking flag, the capture stream reference, the pending
//! transcript, and the turn state machine. Every other component requests
//! mutation through its contract; nothing mutates behind its back.
//!
//! Execution is a single `select!` loop over recognition events, server
//! messages, media events, commands, and three timers (debounce flush,
//! relay warm-up, post-synthesis restart). Timers are deadlines sampled
//! each iteration, so cancelling one is just clearing its field.

use crate::session::{ConversationLog, ConversationSession, MediaEvent, MediaTransport};
use crate::turn::capture::{CaptureController, CaptureGates, StartOutcome, StartRefusal};
use parlor_foundation::{BlockReason, ConnectivityState, StreamDisposition, TurnState, TurnStateMachine};
use parlor_protocol::{ClientMessage, ServerMessage};
use parlor_stt::{EchoFilter, RecognitionEvent, SpeechCapture, TranscriptDebouncer};
use parlor_telemetry::TurnMetrics;
use parlor_tts::{JobId, RenderHandle, SpeechRenderer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Quiet period before a final transcript is committed.
    pub quiet_period: Duration,
    /// Safety margin between synthesis completion and capture restart,
    /// sized to outlast the residual audio-hardware echo tail.
    pub post_synthesis_delay: Duration,
    /// Media-relay warm-up between connected and ready.
    pub ready_warmup: Duration,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(2000),
            post_synthesis_delay: Duration::from_millis(500),
            ready_warmup: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorCommand {
    SetMuted(bool),
    /// User-initiated recovery: force the current utterance idle.
    Skip,
    /// Ask the server for its processing status.
    QueryStatus,
    End,
}

/// Cloneable handle for driving a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    cmd_tx: mpsc::Sender<CoordinatorCommand>,
    states: Arc<TurnStateMachine>,
    pub metrics: TurnMetrics,
}

impl CoordinatorHandle {
    pub async fn set_muted(&self, muted: bool) {
        let _ = self.cmd_tx.send(CoordinatorCommand::SetMuted(muted)).await;
    }

    pub async fn skip(&self) {
        let _ = self.cmd_tx.send(CoordinatorCommand::Skip).await;
    }

    pub async fn end(&self) {
        let _ = self.cmd_tx.send(CoordinatorCommand::End).await;
    }

    pub fn state(&self) -> TurnState {
        self.states.current()
    }

    pub fn subscribe_states(&self) -> crossbeam_channel::Receiver<TurnState> {
        self.states.subscribe()
    }

    pub fn command_sender(&self) -> mpsc::Sender<CoordinatorCommand> {
        self.cmd_tx.clone()
    }
}

struct ActiveRender {
    job_id: JobId,
    task: JoinHandle<()>,
}

enum LoopEvent {
    SynthesisDone(JobId),
}

pub struct TurnCoordinator<C: SpeechCapture> {
    cfg: TurnConfig,
    session: ConversationSession,
    states: Arc<TurnStateMachine>,
    capture: CaptureController<C>,
    recognition_tx: mpsc::Sender<RecognitionEvent>,
    recognition_rx: mpsc::Receiver<RecognitionEvent>,
    debouncer: TranscriptDebouncer,
    echo_filter: Box<dyn EchoFilter>,
    renderer: SpeechRenderer,
    render: Option<ActiveRender>,
    server_rx: mpsc::Receiver<ServerMessage>,
    client_tx: mpsc::Sender<ClientMessage>,
    media_rx: mpsc::Receiver<MediaEvent>,
    transport: Box<dyn MediaTransport>,
    cmd_rx: mpsc::Receiver<CoordinatorCommand>,
    loop_tx: mpsc::Sender<LoopEvent>,
    loop_rx: mpsc::Receiver<LoopEvent>,
    metrics: TurnMetrics,
    log: ConversationLog,
    ready_at: Option<Instant>,
    restart_at: Option<Instant>,
}

/// Sleep until an optional deadline; no deadline never wakes.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

fn epoch_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[allow(clippy::too_many_arguments)]
impl<C: SpeechCapture> TurnCoordinator<C> {
    pub fn new(
        cfg: TurnConfig,
        session: ConversationSession,
        capture_service: C,
        echo_filter: Box<dyn EchoFilter>,
        renderer: SpeechRenderer,
        server_rx: mpsc::Receiver<ServerMessage>,
        client_tx: mpsc::Sender<ClientMessage>,
        media_rx: mpsc::Receiver<MediaEvent>,
        transport: Box<dyn MediaTransport>,
        metrics: TurnMetrics,
    ) -> (Self, CoordinatorHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (recognition_tx, recognition_rx) = mpsc::channel(64);
        let (loop_tx, loop_rx) = mpsc::channel(8);
        let states = Arc::new(TurnStateMachine::new());
        let quiet_period = cfg.quiet_period;

        let handle = CoordinatorHandle {
            cmd_tx,
            states: states.clone(),
            metrics: metrics.clone(),
        };

        let coordinator = Self {
            cfg,
            session,
            states,
            capture: CaptureController::new(capture_service),
            recognition_tx,
            recognition_rx,
            debouncer: TranscriptDebouncer::new(quiet_period),
            echo_filter,
            renderer,
            render: None,
            server_rx,
            client_tx,
            media_rx,
            transport,
            cmd_rx,
            loop_tx,
            loop_rx,
            metrics,
            log: ConversationLog::new(),
            ready_at: None,
            restart_at: None,
        };

        (coordinator, handle)
    }

    pub async fn run(mut self) {
        info!(target: "turn", session_id = %self.session.grant.session_id, "turn coordinator running");

        loop {
            let debounce_at = self.debouncer.deadline();
            let exit = tokio::select! {
                maybe = self.cmd_rx.recv() => match maybe {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => true,
                },
                maybe = self.server_rx.recv() => match maybe {
                    Some(msg) => {
                        self.handle_server_message(msg).await;
                        false
                    }
                    None => {
                        warn!(target: "channel", "session channel closed, ending conversation");
                        true
                    }
                },
                Some(ev) = self.recognition_rx.recv() => {
                    self.handle_recognition(ev).await;
                    false
                },
                maybe = self.media_rx.recv() => match maybe {
                    Some(ev) => self.handle_media(ev).await,
                    None => {
                        warn!(target: "channel", "media transport gone, ending conversation");
                        true
                    }
                },
                Some(ev) = self.loop_rx.recv() => {
                    self.handle_loop_event(ev);
                    false
                },
                _ = sleep_until_opt(debounce_at) => {
                    self.flush_transcript().await;
                    false
                },
                _ = sleep_until_opt(self.ready_at) => {
                    self.handle_ready().await;
                    false
                },
                _ = sleep_until_opt(self.restart_at) => {
                    self.restart_at = None;
                    self.re_arm_capture().await;
                    false
                },
            };
            if exit {
                break;
            }
        }

        self.teardown().await;
    }

    async fn handle_command(&mut self, cmd: CoordinatorCommand) -> bool {
        match cmd {
            CoordinatorCommand::SetMuted(muted) => {
                self.set_muted(muted).await;
                false
            }
            CoordinatorCommand::Skip => {
                self.skip_current().await;
                false
            }
            CoordinatorCommand::QueryStatus => {
                if let Err(e) = self.client_tx.send(ClientMessage::StatusUpdate {}).await {
                    warn!(target: "channel", error = %e, "status query failed");
                }
                false
            }
            CoordinatorCommand::End => true,
        }
    }

    async fn set_muted(&mut self, muted: bool) {
        if self.session.muted == muted {
            return;
        }
        self.session.muted = muted;
        self.transport.set_microphone_enabled(!muted).await;
        info!(target: "turn", muted, "mute toggled");

        if muted {
            self.debouncer.clear();
            self.capture.stop().await;
            self.session.recording = false;
            // While Speaking only the flag flips; the gate re-check at
            // synthesis completion lands in Blocked(Muted).
            if self.states.current() != TurnState::Speaking {
                let _ = self
                    .states
                    .transition(TurnState::Blocked(BlockReason::Muted));
            }
        } else if self.states.current() != TurnState::Speaking {
            self.re_arm_capture().await;
        }
    }

    async fn skip_current(&mut self) {
        let Some(render) = self.render.take() else {
            debug!(target: "turn", "skip requested with nothing to skip");
            return;
        };
        warn!(target: "turn", job_id = render.job_id, "manual skip, forcing current job idle");
        render.task.abort();
        self.renderer.tracker().lock().reset();
        TurnMetrics::incr(&self.metrics.jobs_skipped);
        self.metrics.set_speaking(false);
        self.restart_at = Some(Instant::now() + self.cfg.post_synthesis_delay);
    }

    async fn handle_server_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Transcript { text, .. } => {
                debug!(target: "channel", chars = text.len(), "transcript confirmed");
            }
            ServerMessage::AiResponse { text, .. } => {
                info!(target: "turn", chars = text.len(), "assistant response received");
                self.log.push_assistant(&text, epoch_now());
                self.begin_speaking(&text).await;
            }
            ServerMessage::Status { is_processing, .. } => {
                debug!(target: "channel", is_processing, "status update");
            }
            ServerMessage::Error { message, .. } => {
                warn!(target: "channel", error = %message, "server reported an error");
                if self.states.current() == TurnState::AwaitingResponse {
                    // The utterance failed; give the floor back to the user.
                    self.re_arm_capture().await;
                }
            }
            ServerMessage::Pong {} => {
                debug!(target: "channel", "pong");
            }
        }
    }

    /// The assistant is about to speak: halt input first, abandon whatever
    /// transcript was pending, then start the render.
    async fn begin_speaking(&mut self, text: &str) {
        if let Some(old) = self.render.take() {
            warn!(target: "turn", job_id = old.job_id, "new response supersedes active render");
            old.task.abort();
        }

        self.capture.stop().await;
        self.session.recording = false;
        if self.debouncer.clear() {
            TurnMetrics::incr(&self.metrics.transcripts_abandoned);
        }
        self.restart_at = None;

        let _ = self.states.transition(TurnState::Speaking);
        self.metrics.set_speaking(true);

        let RenderHandle {
            job_id,
            completion,
            task,
        } = self.renderer.begin(text);
        self.render = Some(ActiveRender { job_id, task });

        let loop_tx = self.loop_tx.clone();
        tokio::spawn(async move {
            // Cancellation (skip/teardown) is handled by whoever reset the
            // tracker; only real completions feed back into the loop.
            if let Ok(notice) = completion.await {
                if let Some(id) = notice.job_id {
                    let _ = loop_tx.send(LoopEvent::SynthesisDone(id)).await;
                }
            }
        });
    }

    async fn handle_recognition(&mut self, ev: RecognitionEvent) {
        match ev {
            RecognitionEvent::Started => {
                self.capture.mark_active();
                self.session.recording = true;
                TurnMetrics::incr(&self.metrics.capture_starts);
                debug!(target: "capture", "capture stream acknowledged");
            }
            RecognitionEvent::Result { text, is_final, .. } => {
                if self.render.is_some() || self.states.current() == TurnState::Speaking {
                    debug!(target: "capture", "ignoring recognition during assistant speech");
                    return;
                }
                if !is_final {
                    TurnMetrics::incr(&self.metrics.interim_results);
                    self.debouncer.observe_interim(&text);
                    debug!(target: "capture", caption = %text, "caption updated");
                    return;
                }
                TurnMetrics::incr(&self.metrics.final_results);
                if self.echo_filter.is_probable_echo(&text) {
                    TurnMetrics::incr(&self.metrics.transcripts_filtered);
                    info!(target: "turn", "discarding probable assistant echo");
                    return;
                }
                if self.debouncer.observe_final(&text, Instant::now()) {
                    TurnMetrics::incr(&self.metrics.transcripts_superseded);
                }
            }
            RecognitionEvent::Error { error } => {
                TurnMetrics::incr(&self.metrics.capture_errors);
                match error.disposition() {
                    StreamDisposition::Continue => {
                        info!(target: "capture", error = %error, "capture hiccup, stream continues");
                    }
                    StreamDisposition::EndStream => {
                        warn!(target: "capture", error = %error, "capture stream failed");
                        self.capture.stop().await;
                        self.session.recording = false;
                    }
                }
            }
            RecognitionEvent::Ended => {
                TurnMetrics::incr(&self.metrics.capture_ends);
                self.capture.mark_ended();
                self.session.recording = false;
                // No automatic restart: re-authorization comes only from
                // the synthesis-completion handler or a gate change.
                debug!(target: "capture", "capture stream ended, awaiting re-authorization");
            }
        }
    }

    async fn handle_media(&mut self, ev: MediaEvent) -> bool {
        match ev {
            MediaEvent::ConnectivityChanged(ConnectivityState::Connected) => {
                if self.session.connectivity == ConnectivityState::Disconnected {
                    info!(
                        target: "turn",
                        warmup_ms = self.cfg.ready_warmup.as_millis() as u64,
                        "media connected, warming up"
                    );
                    self.session.connectivity = ConnectivityState::Connected;
                    self.ready_at = Some(Instant::now() + self.cfg.ready_warmup);
                }
                false
            }
            MediaEvent::ConnectivityChanged(ConnectivityState::Ready) => {
                // Readiness is normally derived here from the warm-up timer,
                // but a transport that reports it directly is taken at its word.
                self.ready_at = None;
                self.session.connectivity = ConnectivityState::Ready;
                self.re_arm_capture().await;
                false
            }
            MediaEvent::ConnectivityChanged(ConnectivityState::Disconnected) => {
                if self.session.connectivity == ConnectivityState::Disconnected {
                    false
                } else {
                    warn!(target: "turn", "media disconnected, conversation over");
                    true
                }
            }
            MediaEvent::TrackAvailable { tag } => {
                debug!(target: "channel", ?tag, "track available");
                false
            }
            MediaEvent::TrackEnded { tag } => {
                debug!(target: "channel", ?tag, "track ended");
                false
            }
        }
    }

    async fn handle_ready(&mut self) {
        self.ready_at = None;
        self.session.connectivity = ConnectivityState::Ready;
        info!(target: "turn", "session ready");
        self.re_arm_capture().await;
    }

    async fn flush_transcript(&mut self) {
        let Some(text) = self.debouncer.take_due(Instant::now()) else {
            return;
        };
        let state = self.states.current();
        if !matches!(state, TurnState::Listening | TurnState::AwaitingResponse) {
            debug!(target: "turn", ?state, "holding back committed transcript");
            return;
        }

        let timestamp = epoch_now();
        info!(target: "turn", chars = text.len(), "committing transcript");
        TurnMetrics::incr(&self.metrics.transcripts_committed);
        self.log.push_user(&text, timestamp);

        if let Err(e) = self
            .client_tx
            .send(ClientMessage::AudioTranscript { text, timestamp })
            .await
        {
            warn!(target: "channel", error = %e, "failed to dispatch transcript");
            return;
        }
        let _ = self.states.transition(TurnState::AwaitingResponse);
    }

    fn handle_loop_event(&mut self, ev: LoopEvent) {
        match ev {
            LoopEvent::SynthesisDone(job_id) => {
                if !self.render.as_ref().is_some_and(|r| r.job_id == job_id) {
                    debug!(target: "turn", job_id, "stale synthesis completion ignored");
                    return;
                }
                self.render = None;
                self.metrics.set_speaking(false);
                self.metrics.mark_turn();
                debug!(
                    target: "turn",
                    job_id,
                    delay_ms = self.cfg.post_synthesis_delay.as_millis() as u64,
                    "synthesis complete, arming restart delay"
                );
                self.restart_at = Some(Instant::now() + self.cfg.post_synthesis_delay);
            }
        }
    }

    /// Re-check the gating conditions and resume listening if they all
    /// hold. The single authority for restarting capture.
    async fn re_arm_capture(&mut self) {
        if self.render.is_some() {
            return;
        }
        if !self.session.is_ready() {
            let _ = self
                .states
                .transition(TurnState::Blocked(BlockReason::NotReady));
            return;
        }
        if self.session.muted {
            let _ = self
                .states
                .transition(TurnState::Blocked(BlockReason::Muted));
            return;
        }

        let gates = CaptureGates {
            ready: true,
            speaking: false,
            muted: false,
        };
        match self
            .capture
            .try_start(gates, self.recognition_tx.clone())
            .await
        {
            Ok(StartOutcome::Started) => {
                debug!(target: "capture", "capture stream starting");
                let _ = self.states.transition(TurnState::Listening);
            }
            Ok(StartOutcome::Refused(StartRefusal::AlreadyCapturing)) => {
                let _ = self.states.transition(TurnState::Listening);
            }
            Ok(StartOutcome::Refused(reason)) => {
                debug!(target: "capture", ?reason, "capture start refused");
            }
            Err(e) => {
                TurnMetrics::incr(&self.metrics.capture_errors);
                warn!(target: "capture", error = %e, "failed to start capture, user may retry");
            }
        }
    }

    /// Stop everything, from any state, tolerating already-stopped
    /// resources. Pending deadlines are cleared, so no timer outlives the
    /// conversation.
    async fn teardown(&mut self) {
        info!(
            target: "turn",
            session_id = %self.session.grant.session_id,
            turns = self.log.len(),
            duration_s = self.session.started_at.elapsed().as_secs(),
            "conversation teardown"
        );
        self.ready_at = None;
        self.restart_at = None;
        self.debouncer.clear();
        if let Some(render) = self.render.take() {
            render.task.abort();
        }
        self.renderer.tracker().lock().reset();
        self.metrics.set_speaking(false);
        self.capture.stop().await;
        self.session.recording = false;
        self.transport.disconnect().await;
        self.session.connectivity = ConnectivityState::Disconnected;
        // Dropping the coordinator drops the outbound sender, which closes
        // the signaling channel; the runtime releases the remote session.
    }
}
