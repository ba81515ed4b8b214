//! Runtime wiring
//!
//! Provisions a session, connects the signaling channel and the media
//! transport, assembles the synthesis chain, and hands everything to the
//! turn coordinator. Runs until the conversation ends or an interrupt asks
//! it to.

use crate::config::AppConfig;
use crate::console::ConsoleCapture;
use crate::session::{
    ConversationSession, MediaTransport, OfflineTransport, ProvisioningClient, SessionChannel,
};
use crate::synth::{HttpSingleShotSynthesis, HttpStreamingSynthesis};
use crate::turn::{TurnConfig, TurnCoordinator};
use parking_lot::Mutex;
use parlor_foundation::AppError;
use parlor_telemetry::TurnMetrics;
use parlor_tts::{LocalSynthesis, PacedSink, SpeechRenderer, SynthesisTracker};
use parlor_tts_espeak::EspeakSpeaker;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run_conversation(config: AppConfig) -> Result<(), AppError> {
    let metrics = TurnMetrics::new();

    let provisioner = ProvisioningClient::new(&config.server_url);
    let grant = provisioner.create().await?;
    let session_id = grant.session_id.clone();

    let channel = SessionChannel::connect(&config.ws_url(&session_id), metrics.clone()).await?;
    let (client_tx, server_rx, channel_task) = channel.split();

    let mut transport: Box<dyn MediaTransport> = Box::new(OfflineTransport::new());
    let media_rx = transport.connect(&grant.media_url, &grant.token).await?;

    let local: Option<Arc<dyn LocalSynthesis>> = if EspeakSpeaker::is_available().await {
        Some(Arc::new(EspeakSpeaker::new()))
    } else {
        warn!(target: "synth", "espeak not installed, no local synthesis fallback");
        None
    };
    let renderer = SpeechRenderer::new(
        Arc::new(Mutex::new(SynthesisTracker::new())),
        Arc::new(HttpStreamingSynthesis::new(&config.server_url)),
        Some(Arc::new(HttpSingleShotSynthesis::new(&config.server_url))),
        local,
        Arc::new(PacedSink::default()),
        config.renderer_config(),
        metrics.clone(),
    );

    let capture = ConsoleCapture::stdin();
    let commands = capture.command_binding();

    let turn_cfg = TurnConfig {
        quiet_period: config.debounce_quiet(),
        post_synthesis_delay: config.post_synthesis_delay(),
        ready_warmup: config.ready_warmup(),
    };
    let (coordinator, handle) = TurnCoordinator::new(
        turn_cfg,
        ConversationSession::new(grant),
        capture,
        Box::new(config.echo_filter()),
        renderer,
        server_rx,
        client_tx,
        media_rx,
        transport,
        metrics,
    );
    *commands.lock() = Some(handle.command_sender());

    let mut run = tokio::spawn(coordinator.run());
    tokio::select! {
        _ = &mut run => {
            info!(target: "turn", "conversation ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!(target: "turn", "interrupt received, ending conversation");
            handle.end().await;
            let _ = run.await;
        }
    }

    channel_task.abort();
    if let Err(e) = provisioner.release(&session_id).await {
        warn!(target: "channel", error = %e, "session release failed");
    }
    Ok(())
}
