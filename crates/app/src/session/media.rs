//! Real-time media transport seam
//!
//! The relay carrying actual audio between the user and the assistant is an
//! external collaborator; the coordinator only needs its connectivity
//! events, its track lifecycle, and the microphone enable switch. A real
//! relay integration implements this trait in the embedding; the offline
//! transport here drives the same state transitions without a network.

use async_trait::async_trait;
use parlor_foundation::{AppError, ConnectivityState};
use tokio::sync::mpsc;
use tracing::debug;

/// Distinguishes whose audio a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackTag {
    AssistantAudio,
    UserAudio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    ConnectivityChanged(ConnectivityState),
    TrackAvailable { tag: TrackTag },
    TrackEnded { tag: TrackTag },
}

#[async_trait]
pub trait MediaTransport: Send {
    /// Connect to the relay. Connectivity and track events arrive on the
    /// returned receiver; `Ready` is the coordinator's business, derived
    /// from `Connected` plus the warm-up delay.
    async fn connect(
        &mut self,
        url: &str,
        token: &str,
    ) -> Result<mpsc::Receiver<MediaEvent>, AppError>;

    async fn disconnect(&mut self);

    async fn set_microphone_enabled(&mut self, enabled: bool);
}

/// Transport with no relay behind it: reports connected immediately and
/// tracks the microphone flag. Used by the console demo and tests.
#[derive(Debug, Default)]
pub struct OfflineTransport {
    events: Option<mpsc::Sender<MediaEvent>>,
    microphone_enabled: bool,
}

impl OfflineTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn microphone_enabled(&self) -> bool {
        self.microphone_enabled
    }
}

#[async_trait]
impl MediaTransport for OfflineTransport {
    async fn connect(
        &mut self,
        url: &str,
        _token: &str,
    ) -> Result<mpsc::Receiver<MediaEvent>, AppError> {
        debug!(target: "channel", url, "offline transport connecting");
        let (tx, rx) = mpsc::channel(8);
        tx.send(MediaEvent::ConnectivityChanged(ConnectivityState::Connected))
            .await
            .map_err(|_| AppError::Media("event receiver dropped".into()))?;
        self.events = Some(tx);
        self.microphone_enabled = true;
        Ok(rx)
    }

    async fn disconnect(&mut self) {
        if let Some(tx) = self.events.take() {
            let _ = tx
                .send(MediaEvent::ConnectivityChanged(
                    ConnectivityState::Disconnected,
                ))
                .await;
        }
        self.microphone_enabled = false;
    }

    async fn set_microphone_enabled(&mut self, enabled: bool) {
        self.microphone_enabled = enabled;
    }
}
