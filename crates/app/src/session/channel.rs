//! Bidirectional session channel
//!
//! Text-framed JSON over a WebSocket. The bridge task owns the socket and
//! exposes plain mpsc endpoints to the coordinator, so the coordinator's
//! event loop never touches wire concerns. Malformed frames are counted and
//! dropped; they never crash the coordinator. Closing the outbound sender
//! closes the socket.

use futures_util::{SinkExt, StreamExt};
use parlor_foundation::AppError;
use parlor_protocol::{ClientMessage, ServerMessage};
use parlor_telemetry::TurnMetrics;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

pub struct SessionChannel {
    outbound: mpsc::Sender<ClientMessage>,
    inbound: mpsc::Receiver<ServerMessage>,
    task: JoinHandle<()>,
}

impl SessionChannel {
    pub async fn connect(url: &str, metrics: TurnMetrics) -> Result<Self, AppError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| AppError::Channel(e.to_string()))?;
        info!(target: "channel", url, "session channel connected");

        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<ClientMessage>(32);
        let (in_tx, in_rx) = mpsc::channel::<ServerMessage>(32);

        let task = tokio::spawn(async move {
            let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
            keepalive.tick().await;
            loop {
                tokio::select! {
                    maybe = out_rx.recv() => match maybe {
                        Some(msg) => {
                            let json = match msg.to_json() {
                                Ok(json) => json,
                                Err(e) => {
                                    warn!(target: "channel", error = %e, "unencodable client message");
                                    continue;
                                }
                            };
                            if let Err(e) = sink.send(Message::Text(json)).await {
                                warn!(target: "channel", error = %e, "send failed, closing channel");
                                break;
                            }
                            TurnMetrics::incr(&metrics.messages_sent);
                        }
                        None => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    maybe = stream.next() => match maybe {
                        Some(Ok(Message::Text(text))) => match ServerMessage::from_json(&text) {
                            Ok(msg) => {
                                TurnMetrics::incr(&metrics.messages_received);
                                if in_tx.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                TurnMetrics::incr(&metrics.malformed_messages);
                                warn!(target: "channel", error = %e, "dropping malformed frame");
                            }
                        },
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) | None => {
                            info!(target: "channel", "session channel closed by server");
                            break;
                        }
                        Some(Ok(other)) => {
                            debug!(target: "channel", "ignoring non-text frame: {:?}", other);
                        }
                        Some(Err(e)) => {
                            warn!(target: "channel", error = %e, "channel receive error");
                            break;
                        }
                    },
                    _ = keepalive.tick() => {
                        let ping = match (ClientMessage::Ping {}).to_json() {
                            Ok(json) => json,
                            Err(_) => continue,
                        };
                        if sink.send(Message::Text(ping)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            outbound: out_tx,
            inbound: in_rx,
            task,
        })
    }

    /// Hand the endpoints to the coordinator. Dropping the sender closes the
    /// socket; the join handle lets teardown reap the bridge task.
    pub fn split(
        self,
    ) -> (
        mpsc::Sender<ClientMessage>,
        mpsc::Receiver<ServerMessage>,
        JoinHandle<()>,
    ) {
        (self.outbound, self.inbound, self.task)
    }
}
