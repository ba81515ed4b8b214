//! Console capture backend
//!
//! A speech-capture implementation over stdin for headless runs and local
//! smoke-testing of the turn pipeline: each typed line arrives as a final
//! recognition result, and slash-commands (`/mute`, `/unmute`, `/skip`,
//! `/status`, `/quit`) are routed to the coordinator. A platform recognizer
//! implements [`SpeechCapture`] the same way in a real embedding.
//!
//! Stdin is pumped on a dedicated thread (reading it through the async
//! runtime would pin a blocking-pool thread and stall shutdown); the thread
//! is detached and dies with the process.

use crate::turn::CoordinatorCommand;
use async_trait::async_trait;
use parking_lot::Mutex;
use parlor_foundation::CaptureError;
use parlor_stt::{RecognitionEvent, SpeechCapture};
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub type CommandBinding = Arc<Mutex<Option<mpsc::Sender<CoordinatorCommand>>>>;

pub struct ConsoleCapture {
    commands: CommandBinding,
    lines: Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>,
    task: Option<JoinHandle<()>>,
    events: Option<mpsc::Sender<RecognitionEvent>>,
}

impl ConsoleCapture {
    /// Capture backed by the process's stdin.
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::channel(32);
        let spawned = std::thread::Builder::new()
            .name("console-stdin".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(line) => {
                            if tx.blocking_send(line).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            });
        if let Err(e) = spawned {
            // The line channel closes with the dropped sender; streams end
            // immediately instead of wedging.
            warn!(target: "capture", error = %e, "failed to spawn stdin thread");
        }
        Self::from_lines(rx)
    }

    /// Capture backed by an arbitrary line source; what the tests use.
    pub fn from_lines(lines: mpsc::Receiver<String>) -> Self {
        Self {
            commands: Arc::new(Mutex::new(None)),
            lines: Arc::new(tokio::sync::Mutex::new(lines)),
            task: None,
            events: None,
        }
    }

    /// Shared slot for the coordinator's command sender; bound by the
    /// runtime once the coordinator exists.
    pub fn command_binding(&self) -> CommandBinding {
        self.commands.clone()
    }
}

fn parse_command(line: &str) -> Option<CoordinatorCommand> {
    match line {
        "/mute" => Some(CoordinatorCommand::SetMuted(true)),
        "/unmute" => Some(CoordinatorCommand::SetMuted(false)),
        "/skip" => Some(CoordinatorCommand::Skip),
        "/status" => Some(CoordinatorCommand::QueryStatus),
        "/quit" | "/end" => Some(CoordinatorCommand::End),
        _ => None,
    }
}

#[async_trait]
impl SpeechCapture for ConsoleCapture {
    async fn start(&mut self, events: mpsc::Sender<RecognitionEvent>) -> Result<(), CaptureError> {
        if self.task.is_some() {
            return Err(CaptureError::Other("capture stream already exists".into()));
        }
        events
            .send(RecognitionEvent::Started)
            .await
            .map_err(|_| CaptureError::Other("event receiver dropped".into()))?;

        let commands = self.commands.clone();
        let lines = self.lines.clone();
        let task_events = events.clone();
        let task = tokio::spawn(async move {
            loop {
                let line = lines.lock().await.recv().await;
                let Some(line) = line else {
                    let _ = task_events.send(RecognitionEvent::Ended).await;
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(cmd) = parse_command(line) {
                    let bound = commands.lock().clone();
                    match bound {
                        Some(tx) => {
                            let _ = tx.send(cmd).await;
                        }
                        None => warn!(target: "capture", "no command binding, ignoring {}", line),
                    }
                    continue;
                }
                debug!(target: "capture", chars = line.len(), "console utterance");
                let result = RecognitionEvent::Result {
                    text: line.to_string(),
                    is_final: true,
                    confidence: None,
                };
                if task_events.send(result).await.is_err() {
                    break;
                }
            }
        });

        self.task = Some(task);
        self.events = Some(events);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(events) = self.events.take() {
            let _ = events.send(RecognitionEvent::Ended).await;
        }
    }
}
