//! Remote synthesis clients
//!
//! Two HTTP paths to the synthesis backend: the streaming endpoint, parsed
//! incrementally as server-sent `data:` / newline-delimited JSON records
//! into audio fragments, and the single-shot endpoint returning one opaque
//! payload. The renderer chains them with the local fallback.

use async_trait::async_trait;
use futures_util::StreamExt;
use parlor_protocol::SynthesisChunk;
use parlor_tts::{AudioFragment, SingleShotSynthesis, StreamingSynthesis, SynthError, SynthResult};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct HttpStreamingSynthesis {
    http: reqwest::Client,
    base_url: String,
}

impl HttpStreamingSynthesis {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// One line of the stream body: an optional SSE `data:` prefix around a
/// JSON chunk record. Blank lines and stream sentinels yield `None`.
fn parse_stream_line(line: &str) -> Option<Result<SynthesisChunk, serde_json::Error>> {
    let payload = line.trim();
    let payload = payload.strip_prefix("data:").map(str::trim).unwrap_or(payload);
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(serde_json::from_str(payload))
}

#[async_trait]
impl StreamingSynthesis for HttpStreamingSynthesis {
    async fn stream(&self, text: &str, voice: &str) -> SynthResult<mpsc::Receiver<AudioFragment>> {
        let response = self
            .http
            .post(format!("{}/api/tts/stream", self.base_url))
            .json(&json!({ "text": text, "voice": voice }))
            .send()
            .await
            .map_err(|e| SynthError::StreamUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| SynthError::StreamUnavailable(e.to_string()))?;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(next) = body.next().await {
                let bytes = match next {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(target: "synth", error = %e, "synthesis stream broke");
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].to_string();
                    buffer.drain(..=pos);
                    match parse_stream_line(&line) {
                        Some(Ok(chunk)) => {
                            if tx.send(AudioFragment::from_chunk(&chunk)).await.is_err() {
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(target: "synth", error = %e, "undecodable stream record dropped");
                        }
                        None => {}
                    }
                }
            }
            // A trailing record without a final newline still counts.
            if let Some(Ok(chunk)) = parse_stream_line(&buffer) {
                let _ = tx.send(AudioFragment::from_chunk(&chunk)).await;
            }
            debug!(target: "synth", "synthesis stream drained");
        });

        Ok(rx)
    }
}

pub struct HttpSingleShotSynthesis {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSingleShotSynthesis {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SingleShotSynthesis for HttpSingleShotSynthesis {
    async fn synthesize(&self, text: &str, voice: &str) -> SynthResult<Vec<u8>> {
        let payload = self
            .http
            .post(format!("{}/api/tts", self.base_url))
            .json(&json!({ "text": text, "voice": voice }))
            .send()
            .await
            .map_err(|e| SynthError::SingleShotFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| SynthError::SingleShotFailed(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| SynthError::SingleShotFailed(e.to_string()))?;
        Ok(payload.to_vec())
    }
}
