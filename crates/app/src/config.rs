//! Application configuration
//!
//! Every empirically chosen delay in the turn pipeline lives here rather
//! than as a constant: the debounce quiet period, the post-synthesis safety
//! margin, the streaming hard timeout, the relay warm-up, and the pause
//! ladder. Values load from an optional TOML file with serde defaults and
//! can be overridden per-flag on the command line.

use parlor_foundation::AppError;
use parlor_stt::PhraseListFilter;
use parlor_tts::{PauseTiming, RendererConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the provisioning/synthesis backend.
    pub server_url: String,
    /// Voice identifier passed to the synthesis services.
    pub voice: String,
    /// Quiet period before a final transcript is committed.
    pub debounce_ms: u64,
    /// Safety margin between synthesis completion and capture restart,
    /// sized to outlast the audio hardware's echo tail.
    pub post_synthesis_delay_ms: u64,
    /// Hard cap on one synthesis job, from start.
    pub stream_timeout_ms: u64,
    /// Media-relay warm-up: delay between connected and ready.
    pub ready_warmup_ms: u64,
    pub pause_sentence_ms: u64,
    pub pause_clause_ms: u64,
    pub pause_conjunction_ms: u64,
    pub pause_minimal_ms: u64,
    /// Assistant-characteristic phrases for the echo filter; empty means
    /// the built-in defaults.
    pub echo_phrases: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            voice: "alloy".to_string(),
            debounce_ms: 2000,
            post_synthesis_delay_ms: 500,
            stream_timeout_ms: 15_000,
            ready_warmup_ms: 1000,
            pause_sentence_ms: 400,
            pause_clause_ms: 200,
            pause_conjunction_ms: 150,
            pause_minimal_ms: 50,
            echo_phrases: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&raw).map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    /// WebSocket endpoint for the session channel.
    pub fn ws_url(&self, session_id: &str) -> String {
        let base = self
            .server_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!("{}/ws/{}", base.trim_end_matches('/'), session_id)
    }

    pub fn debounce_quiet(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn post_synthesis_delay(&self) -> Duration {
        Duration::from_millis(self.post_synthesis_delay_ms)
    }

    pub fn ready_warmup(&self) -> Duration {
        Duration::from_millis(self.ready_warmup_ms)
    }

    pub fn pause_timing(&self) -> PauseTiming {
        PauseTiming {
            sentence: Duration::from_millis(self.pause_sentence_ms),
            clause: Duration::from_millis(self.pause_clause_ms),
            conjunction: Duration::from_millis(self.pause_conjunction_ms),
            minimal: Duration::from_millis(self.pause_minimal_ms),
        }
    }

    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            voice: self.voice.clone(),
            stall_timeout: Duration::from_millis(self.stream_timeout_ms),
            pause: self.pause_timing(),
        }
    }

    pub fn echo_filter(&self) -> PhraseListFilter {
        if self.echo_phrases.is_empty() {
            PhraseListFilter::default()
        } else {
            PhraseListFilter::new(self.echo_phrases.clone())
        }
    }
}
