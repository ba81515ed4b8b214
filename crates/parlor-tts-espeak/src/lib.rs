//! eSpeak local synthesis for Parlor
//!
//! The last resort in the synthesis fallback chain: when neither streaming
//! nor single-shot synthesis is reachable, speak the utterance through the
//! local `espeak`/`espeak-ng` command. Playback goes straight to the device;
//! `speak` resolves when the process exits.

use async_trait::async_trait;
use parlor_tts::{LocalSynthesis, SynthError, SynthResult};
use tokio::process::Command;
use tracing::{debug, warn};

pub struct EspeakSpeaker {
    /// Speaking rate in words per minute.
    rate: u32,
    /// Amplitude 0-200; espeak's default is 100.
    amplitude: u32,
    voice: Option<String>,
}

impl EspeakSpeaker {
    pub fn new() -> Self {
        Self {
            rate: 180,
            amplitude: 100,
            voice: None,
        }
    }

    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Resolve the espeak command name (espeak or espeak-ng).
    async fn resolve_command() -> Option<&'static str> {
        for cmd in ["espeak", "espeak-ng"] {
            if Command::new(cmd).arg("--version").output().await.is_ok() {
                return Some(cmd);
            }
        }
        None
    }

    pub async fn is_available() -> bool {
        Self::resolve_command().await.is_some()
    }

    fn build_args(&self, text: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(voice) = &self.voice {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
        args.push("-s".to_string());
        args.push(self.rate.to_string());
        args.push("-a".to_string());
        args.push(self.amplitude.min(200).to_string());
        args.push(text.to_string());
        args
    }
}

impl Default for EspeakSpeaker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalSynthesis for EspeakSpeaker {
    async fn speak(&self, text: &str) -> SynthResult<()> {
        if text.trim().is_empty() {
            return Err(SynthError::InvalidInput("empty text".into()));
        }
        let cmd = Self::resolve_command()
            .await
            .ok_or_else(|| SynthError::LocalUnavailable("espeak not installed".into()))?;

        debug!(target: "synth", command = cmd, chars = text.len(), "speaking via espeak");
        let status = Command::new(cmd)
            .args(self.build_args(text))
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            warn!(target: "synth", command = cmd, code = ?status.code(), "espeak exited with failure");
            Err(SynthError::LocalFailed(format!(
                "{} exited with {:?}",
                cmd,
                status.code()
            )))
        }
    }
}
