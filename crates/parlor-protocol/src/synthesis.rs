//! Streamed synthesis chunk records
//!
//! The streaming synthesis service delivers one utterance as a server-sent
//! sequence of these records, terminated by stream close. Records may arrive
//! out of chunk order; `total_chunks` is declared on every record.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisChunk {
    pub chunk_index: u32,
    pub total_chunks: u32,
    /// Source text slice for this chunk; used only for pause-timing
    /// heuristics during playback.
    pub text: String,
    /// Base64-encoded audio payload.
    #[serde(default)]
    pub audio_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SynthesisChunk {
    pub fn decode_audio(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(self.audio_data.as_bytes())
    }
}
