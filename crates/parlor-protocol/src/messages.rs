//! Text-framed JSON messages on the bidirectional session channel

use serde::{Deserialize, Serialize};

/// Client -> server message kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A committed user transcript, with the client-side epoch timestamp
    /// (seconds) at which it was flushed.
    AudioTranscript { text: String, timestamp: f64 },
    /// Ask the server for its current processing status.
    StatusUpdate {},
    /// Keepalive.
    Ping {},
}

/// Server -> client message kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Echo confirmation of a dispatched user transcript.
    Transcript {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    /// The assistant's response text, to be synthesized and spoken.
    AiResponse {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    Status {
        is_processing: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_length: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    Pong {},
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ServerMessage {
    /// Parse a raw text frame. Malformed frames are the caller's problem to
    /// log and drop; they never abort the channel.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
