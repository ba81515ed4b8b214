//! Session provisioning request/response contract

use serde::{Deserialize, Serialize};

/// Everything the client needs to join a provisioned conversation: the
/// session identity, the media-relay room, an access token, and the relay
/// endpoint URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGrant {
    pub session_id: String,
    pub room_name: String,
    pub token: String,
    #[serde(alias = "livekit_url")]
    pub media_url: String,
}

/// Session info as reported by the provisioning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub room_name: String,
    pub is_active: bool,
}
