//! Conversation session state and its collaborators

pub mod channel;
pub mod media;
pub mod provision;

pub use channel::SessionChannel;
pub use media::{MediaEvent, MediaTransport, OfflineTransport, TrackTag};
pub use provision::ProvisioningClient;

use parlor_foundation::ConnectivityState;
use parlor_protocol::SessionGrant;
use std::time::Instant;

/// Root entity for one active call with the remote peer. Owned exclusively
/// by the turn coordinator; the capture stream and synthesis jobs are
/// transient children bounded by its lifetime.
#[derive(Debug)]
pub struct ConversationSession {
    pub grant: SessionGrant,
    pub connectivity: ConnectivityState,
    pub muted: bool,
    pub recording: bool,
    pub started_at: Instant,
}

impl ConversationSession {
    pub fn new(grant: SessionGrant) -> Self {
        Self {
            grant,
            connectivity: ConnectivityState::Disconnected,
            muted: false,
            recording: false,
            started_at: Instant::now(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.connectivity == ConnectivityState::Ready
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub role: Role,
    pub content: String,
    /// Epoch seconds at the time the entry was recorded.
    pub timestamp: f64,
}

/// Role-stamped history of the conversation so far.
#[derive(Debug, Default)]
pub struct ConversationLog {
    entries: Vec<LogEntry>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: &str, timestamp: f64) {
        self.entries.push(LogEntry {
            role: Role::User,
            content: content.to_string(),
            timestamp,
        });
    }

    pub fn push_assistant(&mut self, content: &str, timestamp: f64) {
        self.entries.push(LogEntry {
            role: Role::Assistant,
            content: content.to_string(),
            timestamp,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant() -> SessionGrant {
        SessionGrant {
            session_id: "s-1".into(),
            room_name: "voice-ai-s-1".into(),
            token: "tok".into(),
            media_url: "wss://relay.example".into(),
        }
    }

    #[test]
    fn new_session_is_disconnected_and_unmuted() {
        let s = ConversationSession::new(grant());
        assert_eq!(s.connectivity, ConnectivityState::Disconnected);
        assert!(!s.muted);
        assert!(!s.is_ready());
    }

    #[test]
    fn log_alternates_roles() {
        let mut log = ConversationLog::new();
        log.push_user("hi", 1.0);
        log.push_assistant("hello!", 2.0);
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].role, Role::User);
        assert_eq!(log.entries()[1].role, Role::Assistant);
    }
}
