//! Transcript debouncing
//!
//! Speech recognizers split a single utterance across several final results
//! when the speaker pauses briefly. The debouncer holds the latest final
//! result as a pending candidate and only commits it once the quiet period
//! elapses with no newer final. A newer final inside the quiet period
//! discards the previous candidate and restarts the deadline, so one
//! utterance never produces two dispatches.
//!
//! The debouncer keeps no timers of its own. It exposes the current deadline
//! and the caller arms whatever timer mechanism it uses against it, which
//! keeps this logic synchronous and directly testable.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Candidate {
    text: String,
    deadline: Instant,
}

#[derive(Debug)]
pub struct TranscriptDebouncer {
    quiet_period: Duration,
    candidate: Option<Candidate>,
    caption: Option<String>,
}

impl TranscriptDebouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            candidate: None,
            caption: None,
        }
    }

    /// Record a final recognition result. Replaces any pending candidate and
    /// restarts the quiet-period deadline. Returns `true` if a previous
    /// candidate was superseded.
    pub fn observe_final(&mut self, text: &str, now: Instant) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let superseded = self.candidate.is_some();
        if superseded {
            tracing::debug!(target: "capture", "final result supersedes pending candidate");
        }
        self.caption = Some(text.to_string());
        self.candidate = Some(Candidate {
            text: text.to_string(),
            deadline: now + self.quiet_period,
        });
        superseded
    }

    /// Record an interim result. Refreshes the live caption only; the
    /// pending candidate and its deadline are untouched.
    pub fn observe_interim(&mut self, text: &str) {
        if !text.trim().is_empty() {
            self.caption = Some(text.trim().to_string());
        }
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    /// The instant at which the pending candidate becomes committable.
    pub fn deadline(&self) -> Option<Instant> {
        self.candidate.as_ref().map(|c| c.deadline)
    }

    /// Commit the pending candidate if its deadline has elapsed unmodified.
    pub fn take_due(&mut self, now: Instant) -> Option<String> {
        if self.candidate.as_ref().is_some_and(|c| now >= c.deadline) {
            let committed = self.candidate.take().map(|c| c.text);
            self.caption = None;
            committed
        } else {
            None
        }
    }

    /// Drop the pending candidate and caption. Invoked the instant assistant
    /// speech begins: whatever was pending is presumed to be echo or
    /// cross-talk. Returns `true` if a candidate was discarded.
    pub fn clear(&mut self) -> bool {
        self.caption = None;
        self.candidate.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.candidate.is_some()
    }
}
