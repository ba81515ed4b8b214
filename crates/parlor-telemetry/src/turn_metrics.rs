use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared metrics for cross-task monitoring of the turn pipeline
#[derive(Clone)]
pub struct TurnMetrics {
    // Capture side
    pub capture_starts: Arc<AtomicU64>,
    pub capture_ends: Arc<AtomicU64>,
    pub capture_errors: Arc<AtomicU64>,
    pub interim_results: Arc<AtomicU64>,
    pub final_results: Arc<AtomicU64>,

    // Transcript dispatch
    pub transcripts_committed: Arc<AtomicU64>, // Flushed to the language service
    pub transcripts_superseded: Arc<AtomicU64>, // Replaced inside the quiet period
    pub transcripts_filtered: Arc<AtomicU64>,  // Dropped as probable assistant echo
    pub transcripts_abandoned: Arc<AtomicU64>, // Cleared when playback began

    // Synthesis side
    pub jobs_started: Arc<AtomicU64>,
    pub jobs_completed: Arc<AtomicU64>,
    pub jobs_timed_out: Arc<AtomicU64>,
    pub jobs_skipped: Arc<AtomicU64>, // Manual override
    pub fragments_played: Arc<AtomicU64>,
    pub fragments_skipped: Arc<AtomicU64>,
    pub fallback_single_shot: Arc<AtomicU64>,
    pub fallback_local: Arc<AtomicU64>,
    pub fallback_silent: Arc<AtomicU64>,

    // Channel traffic
    pub messages_sent: Arc<AtomicU64>,
    pub messages_received: Arc<AtomicU64>,
    pub malformed_messages: Arc<AtomicU64>,

    // Activity indicators
    pub is_speaking: Arc<AtomicBool>,
    pub last_turn_time: Arc<RwLock<Option<Instant>>>,
}

impl Default for TurnMetrics {
    fn default() -> Self {
        Self {
            capture_starts: Arc::new(AtomicU64::new(0)),
            capture_ends: Arc::new(AtomicU64::new(0)),
            capture_errors: Arc::new(AtomicU64::new(0)),
            interim_results: Arc::new(AtomicU64::new(0)),
            final_results: Arc::new(AtomicU64::new(0)),

            transcripts_committed: Arc::new(AtomicU64::new(0)),
            transcripts_superseded: Arc::new(AtomicU64::new(0)),
            transcripts_filtered: Arc::new(AtomicU64::new(0)),
            transcripts_abandoned: Arc::new(AtomicU64::new(0)),

            jobs_started: Arc::new(AtomicU64::new(0)),
            jobs_completed: Arc::new(AtomicU64::new(0)),
            jobs_timed_out: Arc::new(AtomicU64::new(0)),
            jobs_skipped: Arc::new(AtomicU64::new(0)),
            fragments_played: Arc::new(AtomicU64::new(0)),
            fragments_skipped: Arc::new(AtomicU64::new(0)),
            fallback_single_shot: Arc::new(AtomicU64::new(0)),
            fallback_local: Arc::new(AtomicU64::new(0)),
            fallback_silent: Arc::new(AtomicU64::new(0)),

            messages_sent: Arc::new(AtomicU64::new(0)),
            messages_received: Arc::new(AtomicU64::new(0)),
            malformed_messages: Arc::new(AtomicU64::new(0)),

            is_speaking: Arc::new(AtomicBool::new(false)),
            last_turn_time: Arc::new(RwLock::new(None)),
        }
    }
}

impl TurnMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_turn(&self) {
        *self.last_turn_time.write() = Some(Instant::now());
    }

    pub fn set_speaking(&self, speaking: bool) {
        self.is_speaking.store(speaking, Ordering::Relaxed);
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
