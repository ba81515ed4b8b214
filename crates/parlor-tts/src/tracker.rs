//! Synthesis job tracking
//!
//! The tracker owns the identity of the utterance currently being spoken.
//! At most one job is current at a time; completion subscribers are one-shot
//! channels resolved exactly once for a matching job identity, so a stale
//! completion from a superseded job can never corrupt the turn state.

use crate::types::{JobId, SynthesisStatus};
use crate::next_job_id;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// What a completion subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionNotice {
    /// The job that completed, or `None` when the subscriber registered
    /// while the tracker was already idle.
    pub job_id: Option<JobId>,
}

#[derive(Debug)]
struct CurrentJob {
    id: JobId,
    status: SynthesisStatus,
}

#[derive(Debug, Default)]
pub struct SynthesisTracker {
    current: Option<CurrentJob>,
    subscribers: Vec<oneshot::Sender<CompletionNotice>>,
}

impl SynthesisTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new job and mark the tracker busy. If a previous job is still
    /// current its bookkeeping is finished first, so a new job is never
    /// reported while an old one is half-closed.
    pub fn start(&mut self, text: &str) -> JobId {
        if let Some(stale) = self.current.take() {
            warn!(target: "synth", job_id = stale.id, "superseding unfinished synthesis job");
            self.notify(Some(stale.id));
        }
        let id = next_job_id();
        debug!(target: "synth", job_id = id, chars = text.len(), "synthesis job opened");
        self.current = Some(CurrentJob {
            id,
            status: SynthesisStatus::Pending,
        });
        id
    }

    /// Update the current job's status. Stale job ids are ignored.
    pub fn set_status(&mut self, job_id: JobId, status: SynthesisStatus) {
        if let Some(job) = self.current.as_mut().filter(|j| j.id == job_id) {
            job.status = status;
        }
    }

    /// Mark `job_id` complete. Idempotent: a no-op unless `job_id` matches
    /// the current job. On match, the tracker goes idle and every registered
    /// subscriber is notified exactly once. Returns whether it matched.
    pub fn complete(&mut self, job_id: JobId) -> bool {
        match self.current.as_ref() {
            Some(job) if job.id == job_id => {
                debug!(target: "synth", job_id, "synthesis job complete");
                self.current = None;
                self.notify(Some(job_id));
                true
            }
            Some(job) => {
                debug!(
                    target: "synth",
                    stale = job_id,
                    current = job.id,
                    "ignoring stale completion"
                );
                false
            }
            None => false,
        }
    }

    /// Register for completion of the current job. If the tracker is already
    /// idle the returned receiver resolves immediately, so a subscriber that
    /// registers slightly late never waits forever.
    pub fn subscribe(&mut self) -> oneshot::Receiver<CompletionNotice> {
        let (tx, rx) = oneshot::channel();
        if self.current.is_none() {
            let _ = tx.send(CompletionNotice { job_id: None });
        } else {
            self.subscribers.push(tx);
        }
        rx
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    pub fn current_job(&self) -> Option<JobId> {
        self.current.as_ref().map(|j| j.id)
    }

    pub fn current_status(&self) -> Option<SynthesisStatus> {
        self.current.as_ref().map(|j| j.status)
    }

    /// Forcibly return to idle WITHOUT notifying subscribers; their senders
    /// are dropped and the receivers observe cancellation. Manual-override
    /// ("skip") recovery path.
    pub fn reset(&mut self) {
        if let Some(job) = self.current.take() {
            warn!(target: "synth", job_id = job.id, "synthesis tracker reset");
        }
        self.subscribers.clear();
    }

    fn notify(&mut self, job_id: Option<JobId>) {
        for tx in self.subscribers.drain(..) {
            let _ = tx.send(CompletionNotice { job_id });
        }
    }
}
