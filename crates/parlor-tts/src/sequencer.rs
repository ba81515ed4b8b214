//! Streaming playback sequencing
//!
//! Fragments arrive over a channel in whatever order the network delivers
//! them; playback is strictly ordinal. Fragment k+1 is gated on fragment k's
//! arrival, awaited on the channel rather than polled. Playback starts as
//! soon as fragment 0 is present and proceeds concurrently with arrival.
//!
//! A hard deadline measured from the start of playback bounds the whole job:
//! a stalled stream or a wedged sink can never leave the system speaking
//! forever.

use crate::sink::AudioSink;
use crate::timing::PausePolicy;
use crate::types::AudioFragment;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub played: u32,
    pub skipped: u32,
    /// The hard deadline fired before the declared total was reached.
    pub timed_out: bool,
    /// The stream closed before delivering the declared total.
    pub truncated: bool,
}

pub struct PlaybackSequencer<S> {
    sink: S,
    policy: PausePolicy,
    stall_timeout: Duration,
}

enum Step {
    Fragment(AudioFragment),
    Closed,
    TimedOut,
}

impl<S: AudioSink> PlaybackSequencer<S> {
    pub fn new(sink: S, policy: PausePolicy, stall_timeout: Duration) -> Self {
        Self {
            sink,
            policy,
            stall_timeout,
        }
    }

    /// Drain the fragment stream, playing in ordinal order. Returns once the
    /// declared total has been reached, the stream closed, or the deadline
    /// fired; it never hangs.
    pub async fn play(&self, mut rx: mpsc::Receiver<AudioFragment>) -> PlaybackSummary {
        let deadline = Instant::now() + self.stall_timeout;
        let mut pending: HashMap<u32, AudioFragment> = HashMap::new();
        let mut total: Option<u32> = None;
        let mut next_index: u32 = 0;
        let mut summary = PlaybackSummary::default();

        loop {
            if total.is_some_and(|t| next_index >= t) {
                break;
            }
            if Instant::now() >= deadline {
                summary.timed_out = true;
                break;
            }

            let step = loop {
                if let Some(frag) = pending.remove(&next_index) {
                    break Step::Fragment(frag);
                }
                tokio::select! {
                    maybe = rx.recv() => match maybe {
                        Some(frag) => {
                            total = Some(total.map_or(frag.total, |t| t.max(frag.total)));
                            if frag.index == next_index {
                                break Step::Fragment(frag);
                            }
                            if frag.index > next_index {
                                debug!(
                                    target: "synth",
                                    index = frag.index,
                                    awaiting = next_index,
                                    "holding out-of-order fragment"
                                );
                                pending.insert(frag.index, frag);
                            }
                            // Ordinals already played are stale duplicates.
                        }
                        None => break Step::Closed,
                    },
                    _ = tokio::time::sleep_until(deadline) => break Step::TimedOut,
                }
            };

            match step {
                Step::Fragment(frag) => {
                    if let Some(reason) = frag.error.as_deref() {
                        warn!(target: "synth", index = frag.index, reason, "skipping failed fragment");
                        summary.skipped += 1;
                    } else {
                        // The sink is raced against the deadline too; a
                        // wedged device counts as a stall.
                        let outcome = tokio::select! {
                            r = self.sink.play(&frag) => Some(r),
                            _ = tokio::time::sleep_until(deadline) => None,
                        };
                        match outcome {
                            Some(Ok(())) => summary.played += 1,
                            Some(Err(e)) => {
                                warn!(target: "synth", index = frag.index, error = %e, "fragment playback failed, skipping");
                                summary.skipped += 1;
                            }
                            None => {
                                summary.timed_out = true;
                                break;
                            }
                        }
                    }
                    next_index += 1;
                    let is_last = total.is_some_and(|t| next_index >= t);
                    if !is_last {
                        tokio::time::sleep(self.policy.fragment_pause(&frag.text)).await;
                    }
                }
                Step::Closed => {
                    if total.map_or(true, |t| next_index < t) {
                        warn!(
                            target: "synth",
                            delivered = next_index,
                            declared = total.unwrap_or(0),
                            "fragment stream closed early"
                        );
                        summary.truncated = true;
                    }
                    break;
                }
                Step::TimedOut => {
                    warn!(target: "synth", played = summary.played, "playback deadline reached, forcing completion");
                    summary.timed_out = true;
                    break;
                }
            }
        }

        summary
    }
}
