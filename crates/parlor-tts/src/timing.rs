//! Inter-fragment pause policy
//!
//! Streamed fragments played back-to-back with a uniform gap sound robotic.
//! The pause after each fragment is derived from the trailing punctuation of
//! its source text, so sentence ends breathe longer than clause breaks and a
//! fragment cut off mid-phrase barely pauses at all.

use std::time::Duration;

/// Words that signal the sentence continues across the fragment boundary.
const COORDINATING_CONJUNCTIONS: [&str; 7] = ["and", "but", "or", "nor", "for", "so", "yet"];

/// Pause durations; empirically chosen defaults, configurable policy.
#[derive(Debug, Clone, Copy)]
pub struct PauseTiming {
    /// After sentence-ending punctuation.
    pub sentence: Duration,
    /// After a comma or semicolon.
    pub clause: Duration,
    /// After a trailing coordinating conjunction.
    pub conjunction: Duration,
    /// Everything else.
    pub minimal: Duration,
}

impl Default for PauseTiming {
    fn default() -> Self {
        Self {
            sentence: Duration::from_millis(400),
            clause: Duration::from_millis(200),
            conjunction: Duration::from_millis(150),
            minimal: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PausePolicy {
    timing: PauseTiming,
}

impl PausePolicy {
    pub fn new(timing: PauseTiming) -> Self {
        Self { timing }
    }

    /// The pause to insert after a fragment with this source text. The final
    /// fragment of a job never pauses; that is the sequencer's call, not
    /// this policy's.
    pub fn fragment_pause(&self, text: &str) -> Duration {
        let trimmed = text.trim_end();
        match trimmed.chars().last() {
            Some('.') | Some('!') | Some('?') => return self.timing.sentence,
            Some(',') | Some(';') => return self.timing.clause,
            _ => {}
        }
        let last_word = trimmed
            .rsplit(|c: char| c.is_whitespace())
            .next()
            .unwrap_or("")
            .to_lowercase();
        if COORDINATING_CONJUNCTIONS.contains(&last_word.as_str()) {
            self.timing.conjunction
        } else {
            self.timing.minimal
        }
    }
}
