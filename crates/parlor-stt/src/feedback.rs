//! Echo/feedback filtering
//!
//! Without hardware echo cancellation, the assistant's own voice can leak
//! from the speakers back into capture and come out as a "user" transcript.
//! The filter is a swappable policy; the stock implementation matches final
//! transcripts against assistant-characteristic phrases. It is a best-effort
//! heuristic: an English phrase list can misclassify legitimate user speech
//! and will miss echo with unseen phrasing.

/// Policy deciding whether a final transcript is the assistant's own voice.
pub trait EchoFilter: Send + Sync {
    /// `true` means discard the transcript instead of dispatching it.
    fn is_probable_echo(&self, transcript: &str) -> bool;
}

/// Case-insensitive substring match against a fixed phrase list.
pub struct PhraseListFilter {
    phrases: Vec<String>,
}

impl PhraseListFilter {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Stock acknowledgement openers and canned error responses the
    /// assistant is known to produce.
    pub fn default_phrases() -> Vec<String> {
        [
            "i'm having trouble processing your request",
            "could you please try again",
            "that's a great question",
            "is there anything else i can help",
            "as an ai assistant",
            "i'm sorry, i didn't catch that",
            "happy to help with that",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl Default for PhraseListFilter {
    fn default() -> Self {
        Self::new(Self::default_phrases())
    }
}

impl EchoFilter for PhraseListFilter {
    fn is_probable_echo(&self, transcript: &str) -> bool {
        let lowered = transcript.to_lowercase();
        self.phrases.iter().any(|p| lowered.contains(p.as_str()))
    }
}

/// Accepts every transcript. Useful where the platform already runs echo
/// cancellation, and in tests.
pub struct NoEchoFilter;

impl EchoFilter for NoEchoFilter {
    fn is_probable_echo(&self, _transcript: &str) -> bool {
        false
    }
}
