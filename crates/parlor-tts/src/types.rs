//! Core types for synthesis jobs and their audio fragments

use parlor_protocol::SynthesisChunk;

/// Identity of one assistant utterance being converted to audio.
pub type JobId = u64;

/// Lifecycle of a synthesis job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisStatus {
    Pending,
    Streaming,
    Playing,
    Completed,
    Failed,
}

/// One decoded chunk of synthesized audio belonging to a job.
///
/// Fragments are played strictly in ordinal order even when they arrive out
/// of order. `text` is the source slice the chunk was synthesized from; it
/// drives the inter-fragment pause heuristic only.
#[derive(Debug, Clone)]
pub struct AudioFragment {
    pub index: u32,
    pub total: u32,
    pub text: String,
    pub payload: Vec<u8>,
    /// A per-fragment synthesis or decode failure. The fragment is skipped
    /// during playback but still counts toward completion.
    pub error: Option<String>,
}

impl AudioFragment {
    /// Decode a wire record into a playable fragment. A record-level error
    /// or an undecodable payload yields a fragment that will be skipped.
    pub fn from_chunk(chunk: &SynthesisChunk) -> Self {
        let (payload, error) = match &chunk.error {
            Some(e) => (Vec::new(), Some(e.clone())),
            None => match chunk.decode_audio() {
                Ok(bytes) => (bytes, None),
                Err(e) => (Vec::new(), Some(format!("undecodable audio: {}", e))),
            },
        };
        Self {
            index: chunk.chunk_index,
            total: chunk.total_chunks,
            text: chunk.text.clone(),
            payload,
            error,
        }
    }

    pub fn is_playable(&self) -> bool {
        self.error.is_none() && !self.payload.is_empty()
    }
}
