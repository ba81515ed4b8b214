//! Error types for synthesis and playback

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthError {
    /// The streaming synthesis service could not be reached or refused the
    /// request; the fallback chain takes over.
    #[error("streaming synthesis unavailable: {0}")]
    StreamUnavailable(String),

    #[error("single-shot synthesis failed: {0}")]
    SingleShotFailed(String),

    #[error("local synthesis unavailable: {0}")]
    LocalUnavailable(String),

    #[error("local synthesis failed: {0}")]
    LocalFailed(String),

    #[error("audio sink error: {0}")]
    Sink(String),

    #[error("invalid text input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SynthResult<T> = Result<T, SynthError>;
