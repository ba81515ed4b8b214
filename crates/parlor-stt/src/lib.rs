//! Speech-capture abstraction layer for Parlor
//!
//! The platform speech-capture capability is a collaborator with a fixed
//! contract: start/stop, plus start acknowledgement, interim/final results,
//! error, and end-of-stream events. This crate defines that contract, the
//! transcript debouncer that turns bursts of final results into a single
//! dispatch, and the pluggable echo filter that guards against the
//! assistant's own voice leaking back in as a user utterance.

pub mod capture;
pub mod debounce;
pub mod feedback;
pub mod types;

pub use capture::*;
pub use debounce::*;
pub use feedback::*;
pub use types::*;
