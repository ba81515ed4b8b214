//! Parlor application crate
//!
//! Composition of the conversation pipeline: session provisioning and the
//! signaling channel, the media transport seam, remote synthesis clients,
//! and the turn coordinator that owns all of the shared turn state.

pub mod config;
pub mod console;
pub mod runtime;
pub mod session;
pub mod synth;
pub mod turn;
