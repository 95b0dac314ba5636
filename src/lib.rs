//! streamsynth - interruptible streaming text-to-speech
//!
//! Turns arbitrary-length text into 16-bit PCM with low time-to-first-sound.
//! Text is cut into short chunks, each chunk is synthesized and played as soon
//! as it is ready, and a new request or a cancel stops the current utterance
//! at the next chunk boundary without ever playing stale audio.

pub mod error;
pub mod platform;
pub mod speech;
pub mod state;

pub use error::{Result, SynthError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "streamsynth";
