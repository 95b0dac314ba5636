//! Error types for streamsynth

use std::io;
use thiserror::Error;

/// Main error type for the synthesis pipeline
#[derive(Error, Debug)]
pub enum SynthError {
    /// Required model or style files are missing or unreadable
    #[error("Asset error: {0}")]
    Asset(String),

    /// A single inference call failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// The audio device is unavailable or a write failed
    #[error("Audio sink error: {0}")]
    Sink(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    /// A setting value outside its allowed range
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for streamsynth operations
pub type Result<T> = std::result::Result<T, SynthError>;

impl From<String> for SynthError {
    fn from(s: String) -> Self {
        SynthError::Other(s)
    }
}

impl From<&str> for SynthError {
    fn from(s: &str) -> Self {
        SynthError::Other(s.to_string())
    }
}
