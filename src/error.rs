//! Error types for langspeak

use thiserror::Error;

/// Everything that can go wrong between a submit and the speaker.
#[derive(Error, Debug)]
pub enum SpeakError {
    #[error("Language detection failed: {0}")]
    Detection(String),

    #[error("Speech engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Audio output error: {0}")]
    Audio(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SpeakError>;
