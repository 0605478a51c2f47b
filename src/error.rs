//! Error types for the patter engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone access denied or device unavailable
    #[error("microphone unavailable: {0}")]
    PermissionDenied(String),

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Transcription error
    #[error("transcription error: {0}")]
    Stt(String),

    /// Speech synthesis error
    #[error("speech synthesis error: {0}")]
    Tts(String),

    /// Transient backend failure (5xx or network); retried once
    #[error("transient service error: {0}")]
    Transient(String),

    /// Terminal backend failure for the current turn
    #[error("service error: {0}")]
    Terminal(String),

    /// Rate limit response; surfaced verbatim to the user
    #[error("{0}")]
    RateLimited(String),

    /// Unparseable command payload or undersized audio; discarded silently
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Host platform affordance failure
    #[error("host error: {0}")]
    Host(String),

    /// Session persistence error
    #[error("session error: {0}")]
    Session(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this failure qualifies for the single-retry policy
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
