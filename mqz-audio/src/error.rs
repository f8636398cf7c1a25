//! Error types for mqz-audio
//!
//! Internal helpers propagate these with `?`. The consumer-facing playback
//! API never returns them: failures are logged and degrade to a cache miss,
//! a no-op, or synthesized speech.

use thiserror::Error;

/// Main error type for mqz-audio
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration or runtime setting errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Static asset fetch over HTTP
    #[error("HTTP fetch error: {0}")]
    Http(#[from] reqwest::Error),

    /// Audio decoding errors (container, codec, base64 payload)
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Resampling errors
    #[error("Resample error: {0}")]
    Resample(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Speech engine errors
    #[error("Speech error: {0}")]
    Speech(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Shared configuration errors
    #[error(transparent)]
    Common(#[from] mqz_common::Error),
}

/// Convenience Result type using mqz-audio Error
pub type Result<T> = std::result::Result<T, Error>;
