//! Error types for the realtime client

use thiserror::Error;

/// Result type alias for realtime client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the realtime client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or stream error
    #[error("audio error: {0}")]
    Audio(String),

    /// Unusable native audio format (zero or implausible sample rate).
    /// Recording aborts; the session itself survives.
    #[error("audio format fault: {0}")]
    AudioFormat(String),

    /// Transport send/receive failure. Surfaced once; reconnection is the
    /// caller's responsibility.
    #[error("transport error: {0}")]
    Transport(String),

    /// Image decoding or re-encoding error
    #[error("image error: {0}")]
    Image(String),

    /// Session is in the wrong state for the requested operation
    #[error("session state error: {0}")]
    State(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
