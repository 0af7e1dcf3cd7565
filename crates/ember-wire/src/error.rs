//! Error types for ember-wire.

use thiserror::Error;

/// Result type for ember-wire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while framing or validating messages.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying socket failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload was not valid JSON for any known message.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Frame length header exceeded the allowed maximum.
    #[error("frame of {len} bytes exceeds maximum of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// Zero-length frame.
    #[error("empty frame")]
    EmptyFrame,

    /// The peer answered for a different protocol.
    #[error("wrong protocol: expected {expected:?}, got {got:?}")]
    WrongProtocol { expected: String, got: String },
}
