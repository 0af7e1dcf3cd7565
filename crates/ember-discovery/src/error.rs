//! Error types for ember-discovery.

use thiserror::Error;

/// Result type for ember-discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a single probe failed.
#[derive(Debug, Error)]
pub enum Error {
    /// The socket operation did not complete in time. Retryable.
    #[error("timed out during {0}")]
    Timeout(&'static str),

    /// Connect or read/write failure. Retryable.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer answered, but wrongly. Not retryable: a peer that
    /// violates the protocol once is discarded, not retried.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ember_wire::Error),

    /// The peer answered with an unexpected message type.
    #[error("expected a handshake response, got {0}")]
    UnexpectedMessage(&'static str),

    /// The peer declared a different network mode than ours.
    #[error("network mode mismatch: peer is on {0}")]
    ModeMismatch(ember_peer::NetworkMode),

    /// We reached our own listener.
    #[error("connected to self")]
    SelfConnection,
}

impl Error {
    /// Whether the failure is worth another attempt with backoff.
    /// Protocol violations and self-connections are terminal for the
    /// target.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Io(_) => true,
            Self::Protocol(ember_wire::Error::Io(_)) => true,
            Self::Protocol(_) | Self::UnexpectedMessage(_) | Self::ModeMismatch(_) => false,
            Self::SelfConnection => false,
        }
    }
}
