//! Error taxonomy for the bootstrap lifecycle.
//!
//! Every failure surfaced by a lower component is wrapped with one of
//! five typed reasons before it reaches the state machine or an event
//! subscriber. Local per-attempt failures never appear here — those are
//! absorbed into telemetry by the component that saw them.

use thiserror::Error;

/// Result type for ember-bootstrap operations.
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Subsystem-level bootstrap failures.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// An operation exceeded its deadline. Retryable with backoff.
    #[error("network timeout during {0}")]
    NetworkTimeout(&'static str),

    /// A peer went away mid-exchange. Retryable.
    #[error("peer disconnected: {0}")]
    PeerDisconnection(String),

    /// A peer violated the protocol. Not retryable.
    #[error("invalid peer: {0}")]
    InvalidPeer(String),

    /// Too few qualifying peers. Retryable after a cooldown.
    #[error("insufficient peers: found {found}, need {required}")]
    InsufficientPeers { found: usize, required: usize },

    /// Genesis negotiation failed. Terminal for the attempt; requires an
    /// explicit reset.
    #[error("genesis failure: {0}")]
    Genesis(#[from] ember_genesis::Error),

    /// Local persistence failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted record did not parse.
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl BootstrapError {
    /// Stable lowercase reason tag, matching the event wire names.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NetworkTimeout(_) => "network_timeout",
            Self::PeerDisconnection(_) | Self::Io(_) => "peer_disconnection",
            Self::InvalidPeer(_) | Self::Malformed(_) => "invalid_peer",
            Self::InsufficientPeers { .. } => "insufficient_peers",
            Self::Genesis(inner) => inner.reason(),
        }
    }
}

impl From<ember_discovery::Error> for BootstrapError {
    fn from(e: ember_discovery::Error) -> Self {
        match e {
            ember_discovery::Error::Timeout(what) => Self::NetworkTimeout(what),
            ember_discovery::Error::Io(io) => Self::PeerDisconnection(io.to_string()),
            other => Self::InvalidPeer(other.to_string()),
        }
    }
}

impl From<ember_netmap::Error> for BootstrapError {
    fn from(e: ember_netmap::Error) -> Self {
        match e {
            ember_netmap::Error::Unavailable(what) => Self::PeerDisconnection(what),
            ember_netmap::Error::Io(io) => Self::Io(io),
            ember_netmap::Error::Malformed(json) => Self::Malformed(json),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_stable_tags() {
        assert_eq!(
            BootstrapError::NetworkTimeout("handshake").reason(),
            "network_timeout"
        );
        assert_eq!(
            BootstrapError::InsufficientPeers {
                found: 1,
                required: 2
            }
            .reason(),
            "insufficient_peers"
        );
        assert_eq!(
            BootstrapError::InvalidPeer("bad frame".into()).reason(),
            "invalid_peer"
        );
        // Genesis insufficient-peers keeps its specific reason
        let e = BootstrapError::Genesis(ember_genesis::Error::InsufficientPeers {
            found: 1,
            required: 2,
        });
        assert_eq!(e.reason(), "insufficient_peers");
        let e = BootstrapError::Genesis(ember_genesis::Error::DistributionRejected {
            acks: 1,
            peers: 3,
        });
        assert_eq!(e.reason(), "genesis_failure");
    }
}
