//! Error types for ember-genesis.

use crate::negotiate::Phase;
use thiserror::Error;

/// Result type for ember-genesis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised during genesis negotiation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Formation needs at least two peers besides the local node.
    #[error("insufficient peers: found {found}, need {required}")]
    InsufficientPeers { found: usize, required: usize },

    /// Distribution quorum (≥60% acknowledgments) was not reached.
    #[error("distribution rejected: {acks} of {peers} peers acknowledged")]
    DistributionRejected { acks: usize, peers: usize },

    /// Validation quorum (strict majority agreement) was not reached.
    #[error("validation rejected: {agreed} of {peers} peers agree on the hash")]
    ValidationRejected { agreed: usize, peers: usize },

    /// An operation was called in the wrong phase.
    #[error("invalid phase: expected {expected}, got {actual}")]
    InvalidPhase {
        expected: &'static str,
        actual: Phase,
    },

    /// The negotiation already failed; reset before retrying.
    #[error("negotiation has failed and requires a reset")]
    AlreadyFailed,

    /// No participant carries a wallet address to issue rewards to.
    #[error("no rewardable participants")]
    NoRewardableParticipants,
}

impl Error {
    /// Stable lowercase reason tag for logs and events.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InsufficientPeers { .. } => "insufficient_peers",
            Self::DistributionRejected { .. }
            | Self::ValidationRejected { .. }
            | Self::AlreadyFailed
            | Self::NoRewardableParticipants => "genesis_failure",
            Self::InvalidPhase { .. } => "genesis_failure",
        }
    }
}
