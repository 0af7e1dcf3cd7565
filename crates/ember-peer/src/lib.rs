//! Peer identity and candidate model.
//!
//! The types here are the currency of network formation: every other crate
//! produces or consumes [`PeerCandidate`] values. Candidates are immutable
//! once captured — re-discovery produces a new candidate that supersedes
//! the old one, it never mutates it in place.

mod attempt;
mod candidate;

pub use attempt::{AttemptLog, AttemptStats, ConnectionAttempt, ATTEMPT_LOG_CAPACITY};
pub use candidate::{now_millis, PeerCandidate};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Capability strings a peer may declare during a handshake.
pub mod capability {
    /// Willing to take part in forming a new network's first block.
    pub const GENESIS: &str = "genesis";
    /// Participates in the network once formed (validation, relaying).
    pub const PARTICIPATE: &str = "participate";
    /// Relays traffic for peers behind restrictive networks.
    pub const RELAY: &str = "relay";
}

/// Unique peer identifier: 16 random bytes, generated once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(pub [u8; 16]);

impl PeerId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Hex representation (32 lowercase hex chars).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}…", &self.to_hex()[..8])
    }
}

impl FromStr for PeerId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| IdentityError::InvalidId(s.to_string()))?;
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for PeerId {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.to_hex()
    }
}

/// Malformed peer identity.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Not 32 hex chars.
    #[error("invalid peer id: {0:?}")]
    InvalidId(String),
}

/// Which network a node participates in.
///
/// The mode gates target selection during scanning: testnet scans private
/// ranges, mainnet must never touch them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    Testnet,
    Mainnet,
}

impl NetworkMode {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Testnet => "testnet",
            Self::Mainnet => "mainnet",
        }
    }
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
