//! Discovered peer candidates.

use crate::{capability, NetworkMode, PeerId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time as unix milliseconds.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A peer discovered by scanning or supplied by the coordinator map.
///
/// Immutable once captured. A later discovery of the same peer produces a
/// new candidate with a fresher `last_seen`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerCandidate {
    /// The peer's self-reported identifier.
    pub id: PeerId,

    /// Network address the peer was reached at.
    pub addr: IpAddr,

    /// TCP port the peer listens on.
    pub port: u16,

    /// Wallet address rewards would be issued to, if the peer declared one.
    pub wallet_address: Option<String>,

    /// Which network the peer declared.
    pub mode: NetworkMode,

    /// Whether the peer declared itself ready to participate.
    pub ready: bool,

    /// Capability strings the peer declared.
    pub capabilities: HashSet<String>,

    /// When this candidate was captured (unix millis).
    pub last_seen: u64,
}

impl PeerCandidate {
    /// Socket address of the peer.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }

    /// Whether the peer declared a capability.
    #[must_use]
    pub fn has_capability(&self, cap: &str) -> bool {
        self.capabilities.contains(cap)
    }

    /// A candidate qualifies for genesis formation when it is ready,
    /// declares the genesis capability, and has somewhere to send rewards.
    #[must_use]
    pub fn qualifies_for_genesis(&self) -> bool {
        self.ready && self.has_capability(capability::GENESIS) && self.wallet_address.is_some()
    }

    /// Whether the candidate was seen within `window` of `now` (unix ms).
    #[must_use]
    pub fn seen_within(&self, window: Duration, now: u64) -> bool {
        now.saturating_sub(self.last_seen) <= window.as_millis() as u64
    }
}

impl std::fmt::Display for PeerCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {}:{} ({}{})",
            self.id,
            self.addr,
            self.port,
            self.mode,
            if self.ready { ", ready" } else { "" }
        )
    }
}
