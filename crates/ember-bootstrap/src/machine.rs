//! The bootstrap state machine.
//!
//! One instance per node, and the only writer of [`BootstrapState`].
//! Discovery workers and the negotiation driver report results through
//! its methods; nothing else mutates the state, so transitions are
//! strictly ordered and readers always see a consistent snapshot copy.

use crate::error::BootstrapError;
use crate::event::{Event, EventBus};
use ember_genesis::GenesisBlock;
use ember_peer::{PeerCandidate, PeerId};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{error, info, warn};

/// Features held back until the node reaches `Network`.
pub const RESTRICTED_FEATURES: &[&str] = &[
    "transaction_send",
    "mining",
    "consensus_participation",
    "block_validation",
];

/// Peers that must qualify before genesis formation starts.
pub const REQUIRED_PEERS: usize = 2;

/// Lifecycle mode. Linear; the only way back is [`BootstrapMachine::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// No network exists yet, prerequisites not met.
    Pioneer,
    /// Actively looking for peers.
    Discovery,
    /// Enough peers found; negotiating the genesis block.
    Genesis,
    /// Genesis accepted; full participant.
    Network,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pioneer => "pioneer",
            Self::Discovery => "discovery",
            Self::Genesis => "genesis",
            Self::Network => "network",
        };
        f.write_str(name)
    }
}

/// Snapshot of the machine's state. Cloned out to readers; never handed
/// out by reference.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapState {
    pub mode: Mode,
    pub address: Option<String>,
    pub participation_ready: bool,
    pub discovered_peers: Vec<PeerCandidate>,
    pub genesis_block: Option<GenesisBlock>,
    pub last_error: Option<String>,
}

/// The single-writer lifecycle machine.
pub struct BootstrapMachine {
    state: BootstrapState,
    restricted: HashSet<&'static str>,
    events: EventBus,
}

impl BootstrapMachine {
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self {
            state: BootstrapState {
                mode: Mode::Pioneer,
                address: None,
                participation_ready: false,
                discovered_peers: Vec::new(),
                genesis_block: None,
                last_error: None,
            },
            restricted: RESTRICTED_FEATURES.iter().copied().collect(),
            events,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.state.mode
    }

    /// Snapshot copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> BootstrapState {
        self.state.clone()
    }

    /// Whether a gated feature is currently available.
    #[must_use]
    pub fn is_allowed(&self, feature: &str) -> bool {
        !self.restricted.contains(feature)
    }

    /// Currently restricted features, sorted for stable output.
    #[must_use]
    pub fn restricted_features(&self) -> Vec<&'static str> {
        let mut features: Vec<_> = self.restricted.iter().copied().collect();
        features.sort_unstable();
        features
    }

    /// Set the local participant address. One of the two discovery
    /// prerequisites.
    pub fn set_address(&mut self, address: impl Into<String>) {
        self.state.address = Some(address.into());
        self.try_enter_discovery();
    }

    /// Declare the participation capability. The other prerequisite.
    pub fn set_participation_ready(&mut self) {
        self.state.participation_ready = true;
        self.try_enter_discovery();
    }

    fn try_enter_discovery(&mut self) {
        if self.state.mode == Mode::Pioneer
            && self.state.address.is_some()
            && self.state.participation_ready
        {
            self.transition(Mode::Discovery);
        }
    }

    /// Merge discovery results into state — the single mutation entry
    /// point for concurrent discovery. Returns how many peers were new.
    /// Automatically advances to `Genesis` once enough peers qualify.
    pub fn merge_discovered(&mut self, peers: Vec<PeerCandidate>) -> usize {
        let mut added = 0;
        for peer in peers {
            match self
                .state
                .discovered_peers
                .iter_mut()
                .find(|p| p.id == peer.id)
            {
                Some(existing) => {
                    // Re-discovery supersedes the earlier capture
                    if peer.last_seen >= existing.last_seen {
                        *existing = peer;
                    }
                }
                None => {
                    self.events.emit(Event::PeerDiscovered(peer.clone()));
                    self.state.discovered_peers.push(peer);
                    added += 1;
                }
            }
        }

        if self.state.mode == Mode::Discovery && self.qualifying_peers().len() >= REQUIRED_PEERS {
            self.transition(Mode::Genesis);
        }
        added
    }

    /// Peers eligible for genesis formation, excluding `local` if given.
    #[must_use]
    pub fn qualifying_peers(&self) -> Vec<PeerCandidate> {
        self.state
            .discovered_peers
            .iter()
            .filter(|p| p.qualifies_for_genesis())
            .cloned()
            .collect()
    }

    /// Drop a peer that disconnected or misbehaved.
    pub fn forget_peer(&mut self, id: &PeerId) {
        self.state.discovered_peers.retain(|p| &p.id != id);
    }

    /// Record a completed negotiation: store the block, move to
    /// `Network`, and clear the restricted-feature set.
    pub fn record_genesis_completed(&mut self, network_id: &str, block: GenesisBlock) {
        if self.state.mode != Mode::Genesis {
            warn!(mode = %self.state.mode, "genesis completion outside genesis mode, ignoring");
            return;
        }
        let genesis_hash = block.hash.clone();
        self.state.genesis_block = Some(block);
        self.state.last_error = None;
        self.restricted.clear();
        self.transition(Mode::Network);
        info!(network_id, %genesis_hash, "network formation complete; all features unlocked");
        self.events.emit(Event::GenesisCompleted {
            network_id: network_id.to_string(),
            genesis_hash,
        });
    }

    /// Record a failed negotiation. The machine stays in `Genesis`; only
    /// an explicit [`reset`](Self::reset) goes back.
    pub fn record_genesis_failure(&mut self, err: &BootstrapError) {
        error!(reason = err.reason(), error = %err, "genesis formation failed");
        self.state.last_error = Some(err.to_string());
        self.events.emit(Event::GenesisFailed {
            reason: err.reason(),
            detail: err.to_string(),
        });
    }

    /// Wrap, log, and re-emit a lower-component error. Never swallowed.
    pub fn record_error(&mut self, err: &BootstrapError) {
        error!(reason = err.reason(), error = %err, "bootstrap error");
        self.state.last_error = Some(err.to_string());
        self.events.emit(Event::BootstrapError {
            reason: err.reason(),
            detail: err.to_string(),
        });
    }

    /// Return to `Pioneer`, clearing buffered peers and errors and
    /// restoring the full feature restrictions.
    pub fn reset(&mut self) {
        self.state.discovered_peers.clear();
        self.state.genesis_block = None;
        self.state.last_error = None;
        self.state.participation_ready = false;
        self.restricted = RESTRICTED_FEATURES.iter().copied().collect();
        self.transition(Mode::Pioneer);
    }

    fn transition(&mut self, to: Mode) {
        let from = self.state.mode;
        if from == to {
            return;
        }
        self.state.mode = to;
        info!(%from, %to, "bootstrap mode change");
        self.events.emit(Event::ModeChanged { from, to });
    }
}
