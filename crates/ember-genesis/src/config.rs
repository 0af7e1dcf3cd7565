//! The persisted record of an accepted network.

use crate::params::ConsensusRules;
use ember_peer::PeerCandidate;
use serde::{Deserialize, Serialize};

/// Written once genesis is accepted; the rest of the node reads it at
/// startup to decide whether formation is even needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfiguration {
    pub network_id: String,
    pub genesis_hash: String,
    /// Peers that took part in formation.
    pub peers: Vec<PeerCandidate>,
    pub consensus_rules: ConsensusRules,
    /// When the configuration was accepted (unix millis).
    pub created_at: u64,
    /// Participant ids of the founding nodes.
    pub pioneers: Vec<String>,
}

impl NetworkConfiguration {
    /// Whether `node_id` was one of the founding participants.
    #[must_use]
    pub fn is_pioneer(&self, node_id: &str) -> bool {
        self.pioneers.iter().any(|p| p == node_id)
    }
}
