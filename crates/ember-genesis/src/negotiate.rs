//! The genesis negotiation phase machine.
//!
//! Sans-IO: the machine tracks phases, quorums, and the built block; a
//! driver performs the actual network sends and feeds acknowledgments and
//! hash reports back in. That keeps every quorum decision synchronous and
//! unit-testable without sockets.

use crate::block::GenesisBlock;
use crate::config::NetworkConfiguration;
use crate::error::{Error, Result};
use crate::params::{ConsensusRules, GenesisParameters, BASE_REWARD};
use ember_peer::{now_millis, PeerCandidate, PeerId};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Peers required besides the local node before negotiation may begin.
pub const MIN_REMOTE_PEERS: usize = 2;

/// Acknowledgment quorum for distribution, in percent. Exactly this
/// fraction is sufficient.
pub const ACK_QUORUM_PCT: usize = 60;

/// Negotiation phases. One-directional, except that `Distributing` and
/// `Validating` can drop into the terminal `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Negotiating,
    Creating,
    Distributing,
    Validating,
    Completed,
    Failed,
}

impl Phase {
    /// Whether the negotiation can make no further progress.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Negotiating => "negotiating",
            Self::Creating => "creating",
            Self::Distributing => "distributing",
            Self::Validating => "validating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A recorded phase change, drained by the driver and re-emitted as an
/// observable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    /// Unix millis.
    pub at: u64,
}

/// Tunables for a negotiation attempt.
#[derive(Debug, Clone)]
pub struct NegotiationConfig {
    pub base_reward: u64,
    pub rules: ConsensusRules,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            base_reward: BASE_REWARD,
            rules: ConsensusRules::default(),
        }
    }
}

/// Point-in-time view of a negotiation.
#[derive(Debug, Clone, Serialize)]
pub struct NegotiationStatus {
    pub phase: Phase,
    pub peer_count: usize,
    pub network_id: Option<String>,
    pub acks_received: usize,
    pub reports_received: usize,
}

/// One genesis negotiation attempt with a fixed peer set.
#[derive(Debug)]
pub struct GenesisNegotiation {
    local_id: PeerId,
    local_wallet: Option<String>,
    peers: Vec<PeerCandidate>,
    phase: Phase,
    params: Option<GenesisParameters>,
    block: Option<GenesisBlock>,
    /// Peer id (hex) → acknowledged.
    acks: BTreeMap<String, bool>,
    /// Peer id (hex) → reported accepted hash.
    reports: BTreeMap<String, Option<String>>,
    transitions: Vec<PhaseTransition>,
    config: NegotiationConfig,
}

impl GenesisNegotiation {
    /// Begin a negotiation attempt.
    ///
    /// Fails fast with [`Error::InsufficientPeers`] when fewer than
    /// [`MIN_REMOTE_PEERS`] candidates are supplied — block creation is
    /// never attempted for a lone pair.
    pub fn new(
        local_id: PeerId,
        local_wallet: Option<String>,
        peers: Vec<PeerCandidate>,
        config: NegotiationConfig,
    ) -> Result<Self> {
        if peers.len() < MIN_REMOTE_PEERS {
            return Err(Error::InsufficientPeers {
                found: peers.len(),
                required: MIN_REMOTE_PEERS,
            });
        }

        Ok(Self {
            local_id,
            local_wallet,
            peers,
            phase: Phase::Negotiating,
            params: None,
            block: None,
            acks: BTreeMap::new(),
            reports: BTreeMap::new(),
            transitions: Vec::new(),
            config,
        })
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Agreed parameters, once negotiation has run.
    #[must_use]
    pub fn params(&self) -> Option<&GenesisParameters> {
        self.params.as_ref()
    }

    /// The built block, once creation has run.
    #[must_use]
    pub fn block(&self) -> Option<&GenesisBlock> {
        self.block.as_ref()
    }

    /// The remote peers taking part in this attempt.
    #[must_use]
    pub fn peers(&self) -> &[PeerCandidate] {
        &self.peers
    }

    /// Run the negotiating and creating phases: agree on parameters,
    /// build the block, and move to `Distributing`. Returns the block the
    /// driver must now send to every peer.
    pub fn start(&mut self, timestamp: u64) -> Result<&GenesisBlock> {
        self.ensure_phase(Phase::Negotiating, "negotiating")?;

        let mut roster: Vec<(String, Option<String>)> = vec![(
            self.local_id.to_hex(),
            self.local_wallet.clone(),
        )];
        for peer in &self.peers {
            roster.push((peer.id.to_hex(), peer.wallet_address.clone()));
        }

        let params = GenesisParameters::agree(
            &roster,
            timestamp,
            self.config.base_reward,
            self.config.rules.clone(),
        )?;
        self.transition(Phase::Creating);

        debug!(
            network_id = %params.network_id,
            participants = params.participants.len(),
            rewards = params.reward_map.len(),
            "building genesis block"
        );

        let block = GenesisBlock::build(&params);
        self.params = Some(params);
        self.transition(Phase::Distributing);

        Ok(self.block.insert(block))
    }

    /// Record a peer's answer to the distributed block.
    pub fn record_ack(&mut self, peer: &PeerId, accepted: bool) -> Result<()> {
        self.ensure_phase(Phase::Distributing, "distributing")?;
        let key = peer.to_hex();
        if !self.knows_peer(&key) {
            warn!(peer = %peer, "ack from a peer outside the negotiation, ignoring");
            return Ok(());
        }
        self.acks.insert(key, accepted);
        Ok(())
    }

    /// Close the distributing phase. Requires acknowledgments from at
    /// least [`ACK_QUORUM_PCT`] percent of peers — exactly the threshold
    /// is sufficient, one peer short of it is not.
    pub fn finish_distribution(&mut self) -> Result<()> {
        self.ensure_phase(Phase::Distributing, "distributing")?;

        let acks = self.acks.values().filter(|a| **a).count();
        let peers = self.peers.len();

        if acks * 100 >= peers * ACK_QUORUM_PCT {
            self.transition(Phase::Validating);
            Ok(())
        } else {
            self.transition(Phase::Failed);
            Err(Error::DistributionRejected { acks, peers })
        }
    }

    /// Record a peer's view of the accepted genesis hash.
    pub fn record_hash_report(&mut self, peer: &PeerId, hash: Option<String>) -> Result<()> {
        self.ensure_phase(Phase::Validating, "validating")?;
        let key = peer.to_hex();
        if !self.knows_peer(&key) {
            warn!(peer = %peer, "hash report from a peer outside the negotiation, ignoring");
            return Ok(());
        }
        self.reports.insert(key, hash);
        Ok(())
    }

    /// Close the validating phase. Requires a strict majority (>50%) of
    /// peers to agree on the local block hash; an exact half is rejected.
    pub fn finish_validation(&mut self) -> Result<NetworkConfiguration> {
        self.ensure_phase(Phase::Validating, "validating")?;

        // Both exist past start(); Validating is unreachable otherwise
        let (Some(block), Some(params)) = (&self.block, &self.params) else {
            return Err(Error::InvalidPhase {
                expected: "validating",
                actual: self.phase,
            });
        };

        let local_hash = block.hash.clone();
        let network_id = params.network_id.clone();
        let consensus_rules = params.consensus_rules.clone();
        let pioneers = params.participants.clone();

        let agreed = self
            .reports
            .values()
            .filter(|h| h.as_deref() == Some(local_hash.as_str()))
            .count();
        let peers = self.peers.len();

        if agreed * 2 > peers {
            self.transition(Phase::Completed);
            Ok(NetworkConfiguration {
                network_id,
                genesis_hash: local_hash,
                peers: self.peers.clone(),
                consensus_rules,
                created_at: now_millis(),
                pioneers,
            })
        } else {
            self.transition(Phase::Failed);
            Err(Error::ValidationRejected { agreed, peers })
        }
    }

    /// Drop back to `Negotiating`, clearing all buffered results. The only
    /// way out of `Failed`.
    pub fn reset(&mut self) {
        self.transition(Phase::Negotiating);
        self.params = None;
        self.block = None;
        self.acks.clear();
        self.reports.clear();
    }

    /// Phase changes recorded since the last drain, oldest first.
    pub fn drain_transitions(&mut self) -> Vec<PhaseTransition> {
        std::mem::take(&mut self.transitions)
    }

    /// Point-in-time snapshot for status queries.
    #[must_use]
    pub fn status(&self) -> NegotiationStatus {
        NegotiationStatus {
            phase: self.phase,
            peer_count: self.peers.len(),
            network_id: self.params.as_ref().map(|p| p.network_id.clone()),
            acks_received: self.acks.len(),
            reports_received: self.reports.len(),
        }
    }

    fn knows_peer(&self, id_hex: &str) -> bool {
        self.peers.iter().any(|p| p.id.to_hex() == id_hex)
    }

    fn ensure_phase(&self, expected: Phase, name: &'static str) -> Result<()> {
        if self.phase == Phase::Failed {
            return Err(Error::AlreadyFailed);
        }
        if self.phase != expected {
            return Err(Error::InvalidPhase {
                expected: name,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn transition(&mut self, to: Phase) {
        let from = self.phase;
        self.phase = to;
        self.transitions.push(PhaseTransition {
            from,
            to,
            at: now_millis(),
        });
        debug!(%from, %to, "genesis phase change");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_peer::{capability, NetworkMode};
    use std::collections::HashSet;

    fn peer(n: u8) -> PeerCandidate {
        let mut caps = HashSet::new();
        caps.insert(capability::GENESIS.to_string());
        PeerCandidate {
            id: PeerId::from_bytes([n; 16]),
            addr: "127.0.0.1".parse().unwrap(),
            port: 8330 + n as u16,
            wallet_address: Some(format!("wx1peer{n}")),
            mode: NetworkMode::Testnet,
            ready: true,
            capabilities: caps,
            last_seen: now_millis(),
        }
    }

    fn peers(count: u8) -> Vec<PeerCandidate> {
        (1..=count).map(peer).collect()
    }

    fn negotiation(count: u8) -> GenesisNegotiation {
        GenesisNegotiation::new(
            PeerId::from_bytes([0; 16]),
            Some("wx1local".to_string()),
            peers(count),
            NegotiationConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn one_peer_fails_fast() {
        let err = GenesisNegotiation::new(
            PeerId::from_bytes([0; 16]),
            None,
            peers(1),
            NegotiationConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientPeers {
                found: 1,
                required: MIN_REMOTE_PEERS
            }
        );
        assert_eq!(err.reason(), "insufficient_peers");
    }

    #[test]
    fn start_builds_a_verifiable_block_and_distributes() {
        let mut n = negotiation(3);
        let block = n.start(1_700_000_000_000).unwrap().clone();
        assert!(block.verify());
        assert_eq!(n.phase(), Phase::Distributing);

        // 4 participants (local + 3), all funded
        assert_eq!(n.params().unwrap().participants.len(), 4);
        assert_eq!(block.transactions.len(), 4);

        let transitions: Vec<(Phase, Phase)> = n
            .drain_transitions()
            .into_iter()
            .map(|t| (t.from, t.to))
            .collect();
        assert_eq!(
            transitions,
            vec![
                (Phase::Negotiating, Phase::Creating),
                (Phase::Creating, Phase::Distributing),
            ]
        );
    }

    #[test]
    fn independent_nodes_build_identical_blocks() {
        let ts = 1_700_000_000_000;
        // Node A negotiates with B and C; node B negotiates with A and C.
        // Same participant set, same timestamp → same network id and block.
        let a_local = PeerId::from_bytes([1; 16]);
        let b_local = PeerId::from_bytes([2; 16]);

        let mut from_a = GenesisNegotiation::new(
            a_local,
            Some("wx1peer1".to_string()),
            vec![peer(2), peer(3)],
            NegotiationConfig::default(),
        )
        .unwrap();
        let mut from_b = GenesisNegotiation::new(
            b_local,
            Some("wx1peer2".to_string()),
            vec![peer(1), peer(3)],
            NegotiationConfig::default(),
        )
        .unwrap();

        let block_a = from_a.start(ts).unwrap().clone();
        let block_b = from_b.start(ts).unwrap().clone();

        assert_eq!(block_a, block_b);
        assert_eq!(
            from_a.params().unwrap().network_id,
            from_b.params().unwrap().network_id
        );
    }

    #[test]
    fn distribution_accepts_exact_quorum() {
        // 5 peers, 3 acks = exactly 60%
        let mut n = negotiation(5);
        n.start(1000).unwrap();
        for i in 1..=3u8 {
            n.record_ack(&PeerId::from_bytes([i; 16]), true).unwrap();
        }
        assert!(n.finish_distribution().is_ok());
        assert_eq!(n.phase(), Phase::Validating);
    }

    #[test]
    fn distribution_rejects_one_short_of_quorum() {
        // 100 peers, 59 acks = 59% — one short
        let mut n = GenesisNegotiation::new(
            PeerId::from_bytes([0; 16]),
            Some("wx1local".to_string()),
            (1..=100)
                .map(|i| {
                    let mut p = peer((i % 250) as u8);
                    p.id = PeerId::from_bytes([i as u8, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
                    p.wallet_address = Some(format!("wx1p{i}"));
                    p
                })
                .collect(),
            NegotiationConfig::default(),
        )
        .unwrap();
        n.start(1000).unwrap();
        for i in 1..=59u8 {
            n.record_ack(
                &PeerId::from_bytes([i, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
                true,
            )
            .unwrap();
        }
        let err = n.finish_distribution().unwrap_err();
        assert_eq!(
            err,
            Error::DistributionRejected {
                acks: 59,
                peers: 100
            }
        );
        assert_eq!(n.phase(), Phase::Failed);
    }

    #[test]
    fn negative_acks_do_not_count() {
        let mut n = negotiation(3);
        n.start(1000).unwrap();
        n.record_ack(&PeerId::from_bytes([1; 16]), true).unwrap();
        n.record_ack(&PeerId::from_bytes([2; 16]), false).unwrap();
        n.record_ack(&PeerId::from_bytes([3; 16]), false).unwrap();
        // 1 of 3 = 33% < 60%
        assert!(n.finish_distribution().is_err());
    }

    #[test]
    fn validation_rejects_exact_half() {
        // 4 peers, 2 agree = exactly 50% — rejected
        let mut n = negotiation(4);
        let hash = n.start(1000).unwrap().hash.clone();
        for i in 1..=4u8 {
            n.record_ack(&PeerId::from_bytes([i; 16]), true).unwrap();
        }
        n.finish_distribution().unwrap();

        n.record_hash_report(&PeerId::from_bytes([1; 16]), Some(hash.clone()))
            .unwrap();
        n.record_hash_report(&PeerId::from_bytes([2; 16]), Some(hash))
            .unwrap();
        n.record_hash_report(&PeerId::from_bytes([3; 16]), Some("deadbeef".to_string()))
            .unwrap();
        n.record_hash_report(&PeerId::from_bytes([4; 16]), None)
            .unwrap();

        let err = n.finish_validation().unwrap_err();
        assert_eq!(err, Error::ValidationRejected { agreed: 2, peers: 4 });
        assert_eq!(n.phase(), Phase::Failed);
    }

    #[test]
    fn validation_accepts_majority_of_odd_count() {
        // 3 peers, 2 agree = 66% — accepted
        let mut n = negotiation(3);
        let hash = n.start(1000).unwrap().hash.clone();
        for i in 1..=3u8 {
            n.record_ack(&PeerId::from_bytes([i; 16]), true).unwrap();
        }
        n.finish_distribution().unwrap();

        n.record_hash_report(&PeerId::from_bytes([1; 16]), Some(hash.clone()))
            .unwrap();
        n.record_hash_report(&PeerId::from_bytes([2; 16]), Some(hash.clone()))
            .unwrap();
        n.record_hash_report(&PeerId::from_bytes([3; 16]), None)
            .unwrap();

        let config = n.finish_validation().unwrap();
        assert_eq!(n.phase(), Phase::Completed);
        assert_eq!(config.genesis_hash, hash);
        assert_eq!(config.peers.len(), 3);
        assert_eq!(config.pioneers.len(), 4);
        assert!(config.is_pioneer(&PeerId::from_bytes([0; 16]).to_hex()));
    }

    #[test]
    fn failed_is_terminal_until_reset() {
        let mut n = negotiation(3);
        n.start(1000).unwrap();
        // No acks at all
        assert!(n.finish_distribution().is_err());
        assert_eq!(n.phase(), Phase::Failed);

        // Everything else is refused
        assert_eq!(
            n.record_ack(&PeerId::from_bytes([1; 16]), true),
            Err(Error::AlreadyFailed)
        );
        assert_eq!(n.finish_distribution().unwrap_err(), Error::AlreadyFailed);
        assert!(matches!(n.finish_validation(), Err(Error::AlreadyFailed)));

        // Reset returns to the beginning
        n.reset();
        assert_eq!(n.phase(), Phase::Negotiating);
        assert!(n.block().is_none());
        assert!(n.start(2000).is_ok());
    }

    #[test]
    fn unknown_peer_results_are_ignored() {
        let mut n = negotiation(2);
        n.start(1000).unwrap();
        n.record_ack(&PeerId::from_bytes([99; 16]), true).unwrap();
        n.record_ack(&PeerId::from_bytes([1; 16]), true).unwrap();
        n.record_ack(&PeerId::from_bytes([2; 16]), true).unwrap();
        assert_eq!(n.status().acks_received, 2);
    }

    #[test]
    fn phase_order_is_one_directional() {
        let mut n = negotiation(2);
        // Can't validate before distributing
        assert!(matches!(
            n.finish_validation(),
            Err(Error::InvalidPhase { .. })
        ));
        n.start(1000).unwrap();
        // Can't start twice
        assert!(matches!(n.start(1000), Err(Error::InvalidPhase { .. })));
    }
}
