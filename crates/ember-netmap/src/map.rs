//! The network map model.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Freshness bound for coordinator-sourced maps.
pub const COORDINATOR_FRESHNESS: Duration = Duration::from_secs(24 * 60 * 60);

/// Freshness bound for cached and degraded maps.
pub const FALLBACK_FRESHNESS: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Below this many active nodes the network counts as bootstrap-phase.
pub const PIONEER_NODE_THRESHOLD: u32 = 5;

/// Where a map came from. Trust decreases top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Fetched live from the coordinator.
    Coordinator,
    /// Reloaded from the local snapshot.
    Cached,
    /// Synthesized locally because nothing better was available.
    Degraded,
}

/// One known node in the map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapNode {
    pub id: String,
    pub addr: IpAddr,
    pub port: u16,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Coordinator-measured round trip, when it has one.
    pub latency_ms: Option<u64>,
    /// Fraction of keepalives answered, 0–100.
    pub uptime_pct: Option<f64>,
    pub peer_count: Option<u32>,
    /// Actively participating in consensus right now.
    pub participating: bool,
    pub wallet_address: Option<String>,
    /// When the coordinator last heard from it (unix millis).
    pub last_seen: u64,
}

/// Snapshot of known active nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkMap {
    /// When the map was produced (unix millis).
    pub timestamp: u64,
    pub active_nodes: u32,
    pub genesis_nodes: u32,
    pub candidates: Vec<MapNode>,
    pub provenance: Provenance,
    /// The map itself declares the network to be forming.
    pub bootstrap_implied: bool,
}

/// Coarse classification of network maturity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPhase {
    Bootstrap,
    Growing,
    Established,
}

/// Health summary derived from a map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetworkHealth {
    pub active_nodes: u32,
    pub genesis_nodes: u32,
    pub phase: NetworkPhase,
    /// Genesis nodes per active node, 0.0 when the map is empty.
    pub genesis_ratio: f64,
}

impl NetworkMap {
    /// Synthesize the degraded map used when no usable map exists: a
    /// single implied node (ourselves) and an explicit bootstrap flag, so
    /// the node can still attempt pioneer formation instead of halting.
    #[must_use]
    pub fn degraded(now: u64) -> Self {
        Self {
            timestamp: now,
            active_nodes: 1,
            genesis_nodes: 0,
            candidates: Vec::new(),
            provenance: Provenance::Degraded,
            bootstrap_implied: true,
        }
    }

    /// Age relative to `now` (unix millis); zero if timestamped ahead.
    #[must_use]
    pub fn age(&self, now: u64) -> Duration {
        Duration::from_millis(now.saturating_sub(self.timestamp))
    }

    /// Provenance-dependent freshness bound.
    #[must_use]
    pub const fn freshness_bound(&self) -> Duration {
        match self.provenance {
            Provenance::Coordinator => COORDINATOR_FRESHNESS,
            Provenance::Cached | Provenance::Degraded => FALLBACK_FRESHNESS,
        }
    }

    /// Whether the map is within its freshness bound at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: u64) -> bool {
        self.age(now) <= self.freshness_bound()
    }

    /// A map is usable when fresh and, if degraded, only with the
    /// caller's explicit acknowledgment.
    #[must_use]
    pub fn usable(&self, now: u64, accept_degraded: bool) -> bool {
        if self.provenance == Provenance::Degraded && !accept_degraded {
            return false;
        }
        self.is_fresh(now)
    }

    /// Pioneer eligibility: a node may help form a new network when the
    /// population is tiny, nothing has a genesis yet, or the map itself
    /// says the network is bootstrapping.
    #[must_use]
    pub fn is_pioneer_phase(&self) -> bool {
        self.active_nodes < PIONEER_NODE_THRESHOLD
            || self.genesis_nodes == 0
            || self.bootstrap_implied
    }

    /// Health summary.
    #[must_use]
    pub fn health(&self) -> NetworkHealth {
        let phase = if self.is_pioneer_phase() {
            NetworkPhase::Bootstrap
        } else if self.active_nodes < 50 {
            NetworkPhase::Growing
        } else {
            NetworkPhase::Established
        };
        let genesis_ratio = if self.active_nodes == 0 {
            0.0
        } else {
            f64::from(self.genesis_nodes) / f64::from(self.active_nodes)
        };
        NetworkHealth {
            active_nodes: self.active_nodes,
            genesis_nodes: self.genesis_nodes,
            phase,
            genesis_ratio,
        }
    }
}
