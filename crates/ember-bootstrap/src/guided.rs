//! Guided bootstrap: coordinator-ranked connections before brute force.
//!
//! Candidates from the network map are scored by a weighted blend of
//! geographic proximity and measured latency, with small bonuses for
//! uptime, peer count, and active participation. Connections go out in
//! score order, in bounded batches, stopping the moment enough succeed.
//! Only when guided attempts come up short does the scanner take over.

use crate::error::{BootstrapError, Result};
use ember_discovery::{probe, LocalIdentity, ScanOutcome, Scanner};
use ember_netmap::{MapNode, MapValidator};
use ember_peer::{
    now_millis, AttemptLog, AttemptStats, ConnectionAttempt, PeerCandidate,
};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Weight of normalized geographic proximity in the candidate score.
pub const PROXIMITY_WEIGHT: f64 = 0.7;

/// Weight of normalized latency in the candidate score.
pub const LATENCY_WEIGHT: f64 = 0.3;

/// Candidates last seen beyond this window are rejected before any
/// connection is attempted.
pub const STALENESS_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Distance at which proximity contributes nothing (half the planet).
const MAX_SCORING_DISTANCE_KM: f64 = 20_000.0;

/// Latency at which the latency term contributes nothing.
const MAX_SCORING_LATENCY_MS: f64 = 1_000.0;

const UPTIME_BONUS: f64 = 0.05;
const PEER_COUNT_BONUS: f64 = 0.03;
const PARTICIPATION_BONUS: f64 = 0.05;

/// Great-circle distance between two coordinates, in kilometers.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Tunables for guided bootstrap.
#[derive(Debug, Clone)]
pub struct GuidedConfig {
    /// Successful connections that end the guided phase.
    pub required: usize,
    /// Connection attempts issued per batch.
    pub batch_size: usize,
    /// Wait before falling back to the scanner.
    pub cooldown: Duration,
    /// Map radius requested from the coordinator.
    pub radius_km: f64,
    /// Maximum candidates requested from the coordinator.
    pub max_nodes: u32,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
    /// Whether a degraded map is acknowledged and acted on.
    pub accept_degraded: bool,
    /// Local coordinates, when known, for proximity scoring.
    pub local_position: Option<(f64, f64)>,
}

impl Default for GuidedConfig {
    fn default() -> Self {
        Self {
            required: 2,
            batch_size: 8,
            cooldown: Duration::from_secs(2),
            radius_km: 500.0,
            max_nodes: 50,
            connect_timeout: Duration::from_millis(400),
            io_timeout: Duration::from_secs(2),
            accept_degraded: true,
            local_position: None,
        }
    }
}

/// The guided bootstrap coordinator.
pub struct GuidedBootstrap {
    validator: MapValidator,
    scanner: Scanner,
    identity: LocalIdentity,
    config: GuidedConfig,
    attempts: Mutex<AttemptLog>,
}

impl GuidedBootstrap {
    #[must_use]
    pub fn new(
        validator: MapValidator,
        scanner: Scanner,
        identity: LocalIdentity,
        config: GuidedConfig,
    ) -> Self {
        Self {
            validator,
            scanner,
            identity,
            config,
            attempts: Mutex::new(AttemptLog::new()),
        }
    }

    /// Success rate and mean latency over recorded attempts.
    #[must_use]
    pub fn attempt_stats(&self) -> AttemptStats {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .stats()
    }

    /// Snapshot of the recorded attempts, oldest first.
    #[must_use]
    pub fn attempts(&self) -> Vec<ConnectionAttempt> {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }

    /// Score a map candidate. Higher is better; range roughly [0, 1.13].
    #[must_use]
    pub fn score(&self, node: &MapNode) -> f64 {
        let proximity = match (self.config.local_position, node.latitude, node.longitude) {
            (Some((lat, lon)), Some(n_lat), Some(n_lon)) => {
                let distance = haversine_km(lat, lon, n_lat, n_lon);
                1.0 - (distance / MAX_SCORING_DISTANCE_KM).min(1.0)
            }
            // Unknown position: neutral, neither favored nor punished
            _ => 0.5,
        };

        let latency = match node.latency_ms {
            Some(ms) => 1.0 - (ms as f64 / MAX_SCORING_LATENCY_MS).min(1.0),
            None => 0.5,
        };

        let mut score = PROXIMITY_WEIGHT * proximity + LATENCY_WEIGHT * latency;
        if node.uptime_pct.is_some_and(|u| u >= 99.0) {
            score += UPTIME_BONUS;
        }
        if node.peer_count.is_some_and(|c| c >= 8) {
            score += PEER_COUNT_BONUS;
        }
        if node.participating {
            score += PARTICIPATION_BONUS;
        }
        score
    }

    /// Pre-connection rejection: own id, unusable address shape, or
    /// stale beyond [`STALENESS_WINDOW`].
    fn eligible(&self, node: &MapNode, now: u64) -> bool {
        if node.id == self.identity.node_id.to_hex() {
            return false;
        }
        if node.port == 0 || node.addr.is_unspecified() {
            return false;
        }
        now.saturating_sub(node.last_seen) <= STALENESS_WINDOW.as_millis() as u64
    }

    /// Run guided bootstrap: map → score → prioritized batches → scanner
    /// fallback. Errors with `insufficient_peers` only after both
    /// strategies come up short.
    pub async fn bootstrap(&self) -> Result<Vec<PeerCandidate>> {
        let map = self
            .validator
            .fetch_validated_map(self.config.radius_km, self.config.max_nodes)
            .await;

        let now = now_millis();
        let mut peers = Vec::new();

        if map.usable(now, self.config.accept_degraded) {
            let mut ranked: Vec<(f64, &MapNode)> = map
                .candidates
                .iter()
                .filter(|n| self.eligible(n, now))
                .map(|n| (self.score(n), n))
                .collect();
            ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

            let health = map.health();
            info!(
                candidates = ranked.len(),
                network_phase = ?health.phase,
                active_nodes = health.active_nodes,
                "guided bootstrap starting"
            );
            peers = self.attempt_ranked(&ranked).await;
        } else {
            warn!(provenance = ?map.provenance, "network map unusable, skipping guided phase");
        }

        if peers.len() >= self.config.required {
            return Ok(peers);
        }

        // Guided came up short: cool down, then brute force
        debug!(
            found = peers.len(),
            required = self.config.required,
            cooldown = ?self.config.cooldown,
            "guided attempts insufficient, falling back to scanner"
        );
        tokio::time::sleep(self.config.cooldown).await;

        let ScanOutcome { candidates, .. } = self.scanner.scan().await;
        for candidate in candidates {
            if !peers.iter().any(|p: &PeerCandidate| p.id == candidate.id) {
                peers.push(candidate);
            }
        }

        if peers.len() >= self.config.required {
            Ok(peers)
        } else {
            Err(BootstrapError::InsufficientPeers {
                found: peers.len(),
                required: self.config.required,
            })
        }
    }

    /// Attempt ranked candidates in batches, early-stopping at the
    /// required count. Every attempt lands in the telemetry log.
    async fn attempt_ranked(&self, ranked: &[(f64, &MapNode)]) -> Vec<PeerCandidate> {
        let mut peers: Vec<PeerCandidate> = Vec::new();

        for batch in ranked.chunks(self.config.batch_size.max(1)) {
            let probes = batch.iter().map(|(score, node)| {
                let addr = std::net::SocketAddr::new(node.addr, node.port);
                let identity = &self.identity;
                async move {
                    let started = Instant::now();
                    let outcome = probe(
                        addr,
                        identity,
                        self.config.connect_timeout,
                        self.config.io_timeout,
                    )
                    .await;
                    (*score, addr, started.elapsed(), outcome)
                }
            });

            for (score, addr, elapsed, outcome) in futures::future::join_all(probes).await {
                let latency_ms = elapsed.as_millis() as u64;
                match outcome {
                    Ok(candidate) => {
                        debug!(peer = %candidate, score, latency_ms, "guided connection succeeded");
                        self.record_attempt(ConnectionAttempt {
                            candidate_id: Some(candidate.id),
                            addr: addr.ip(),
                            port: addr.port(),
                            success: true,
                            error: None,
                            latency_ms,
                            timestamp: now_millis(),
                        });
                        if !peers.iter().any(|p| p.id == candidate.id) {
                            peers.push(candidate);
                        }
                    }
                    Err(e) => {
                        self.record_attempt(ConnectionAttempt {
                            candidate_id: None,
                            addr: addr.ip(),
                            port: addr.port(),
                            success: false,
                            error: Some(e.to_string()),
                            latency_ms,
                            timestamp: now_millis(),
                        });
                    }
                }
            }

            if peers.len() >= self.config.required {
                break;
            }
        }

        peers
    }

    fn record_attempt(&self, attempt: ConnectionAttempt) {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(attempt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_discovery::ScannerConfig;
    use ember_netmap::{HttpCoordinator, MapStore};
    use ember_peer::{capability, NetworkMode, PeerId};

    fn identity() -> LocalIdentity {
        LocalIdentity {
            node_id: PeerId::from_bytes([1; 16]),
            mode: NetworkMode::Testnet,
            capabilities: vec![capability::GENESIS.to_string()],
            wallet_address: Some("wx1local".to_string()),
            ready: true,
        }
    }

    fn map_node(id: &str) -> MapNode {
        MapNode {
            id: id.to_string(),
            addr: "203.0.113.10".parse().unwrap(),
            port: 8330,
            latitude: None,
            longitude: None,
            latency_ms: None,
            uptime_pct: None,
            peer_count: None,
            participating: false,
            wallet_address: None,
            last_seen: now_millis(),
        }
    }

    fn guided(dir: &std::path::Path, config: GuidedConfig) -> GuidedBootstrap {
        let validator = MapValidator::new(
            HttpCoordinator::new("http://127.0.0.1:9", Duration::from_millis(100)).unwrap(),
            MapStore::open(dir).unwrap(),
        );
        let scanner = Scanner::new(
            ScannerConfig {
                ports: Vec::new(),
                scan_timeout: Duration::from_secs(2),
                ..ScannerConfig::default()
            },
            identity(),
        );
        GuidedBootstrap::new(validator, scanner, identity(), config)
    }

    #[test]
    fn haversine_known_distances() {
        // London → Paris is ~344 km
        let d = haversine_km(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((300.0..400.0).contains(&d), "got {d}");
        // Same point → 0
        assert!(haversine_km(10.0, 20.0, 10.0, 20.0) < 1e-9);
    }

    #[test]
    fn closer_faster_candidates_score_higher() {
        let dir = tempfile::tempdir().unwrap();
        let g = guided(
            dir.path(),
            GuidedConfig {
                local_position: Some((52.0, 13.0)),
                ..GuidedConfig::default()
            },
        );

        let mut near = map_node("near");
        near.latitude = Some(52.5);
        near.longitude = Some(13.4);
        near.latency_ms = Some(20);

        let mut far = map_node("far");
        far.latitude = Some(-33.9);
        far.longitude = Some(151.2);
        far.latency_ms = Some(400);

        assert!(g.score(&near) > g.score(&far));
    }

    #[test]
    fn bonuses_are_additive() {
        let dir = tempfile::tempdir().unwrap();
        let g = guided(dir.path(), GuidedConfig::default());

        let plain = map_node("plain");
        let mut decorated = map_node("decorated");
        decorated.uptime_pct = Some(99.9);
        decorated.peer_count = Some(12);
        decorated.participating = true;

        let delta = g.score(&decorated) - g.score(&plain);
        assert!(
            (delta - (UPTIME_BONUS + PEER_COUNT_BONUS + PARTICIPATION_BONUS)).abs() < 1e-9,
            "delta {delta}"
        );
    }

    #[test]
    fn eligibility_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let g = guided(dir.path(), GuidedConfig::default());
        let now = now_millis();

        // Own id
        let mut own = map_node("x");
        own.id = PeerId::from_bytes([1; 16]).to_hex();
        assert!(!g.eligible(&own, now));

        // Bad address shape
        let mut bad_port = map_node("p");
        bad_port.port = 0;
        assert!(!g.eligible(&bad_port, now));
        let mut unspecified = map_node("u");
        unspecified.addr = "0.0.0.0".parse().unwrap();
        assert!(!g.eligible(&unspecified, now));

        // Staleness boundary: 29 min is fine, 31 min is not
        let mut fresh = map_node("f");
        fresh.last_seen = now - 29 * 60 * 1000;
        assert!(g.eligible(&fresh, now));
        let mut stale = map_node("s");
        stale.last_seen = now - 31 * 60 * 1000;
        assert!(!g.eligible(&stale, now));
    }

    #[tokio::test]
    async fn unreachable_everything_is_insufficient_peers() {
        let dir = tempfile::tempdir().unwrap();
        let g = guided(
            dir.path(),
            GuidedConfig {
                cooldown: Duration::ZERO,
                ..GuidedConfig::default()
            },
        );

        let err = g.bootstrap().await.unwrap_err();
        assert!(matches!(err, BootstrapError::InsufficientPeers { .. }));
        assert_eq!(err.reason(), "insufficient_peers");
    }
}
