//! The concurrent peer scanner.

use crate::error::Error;
use crate::handshake::{probe, LocalIdentity};
use crate::targets::{is_valid_target, mainnet_targets, testnet_targets, SCAN_PORTS};
use ember_peer::{NetworkMode, PeerCandidate, PeerId};
use ember_retry::RetryPolicy;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

/// Scanner tunables. Every socket operation is covered by a timeout; the
/// scan as a whole is covered by `scan_timeout`.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub mode: NetworkMode,
    /// Ports swept in testnet mode.
    pub ports: Vec<u16>,
    /// Hard cap on generated targets per scan.
    pub max_targets: usize,
    /// Concurrent in-flight probes. Bounded to protect fd limits.
    pub concurrency: usize,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
    /// Backoff schedule for retryable probe failures.
    pub retry: RetryPolicy,
    /// Ready genesis-capable peers that end the scan early.
    pub required_ready: usize,
    /// Wall-clock bound on the whole scan.
    pub scan_timeout: Duration,
    /// Externally supplied targets. The only source in mainnet mode.
    pub seeds: Vec<SocketAddr>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            mode: NetworkMode::Testnet,
            ports: SCAN_PORTS.to_vec(),
            max_targets: 2048,
            concurrency: 32,
            connect_timeout: Duration::from_millis(400),
            io_timeout: Duration::from_secs(2),
            retry: RetryPolicy::exponential(Duration::from_millis(250), 3),
            required_ready: 2,
            scan_timeout: Duration::from_secs(30),
            seeds: Vec::new(),
        }
    }
}

/// Counters accumulated across scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub targets_attempted: u64,
    pub handshakes_completed: u64,
    pub protocol_violations: u64,
    pub retries: u64,
    pub abandoned: u64,
}

#[derive(Debug, Default)]
struct StatsInner {
    targets_attempted: AtomicU64,
    handshakes_completed: AtomicU64,
    protocol_violations: AtomicU64,
    retries: AtomicU64,
    abandoned: AtomicU64,
}

impl StatsInner {
    fn snapshot(&self) -> ScanStats {
        ScanStats {
            targets_attempted: self.targets_attempted.load(Ordering::Relaxed),
            handshakes_completed: self.handshakes_completed.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Result of one scan.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Discovered peers, deduplicated by id, self excluded.
    pub candidates: Vec<PeerCandidate>,
    /// Whether the ready threshold was reached (possibly early).
    pub formation_ready: bool,
}

/// Concurrent handshake scanner.
pub struct Scanner {
    config: ScannerConfig,
    identity: Arc<LocalIdentity>,
    stats: Arc<StatsInner>,
    manual: Mutex<Vec<PeerCandidate>>,
    ready_tx: watch::Sender<bool>,
}

impl Scanner {
    #[must_use]
    pub fn new(config: ScannerConfig, identity: LocalIdentity) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            config,
            identity: Arc::new(identity),
            stats: Arc::new(StatsInner::default()),
            manual: Mutex::new(Vec::new()),
            ready_tx,
        }
    }

    /// Seed a known candidate directly, bypassing the sweep. It is merged
    /// into the next scan's results.
    pub fn add_manual_peer(&self, candidate: PeerCandidate) {
        let mut manual = self.manual.lock().unwrap_or_else(|e| e.into_inner());
        manual.push(candidate);
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> ScanStats {
        self.stats.snapshot()
    }

    /// Observe the formation-ready signal without polling the scan.
    #[must_use]
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    fn targets(&self) -> Vec<SocketAddr> {
        let mut targets = match self.config.mode {
            // Mainnet never enumerates: external seeds only
            NetworkMode::Mainnet => mainnet_targets(&self.config.seeds),
            NetworkMode::Testnet => {
                let mut t: Vec<SocketAddr> = self
                    .config
                    .seeds
                    .iter()
                    .copied()
                    .filter(|s| is_valid_target(s.ip(), NetworkMode::Testnet))
                    .collect();
                t.extend(testnet_targets(&self.config.ports, self.config.max_targets));
                t
            }
        };

        let mut seen = HashSet::new();
        targets.retain(|t| seen.insert(*t));
        targets.truncate(self.config.max_targets);
        targets
    }

    /// Run one scan: probe every target under the concurrency cap, stop
    /// early once enough ready genesis-capable peers have answered.
    /// In-flight probes past that point are abandoned, not awaited.
    pub async fn scan(&self) -> ScanOutcome {
        let _ = self.ready_tx.send(false);

        let targets = self.targets();
        info!(
            mode = %self.config.mode,
            targets = targets.len(),
            concurrency = self.config.concurrency,
            "starting peer scan"
        );

        let mut found: HashMap<PeerId, PeerCandidate> = HashMap::new();
        {
            let mut manual = self.manual.lock().unwrap_or_else(|e| e.into_inner());
            for candidate in manual.drain(..) {
                found.insert(candidate.id, candidate);
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut probes: JoinSet<Option<PeerCandidate>> = JoinSet::new();
        for addr in targets {
            let semaphore = Arc::clone(&semaphore);
            let identity = Arc::clone(&self.identity);
            let stats = Arc::clone(&self.stats);
            let connect_timeout = self.config.connect_timeout;
            let io_timeout = self.config.io_timeout;
            let retry = self.config.retry;
            probes.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                attempt_target(addr, &identity, connect_timeout, io_timeout, retry, &stats).await
            });
        }

        let deadline = tokio::time::sleep(self.config.scan_timeout);
        tokio::pin!(deadline);

        let mut formation_ready = self.count_qualifying(&found) >= self.config.required_ready;
        while !probes.is_empty() && !formation_ready {
            tokio::select! {
                joined = probes.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok(Some(candidate)) => {
                            debug!(peer = %candidate, "peer discovered");
                            found.insert(candidate.id, candidate);
                            if self.count_qualifying(&found) >= self.config.required_ready {
                                formation_ready = true;
                            }
                        }
                        Ok(None) => {}
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => warn!(error = %e, "probe task failed"),
                    }
                }
                () = &mut deadline => {
                    debug!("scan deadline reached");
                    break;
                }
            }
        }

        if formation_ready {
            // Latency optimization: enough peers to form a network, so
            // the rest of the sweep is abandoned rather than awaited.
            probes.abort_all();
            let _ = self.ready_tx.send(true);
        }
        drop(probes);

        let candidates: Vec<PeerCandidate> = found.into_values().collect();
        info!(
            discovered = candidates.len(),
            formation_ready, "peer scan finished"
        );

        ScanOutcome {
            candidates,
            formation_ready,
        }
    }

    fn count_qualifying(&self, found: &HashMap<PeerId, PeerCandidate>) -> usize {
        found
            .values()
            .filter(|c| c.qualifies_for_genesis())
            .count()
    }
}

/// Probe one target with retries. Local failures are absorbed into the
/// stats counters and never surface past this function.
async fn attempt_target(
    addr: SocketAddr,
    identity: &LocalIdentity,
    connect_timeout: Duration,
    io_timeout: Duration,
    retry: RetryPolicy,
    stats: &StatsInner,
) -> Option<PeerCandidate> {
    stats.targets_attempted.fetch_add(1, Ordering::Relaxed);

    let mut attempt = 0u32;
    loop {
        match probe(addr, identity, connect_timeout, io_timeout).await {
            Ok(candidate) => {
                stats.handshakes_completed.fetch_add(1, Ordering::Relaxed);
                return Some(candidate);
            }
            Err(e) if e.is_retryable() => match retry.delay_for(attempt) {
                Some(delay) => {
                    stats.retries.fetch_add(1, Ordering::Relaxed);
                    trace!(%addr, attempt, ?delay, error = %e, "probe retry");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    stats.abandoned.fetch_add(1, Ordering::Relaxed);
                    trace!(%addr, error = %e, "probe abandoned");
                    return None;
                }
            },
            Err(e) => {
                if matches!(
                    e,
                    Error::Protocol(_) | Error::UnexpectedMessage(_) | Error::ModeMismatch(_)
                ) {
                    stats.protocol_violations.fetch_add(1, Ordering::Relaxed);
                }
                trace!(%addr, error = %e, "probe discarded");
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_peer::capability;
    use ember_wire::{read_frame, write_frame, Message};
    use tokio::net::TcpListener;

    fn identity(n: u8, ready: bool) -> LocalIdentity {
        LocalIdentity {
            node_id: PeerId::from_bytes([n; 16]),
            mode: NetworkMode::Testnet,
            capabilities: vec![capability::GENESIS.to_string()],
            wallet_address: Some(format!("wx1node{n}")),
            ready,
        }
    }

    fn config(seeds: Vec<SocketAddr>) -> ScannerConfig {
        ScannerConfig {
            ports: Vec::new(), // no sweep: seeds only
            seeds,
            connect_timeout: Duration::from_millis(500),
            io_timeout: Duration::from_millis(500),
            retry: RetryPolicy::none(),
            scan_timeout: Duration::from_secs(5),
            ..ScannerConfig::default()
        }
    }

    /// Answer handshakes forever with the given identity.
    async fn responder(listener: TcpListener, identity: LocalIdentity) {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let identity = identity.clone();
            tokio::spawn(async move {
                if let Ok(Message::Handshake(_)) = read_frame(&mut stream).await {
                    let resp = Message::HandshakeResponse(identity.handshake_response());
                    let _ = write_frame(&mut stream, &resp).await;
                }
            });
        }
    }

    async fn spawn_peer(n: u8, ready: bool) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(responder(listener, identity(n, ready)));
        addr
    }

    #[tokio::test]
    async fn scan_reaches_formation_ready_with_two_peers() {
        let a = spawn_peer(2, true).await;
        let b = spawn_peer(3, true).await;

        let scanner = Scanner::new(config(vec![a, b]), identity(1, true));
        let mut ready = scanner.subscribe_ready();

        let outcome = scanner.scan().await;
        assert!(outcome.formation_ready);
        assert_eq!(outcome.candidates.len(), 2);
        assert!(*ready.borrow_and_update());

        let stats = scanner.stats();
        assert_eq!(stats.handshakes_completed, 2);
        assert_eq!(stats.protocol_violations, 0);
    }

    #[tokio::test]
    async fn unready_peers_do_not_trigger_formation() {
        let a = spawn_peer(2, true).await;
        let b = spawn_peer(3, false).await; // answers, but not ready

        let scanner = Scanner::new(config(vec![a, b]), identity(1, true));
        let outcome = scanner.scan().await;

        assert!(!outcome.formation_ready);
        assert_eq!(outcome.candidates.len(), 2);
    }

    #[tokio::test]
    async fn protocol_violation_is_counted_not_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let _ = read_frame(&mut stream).await;
                let mut resp = identity(9, true).handshake_response();
                resp.protocol = "bogus/7".to_string();
                let _ = write_frame(&mut stream, &Message::HandshakeResponse(resp)).await;
            }
        });

        let mut cfg = config(vec![addr]);
        cfg.retry = RetryPolicy::exponential(Duration::from_millis(10), 3);
        let scanner = Scanner::new(cfg, identity(1, true));
        let outcome = scanner.scan().await;

        assert!(outcome.candidates.is_empty());
        let stats = scanner.stats();
        assert_eq!(stats.protocol_violations, 1);
        assert_eq!(stats.retries, 0);
        assert_eq!(stats.handshakes_completed, 0);
    }

    #[tokio::test]
    async fn manual_peers_merge_into_results() {
        let scanner = Scanner::new(config(vec![]), identity(1, true));
        let manual = PeerCandidate {
            id: PeerId::from_bytes([42; 16]),
            addr: "10.0.0.9".parse().unwrap(),
            port: 8330,
            wallet_address: None,
            mode: NetworkMode::Testnet,
            ready: false,
            capabilities: Default::default(),
            last_seen: ember_peer::now_millis(),
        };
        scanner.add_manual_peer(manual);

        let outcome = scanner.scan().await;
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].id, PeerId::from_bytes([42; 16]));
    }

    #[tokio::test]
    async fn early_exit_abandons_remaining_targets() {
        // Two good peers plus a silent one that would eat the io timeout;
        // once the threshold is reached, the scan must not wait for it.
        let a = spawn_peer(2, true).await;
        let b = spawn_peer(3, true).await;
        let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let silent_addr = silent.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((_stream, _)) = silent.accept().await else {
                    return;
                };
                // hold the connection open, never answer
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        });

        let mut cfg = config(vec![a, b, silent_addr]);
        cfg.io_timeout = Duration::from_secs(10);
        cfg.retry = RetryPolicy::exponential(Duration::from_secs(5), 5);
        let scanner = Scanner::new(cfg, identity(1, true));

        let started = std::time::Instant::now();
        let outcome = scanner.scan().await;
        assert!(outcome.formation_ready);
        // Far below the silent target's timeout-and-retry schedule
        assert!(started.elapsed() < Duration::from_secs(8));
    }
}
