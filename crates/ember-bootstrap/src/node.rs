//! Node assembly: wire the components together and run formation.

use crate::config::NodeConfig;
use crate::error::{BootstrapError, Result};
use crate::event::EventBus;
use crate::guided::{GuidedBootstrap, GuidedConfig};
use crate::machine::{BootstrapMachine, Mode};
use crate::negotiate::{run_negotiation, NegotiateTimeouts};
use crate::service::PeerService;
use ember_discovery::{LocalIdentity, Scanner, ScannerConfig};
use ember_genesis::NetworkConfiguration;
use ember_netmap::{write_atomic, HttpCoordinator, MapStore, MapValidator, NodeRegistration};
use ember_peer::{capability, NetworkMode, PeerId};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// File the accepted network configuration is persisted to.
const NETWORK_CONFIG_FILE: &str = "network-config.json";

/// Timeout for coordinator HTTP requests.
const COORDINATOR_TIMEOUT: Duration = Duration::from_secs(5);

/// How often liveness is reported to the coordinator.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Path of the persisted network configuration under a data directory.
#[must_use]
pub fn network_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(NETWORK_CONFIG_FILE)
}

/// Load the persisted network configuration, if present.
pub fn load_network_configuration(path: &Path) -> Result<Option<NetworkConfiguration>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read(path)?;
    Ok(Some(serde_json::from_slice(&data)?))
}

/// Persist an accepted network configuration atomically.
pub fn save_network_configuration(path: &Path, config: &NetworkConfiguration) -> Result<()> {
    let data = serde_json::to_vec_pretty(config)?;
    write_atomic(path, &data)?;
    Ok(())
}

/// Remove the persisted configuration so formation can run again.
///
/// Honored on testnet for recorded pioneers only; mainnet reset is always
/// refused.
pub fn reset_network_configuration(path: &Path, node_id: &PeerId, mode: NetworkMode) -> Result<()> {
    if mode == NetworkMode::Mainnet {
        return Err(BootstrapError::InvalidPeer(
            "network reset is not available on mainnet".to_string(),
        ));
    }
    let Some(config) = load_network_configuration(path)? else {
        return Ok(());
    };
    if !config.is_pioneer(&node_id.to_hex()) {
        return Err(BootstrapError::InvalidPeer(format!(
            "{node_id} is not a pioneer of {}",
            config.network_id
        )));
    }
    std::fs::remove_file(path)?;
    warn!(network_id = %config.network_id, "network configuration reset by pioneer");
    Ok(())
}

/// An Ember node instance.
pub struct EmberNode {
    config: NodeConfig,
    events: EventBus,
}

impl EmberNode {
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            events: EventBus::new(),
        }
    }

    /// The event bus, for subscribers that want formation progress.
    #[must_use]
    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    /// Run the node: serve formation traffic and, unless a network
    /// configuration already exists, drive bootstrap to completion. Keeps
    /// serving after formation so late peers can still validate.
    pub async fn run(self) -> Result<()> {
        std::fs::create_dir_all(&self.config.data_dir)?;

        let node_id = PeerId::generate();
        info!(
            %node_id,
            mode = %self.config.mode,
            listen = %self.config.listen_addr,
            data = ?self.config.data_dir,
            "ember node starting"
        );

        let identity = LocalIdentity {
            node_id,
            mode: self.config.mode,
            capabilities: vec![
                capability::GENESIS.to_string(),
                capability::PARTICIPATE.to_string(),
            ],
            wallet_address: self.config.wallet_address.clone(),
            ready: self.config.wallet_address.is_some(),
        };

        let config_path = network_config_path(&self.config.data_dir);
        let already_formed = load_network_configuration(&config_path)?;

        // Serve handshakes (and genesis traffic while forming) regardless
        let service = PeerService::bind(
            self.config.listen_addr,
            identity.clone(),
            already_formed.is_none(),
        )
        .await?;
        let service_addr = service.local_addr()?;
        let service_task = tokio::spawn(service.run());

        if let Some(existing) = already_formed {
            info!(
                network_id = %existing.network_id,
                genesis_hash = %existing.genesis_hash,
                "network configuration present; skipping formation"
            );
        } else {
            match self.form_network(&identity, service_addr).await {
                Ok(Some(configuration)) => {
                    save_network_configuration(&config_path, &configuration)?;
                    info!(
                        network_id = %configuration.network_id,
                        path = %config_path.display(),
                        "network configuration persisted"
                    );
                }
                Ok(None) => {
                    info!("formation prerequisites not met; serving as scan target only");
                }
                Err(e) => return Err(e),
            }
        }

        // Periodic liveness reports, best effort
        let keepalive_url = self.config.coordinator_url.clone();
        let keepalive_id = node_id.to_hex();
        tokio::spawn(async move {
            let Ok(coordinator) = HttpCoordinator::new(&keepalive_url, COORDINATOR_TIMEOUT) else {
                return;
            };
            let mut interval = tokio::time::interval(KEEPALIVE_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = coordinator.keepalive(&keepalive_id).await {
                    tracing::debug!(error = %e, "keepalive failed");
                }
            }
        });

        // Park on the accept loop
        match service_task.await {
            Ok(result) => result,
            Err(e) => Err(BootstrapError::PeerDisconnection(e.to_string())),
        }
    }

    /// Drive the state machine through discovery and genesis.
    async fn form_network(
        &self,
        identity: &LocalIdentity,
        service_addr: std::net::SocketAddr,
    ) -> Result<Option<NetworkConfiguration>> {
        let mut machine = BootstrapMachine::new(self.events.clone());

        let Some(wallet) = self.config.wallet_address.clone() else {
            warn!("no wallet address configured; cannot participate in formation");
            return Ok(None);
        };
        machine.set_address(wallet);
        machine.set_participation_ready();
        debug_assert_eq!(machine.mode(), Mode::Discovery);

        let coordinator =
            HttpCoordinator::new(&self.config.coordinator_url, COORDINATOR_TIMEOUT).map_err(
                |e| {
                    warn!(error = %e, "cannot build coordinator client");
                    BootstrapError::NetworkTimeout("coordinator client")
                },
            )?;

        // Best-effort registration; the coordinator may simply be gone
        let registration = NodeRegistration {
            node_id: identity.node_id.to_hex(),
            node_type: "pioneer".to_string(),
            port: service_addr.port(),
            latitude: self.config.position.map(|p| p.0),
            longitude: self.config.position.map(|p| p.1),
        };
        if let Err(e) = coordinator.register_node(&registration).await {
            warn!(error = %e, "coordinator registration failed, continuing");
        }

        let validator = MapValidator::new(coordinator, MapStore::open(&self.config.data_dir)?);
        let scanner = Scanner::new(
            ScannerConfig {
                mode: self.config.mode,
                seeds: self.config.seeds.clone(),
                ..ScannerConfig::default()
            },
            identity.clone(),
        );
        let guided = GuidedBootstrap::new(
            validator,
            scanner,
            identity.clone(),
            GuidedConfig {
                local_position: self.config.position,
                ..GuidedConfig::default()
            },
        );

        let peers = match guided.bootstrap().await {
            Ok(peers) => peers,
            Err(e) => {
                machine.record_error(&e);
                return Err(e);
            }
        };

        let stats = guided.attempt_stats();
        info!(
            peers = peers.len(),
            success_rate = stats.success_rate,
            mean_latency_ms = stats.mean_latency_ms,
            "discovery finished"
        );

        machine.merge_discovered(peers);
        if machine.mode() != Mode::Genesis {
            let err = BootstrapError::InsufficientPeers {
                found: machine.qualifying_peers().len(),
                required: crate::machine::REQUIRED_PEERS,
            };
            machine.record_error(&err);
            return Err(err);
        }

        match run_negotiation(
            identity,
            machine.qualifying_peers(),
            &self.events,
            NegotiateTimeouts::default(),
        )
        .await
        {
            Ok((configuration, block)) => {
                machine.record_genesis_completed(&configuration.network_id, block);
                Ok(Some(configuration))
            }
            Err(e) => {
                machine.record_genesis_failure(&e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_genesis::ConsensusRules;

    fn configuration(pioneers: &[&str]) -> NetworkConfiguration {
        NetworkConfiguration {
            network_id: "net_roundtrip".to_string(),
            genesis_hash: "ab".repeat(32),
            peers: Vec::new(),
            consensus_rules: ConsensusRules::default(),
            created_at: 1_700_000_000_000,
            pioneers: pioneers.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn configuration_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = network_config_path(dir.path());

        assert!(load_network_configuration(&path).unwrap().is_none());

        save_network_configuration(&path, &configuration(&["p1"])).unwrap();
        let loaded = load_network_configuration(&path).unwrap().unwrap();
        assert_eq!(loaded.network_id, "net_roundtrip");
        assert!(loaded.is_pioneer("p1"));
    }

    #[test]
    fn reset_allowed_for_testnet_pioneer_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = network_config_path(dir.path());
        let pioneer = PeerId::from_bytes([7; 16]);
        let outsider = PeerId::from_bytes([8; 16]);

        save_network_configuration(&path, &configuration(&[&pioneer.to_hex()])).unwrap();

        // Mainnet: always refused
        let err =
            reset_network_configuration(&path, &pioneer, NetworkMode::Mainnet).unwrap_err();
        assert_eq!(err.reason(), "invalid_peer");
        assert!(path.exists());

        // Testnet non-pioneer: refused
        let err =
            reset_network_configuration(&path, &outsider, NetworkMode::Testnet).unwrap_err();
        assert_eq!(err.reason(), "invalid_peer");
        assert!(path.exists());

        // Testnet pioneer: allowed
        reset_network_configuration(&path, &pioneer, NetworkMode::Testnet).unwrap();
        assert!(!path.exists());

        // Resetting nothing is fine
        reset_network_configuration(&path, &pioneer, NetworkMode::Testnet).unwrap();
    }
}
