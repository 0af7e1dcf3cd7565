//! Node configuration from environment variables.

use ember_peer::NetworkMode;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration for an Ember node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for snapshots and the network configuration record
    pub data_dir: PathBuf,

    /// P2P listen address
    pub listen_addr: SocketAddr,

    /// Which network to join
    pub mode: NetworkMode,

    /// Coordinator base URL
    pub coordinator_url: String,

    /// Wallet address genesis rewards are issued to
    pub wallet_address: Option<String>,

    /// Seed peers (required for mainnet discovery)
    pub seeds: Vec<SocketAddr>,

    /// Local coordinates for proximity scoring, when known
    pub position: Option<(f64, f64)>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(
            std::env::var("EMBER_DATA_DIR").unwrap_or_else(|_| "./ember-data".to_string()),
        );

        let listen_addr = std::env::var("EMBER_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8330".to_string())
            .parse()
            .expect("Invalid EMBER_LISTEN_ADDR");

        let mode = match std::env::var("EMBER_MODE").as_deref() {
            Ok("mainnet") => NetworkMode::Mainnet,
            _ => NetworkMode::Testnet,
        };

        let coordinator_url = std::env::var("EMBER_COORDINATOR_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8900".to_string());

        let wallet_address = std::env::var("EMBER_WALLET_ADDRESS").ok().filter(|w| !w.is_empty());

        let seeds = std::env::var("EMBER_SEEDS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| p.parse().expect("Invalid EMBER_SEEDS entry"))
                    .collect()
            })
            .unwrap_or_default();

        let position = match (
            std::env::var("EMBER_LATITUDE").ok().and_then(|v| v.parse().ok()),
            std::env::var("EMBER_LONGITUDE").ok().and_then(|v| v.parse().ok()),
        ) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        };

        Self {
            data_dir,
            listen_addr,
            mode,
            coordinator_url,
            wallet_address,
            seeds,
            position,
        }
    }
}
