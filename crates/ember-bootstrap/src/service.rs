//! The listening side of the formation protocol.
//!
//! While a node scans for peers it is also someone else's scan target:
//! the service answers handshakes, verifies and acknowledges announced
//! genesis blocks, and reports the hash it accepted. One task per
//! connection, every read under a timeout.

use crate::error::Result;
use ember_discovery::LocalIdentity;
use ember_genesis::GenesisBlock;
use ember_peer::now_millis;
use ember_wire::{
    read_frame, write_frame, GenesisAck, GenesisAnnounce, HashReport, Message, PROTOCOL,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Idle time before a peer connection is dropped.
const CONNECTION_IDLE: Duration = Duration::from_secs(30);

/// What this node has accepted so far.
#[derive(Debug, Default, Clone)]
pub struct ServiceState {
    /// Network id of the genesis block we accepted, if any.
    pub accepted_network: Option<String>,
    /// Hash of the genesis block we accepted, if any.
    pub accepted_hash: Option<String>,
}

/// Accept-loop service answering formation traffic.
pub struct PeerService {
    listener: TcpListener,
    identity: Arc<LocalIdentity>,
    state: Arc<RwLock<ServiceState>>,
    /// Whether announced genesis blocks are accepted at all. A node that
    /// is already on a network answers `false` to every announce.
    accept_genesis: bool,
}

impl PeerService {
    /// Bind the service. Use port 0 to let the OS pick.
    pub async fn bind(
        addr: SocketAddr,
        identity: LocalIdentity,
        accept_genesis: bool,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            identity: Arc::new(identity),
            state: Arc::new(RwLock::new(ServiceState::default())),
            accept_genesis,
        })
    }

    /// The actual bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared view of what this service has accepted.
    #[must_use]
    pub fn state(&self) -> Arc<RwLock<ServiceState>> {
        Arc::clone(&self.state)
    }

    /// Run the accept loop. One task per connection.
    pub async fn run(self) -> Result<()> {
        let addr = self.listener.local_addr()?;
        info!(%addr, "peer service listening");

        loop {
            let (stream, remote) = self.listener.accept().await?;
            let identity = Arc::clone(&self.identity);
            let state = Arc::clone(&self.state);
            let accept_genesis = self.accept_genesis;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, identity, state, accept_genesis).await {
                    debug!(%remote, error = %e, "peer connection ended");
                }
            });
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    identity: Arc<LocalIdentity>,
    state: Arc<RwLock<ServiceState>>,
    accept_genesis: bool,
) -> ember_wire::Result<()> {
    loop {
        let msg = match timeout(CONNECTION_IDLE, read_frame(&mut stream)).await {
            Ok(Ok(msg)) => msg,
            // EOF, garbage, or idle: either way this connection is done
            Ok(Err(e)) => return Err(e),
            Err(_) => return Ok(()),
        };

        match msg {
            Message::Handshake(request) => {
                if request.protocol != PROTOCOL {
                    warn!(
                        got = %request.protocol,
                        "handshake for a foreign protocol, dropping connection"
                    );
                    return Ok(());
                }
                debug!(peer = %request.node_id, "answering handshake");
                let response = Message::HandshakeResponse(identity.handshake_response());
                write_frame(&mut stream, &response).await?;
            }

            Message::GenesisAnnounce(announce) => {
                let ack = evaluate_announce(&announce, &identity, accept_genesis);
                if ack.accepted {
                    let mut state = state.write().await;
                    state.accepted_network = Some(announce.network_id.clone());
                    state.accepted_hash = announce.block.get("hash").and_then(|h| h.as_str()).map(String::from);
                }
                write_frame(&mut stream, &Message::GenesisAck(ack)).await?;
            }

            Message::HashRequest(request) => {
                let state = state.read().await;
                let genesis_hash = if state.accepted_network.as_deref() == Some(request.network_id.as_str()) {
                    state.accepted_hash.clone()
                } else {
                    None
                };
                let report = Message::HashReport(HashReport {
                    node_id: identity.node_id,
                    network_id: request.network_id,
                    genesis_hash,
                    timestamp: now_millis(),
                });
                write_frame(&mut stream, &report).await?;
            }

            other => {
                warn!(got = ?other, "unexpected inbound frame, dropping connection");
                return Ok(());
            }
        }
    }
}

/// Decide whether to accept an announced genesis block.
///
/// The block must decode, pass full structural verification (recomputed
/// transaction hashes, merkle root, header hash), and — when this node
/// declared a wallet — actually reward it.
fn evaluate_announce(
    announce: &GenesisAnnounce,
    identity: &LocalIdentity,
    accept_genesis: bool,
) -> GenesisAck {
    let verdict: std::result::Result<(), &'static str> = (|| {
        if !accept_genesis {
            return Err("not accepting genesis blocks");
        }
        let block: GenesisBlock = serde_json::from_value(announce.block.clone())
            .map_err(|_| "block does not decode")?;
        if !block.verify() {
            return Err("block failed verification");
        }
        if let Some(wallet) = &identity.wallet_address {
            if !block.transactions.iter().any(|tx| &tx.receiver == wallet) {
                return Err("block does not reward this node");
            }
        }
        Ok(())
    })();

    match verdict {
        Ok(()) => {
            info!(
                network_id = %announce.network_id,
                from = %announce.node_id,
                "accepted genesis block"
            );
            GenesisAck {
                node_id: identity.node_id,
                network_id: announce.network_id.clone(),
                accepted: true,
                reason: None,
                timestamp: now_millis(),
            }
        }
        Err(reason) => {
            warn!(
                network_id = %announce.network_id,
                from = %announce.node_id,
                reason,
                "rejected genesis block"
            );
            GenesisAck {
                node_id: identity.node_id,
                network_id: announce.network_id.clone(),
                accepted: false,
                reason: Some(reason.to_string()),
                timestamp: now_millis(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_genesis::{ConsensusRules, GenesisParameters, BASE_REWARD};
    use ember_peer::{capability, NetworkMode, PeerId};

    fn identity(n: u8) -> LocalIdentity {
        LocalIdentity {
            node_id: PeerId::from_bytes([n; 16]),
            mode: NetworkMode::Testnet,
            capabilities: vec![capability::GENESIS.to_string()],
            wallet_address: Some(format!("wx1node{n}")),
            ready: true,
        }
    }

    fn block_rewarding(wallets: &[&str]) -> GenesisBlock {
        let roster: Vec<(String, Option<String>)> = wallets
            .iter()
            .enumerate()
            .map(|(i, w)| (format!("id{i}"), Some(w.to_string())))
            .collect();
        let params =
            GenesisParameters::agree(&roster, 1000, BASE_REWARD, ConsensusRules::default())
                .unwrap();
        GenesisBlock::build(&params)
    }

    fn announce_of(block: &GenesisBlock) -> GenesisAnnounce {
        GenesisAnnounce {
            node_id: PeerId::from_bytes([9; 16]),
            network_id: "net_test".to_string(),
            block: serde_json::to_value(block).unwrap(),
            timestamp: now_millis(),
        }
    }

    #[test]
    fn accepts_valid_block_that_rewards_us() {
        let block = block_rewarding(&["wx1node2", "wx1other"]);
        let ack = evaluate_announce(&announce_of(&block), &identity(2), true);
        assert!(ack.accepted);
    }

    #[test]
    fn rejects_block_that_skips_our_reward() {
        let block = block_rewarding(&["wx1other"]);
        let ack = evaluate_announce(&announce_of(&block), &identity(2), true);
        assert!(!ack.accepted);
        assert_eq!(ack.reason.as_deref(), Some("block does not reward this node"));
    }

    #[test]
    fn rejects_tampered_block() {
        let mut block = block_rewarding(&["wx1node2"]);
        block.transactions[0].amount += 1;
        let ack = evaluate_announce(&announce_of(&block), &identity(2), true);
        assert!(!ack.accepted);
        assert_eq!(ack.reason.as_deref(), Some("block failed verification"));
    }

    #[test]
    fn rejects_when_policy_disallows() {
        let block = block_rewarding(&["wx1node2"]);
        let ack = evaluate_announce(&announce_of(&block), &identity(2), false);
        assert!(!ack.accepted);
    }

    #[tokio::test]
    async fn service_answers_handshake_and_stores_accepted_hash() {
        let service = PeerService::bind(
            "127.0.0.1:0".parse().unwrap(),
            identity(2),
            true,
        )
        .await
        .unwrap();
        let addr = service.local_addr().unwrap();
        let state = service.state();
        tokio::spawn(service.run());

        // Handshake
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = Message::Handshake(identity(1).handshake_request());
        write_frame(&mut stream, &request).await.unwrap();
        let reply = read_frame(&mut stream).await.unwrap();
        let Message::HandshakeResponse(resp) = reply else {
            panic!("expected handshake response");
        };
        assert_eq!(resp.node_id, PeerId::from_bytes([2; 16]));
        assert!(resp.validate().is_ok());

        // Announce over the same connection
        let block = block_rewarding(&["wx1node2"]);
        let announce = Message::GenesisAnnounce(announce_of(&block));
        write_frame(&mut stream, &announce).await.unwrap();
        let Message::GenesisAck(ack) = read_frame(&mut stream).await.unwrap() else {
            panic!("expected ack");
        };
        assert!(ack.accepted);

        assert_eq!(
            state.read().await.accepted_hash.as_deref(),
            Some(block.hash.as_str())
        );
    }
}
