//! Driver wiring the genesis phase machine to the wire protocol.
//!
//! The phase machine in `ember-genesis` is sans-IO; this module performs
//! the actual distribution and hash collection over the same framed
//! transport the handshake uses, and feeds the results back in. Per-peer
//! failures are absorbed (a peer that cannot be reached simply never
//! acknowledges); only quorum failures end the negotiation.

use crate::error::Result;
use crate::event::{Event, EventBus};
use ember_discovery::LocalIdentity;
use ember_genesis::{
    GenesisBlock, GenesisNegotiation, NegotiationConfig, NetworkConfiguration,
};
use ember_peer::{now_millis, PeerCandidate};
use ember_wire::{
    read_frame, write_frame, GenesisAnnounce, HashRequest, Message,
};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Timeouts for the negotiation exchanges.
#[derive(Debug, Clone, Copy)]
pub struct NegotiateTimeouts {
    pub connect: Duration,
    pub io: Duration,
}

impl Default for NegotiateTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(600),
            io: Duration::from_secs(3),
        }
    }
}

/// Run a full negotiation against the given peers.
///
/// Emits `GenesisPhaseChanged` for every phase transition and returns the
/// accepted configuration and block on success. Quorum failures surface
/// as [`crate::BootstrapError::Genesis`].
pub async fn run_negotiation(
    identity: &LocalIdentity,
    peers: Vec<PeerCandidate>,
    events: &EventBus,
    timeouts: NegotiateTimeouts,
) -> Result<(NetworkConfiguration, GenesisBlock)> {
    let mut negotiation = GenesisNegotiation::new(
        identity.node_id,
        identity.wallet_address.clone(),
        peers,
        NegotiationConfig::default(),
    )?;

    let block = negotiation.start(now_millis())?.clone();
    pump_events(&mut negotiation, events);

    let network_id = negotiation
        .params()
        .map(|p| p.network_id.clone())
        .unwrap_or_default();
    info!(
        %network_id,
        peers = negotiation.peers().len(),
        genesis_hash = %block.hash,
        "distributing genesis block"
    );

    // Distribution: one announce per peer, concurrently. The peer count
    // is already bounded by discovery, so no extra cap is needed here.
    let announces = negotiation.peers().to_vec();
    let acks = futures::future::join_all(announces.iter().map(|peer| {
        let block = &block;
        let network_id = &network_id;
        async move {
            let acked = announce_to_peer(peer, identity, block, network_id, timeouts).await;
            (peer.id, acked)
        }
    }))
    .await;

    for (peer_id, acked) in acks {
        negotiation.record_ack(&peer_id, acked)?;
    }

    let distribution = negotiation.finish_distribution();
    pump_events(&mut negotiation, events);
    distribution?;

    // Validation: ask every peer which hash it accepted.
    let reports = futures::future::join_all(announces.iter().map(|peer| {
        let network_id = &network_id;
        async move {
            let hash = query_accepted_hash(peer, identity, network_id, timeouts).await;
            (peer.id, hash)
        }
    }))
    .await;

    for (peer_id, hash) in reports {
        negotiation.record_hash_report(&peer_id, hash)?;
    }

    let validation = negotiation.finish_validation();
    pump_events(&mut negotiation, events);
    let configuration = validation?;

    Ok((configuration, block))
}

/// Send the block to one peer and read its acknowledgment. Any failure
/// counts as "did not acknowledge" — absorbed, never escalated.
async fn announce_to_peer(
    peer: &PeerCandidate,
    identity: &LocalIdentity,
    block: &GenesisBlock,
    network_id: &str,
    timeouts: NegotiateTimeouts,
) -> bool {
    let addr = peer.socket_addr();
    let announce = Message::GenesisAnnounce(GenesisAnnounce {
        node_id: identity.node_id,
        network_id: network_id.to_string(),
        block: serde_json::to_value(block).unwrap_or_default(),
        timestamp: now_millis(),
    });

    let exchange = async {
        let mut stream = timeout(timeouts.connect, TcpStream::connect(addr))
            .await
            .ok()?
            .ok()?;
        exchange_one(&mut stream, &announce, timeouts.io).await
    };

    match exchange.await {
        Some(Message::GenesisAck(ack)) => {
            if !ack.accepted {
                warn!(peer = %peer.id, reason = ?ack.reason, "peer rejected genesis block");
            }
            ack.accepted
        }
        Some(other) => {
            warn!(peer = %peer.id, got = ?other, "unexpected answer to genesis announce");
            false
        }
        None => {
            debug!(peer = %peer.id, %addr, "genesis announce got no answer");
            false
        }
    }
}

/// Ask one peer for its accepted hash. Failures report as `None`.
async fn query_accepted_hash(
    peer: &PeerCandidate,
    identity: &LocalIdentity,
    network_id: &str,
    timeouts: NegotiateTimeouts,
) -> Option<String> {
    let addr = peer.socket_addr();
    let request = Message::HashRequest(HashRequest {
        node_id: identity.node_id,
        network_id: network_id.to_string(),
        timestamp: now_millis(),
    });

    let exchange = async {
        let mut stream = timeout(timeouts.connect, TcpStream::connect(addr))
            .await
            .ok()?
            .ok()?;
        exchange_one(&mut stream, &request, timeouts.io).await
    };

    match exchange.await {
        Some(Message::HashReport(report)) => report.genesis_hash,
        Some(other) => {
            warn!(peer = %peer.id, got = ?other, "unexpected answer to hash request");
            None
        }
        None => {
            debug!(peer = %peer.id, %addr, "hash request got no answer");
            None
        }
    }
}

/// Write one frame and read one frame, each under the io timeout.
async fn exchange_one(
    stream: &mut TcpStream,
    msg: &Message,
    io_timeout: Duration,
) -> Option<Message> {
    timeout(io_timeout, write_frame(stream, msg)).await.ok()?.ok()?;
    timeout(io_timeout, read_frame(stream)).await.ok()?.ok()
}

/// Forward recorded phase transitions onto the event bus.
fn pump_events(negotiation: &mut GenesisNegotiation, events: &EventBus) {
    for transition in negotiation.drain_transitions() {
        events.emit(Event::GenesisPhaseChanged {
            from: transition.from,
            to: transition.to,
        });
    }
}
