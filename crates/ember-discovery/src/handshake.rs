//! Outbound handshake probes.

use crate::error::{Error, Result};
use ember_peer::{now_millis, NetworkMode, PeerCandidate, PeerId};
use ember_wire::{read_frame, write_frame, HandshakeRequest, HandshakeResponse, Message, PROTOCOL, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// What this node declares about itself when handshaking.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    pub node_id: PeerId,
    pub mode: NetworkMode,
    pub capabilities: Vec<String>,
    pub wallet_address: Option<String>,
    /// Declared in responses: whether we are ready to take part in
    /// formation.
    pub ready: bool,
}

impl LocalIdentity {
    /// The handshake request this identity sends.
    #[must_use]
    pub fn handshake_request(&self) -> HandshakeRequest {
        HandshakeRequest {
            protocol: PROTOCOL.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            node_id: self.node_id,
            network_mode: self.mode,
            capabilities: self.capabilities.clone(),
            wallet_address: self.wallet_address.clone(),
            timestamp: now_millis(),
        }
    }

    /// The handshake response this identity answers with.
    #[must_use]
    pub fn handshake_response(&self) -> HandshakeResponse {
        HandshakeResponse {
            protocol: PROTOCOL.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            node_id: self.node_id,
            network_mode: self.mode,
            capabilities: self.capabilities.clone(),
            wallet_address: self.wallet_address.clone(),
            ready: self.ready,
            timestamp: now_millis(),
        }
    }
}

/// Probe one target: connect, handshake, validate, capture a candidate.
///
/// Both the connect and each frame exchange run under their own timeout;
/// a probe can never hang longer than `connect_timeout + 2 × io_timeout`.
pub async fn probe(
    addr: SocketAddr,
    identity: &LocalIdentity,
    connect_timeout: Duration,
    io_timeout: Duration,
) -> Result<PeerCandidate> {
    let mut stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::Timeout("connect"))??;

    let request = Message::Handshake(identity.handshake_request());
    timeout(io_timeout, write_frame(&mut stream, &request))
        .await
        .map_err(|_| Error::Timeout("handshake send"))??;

    let reply = timeout(io_timeout, read_frame(&mut stream))
        .await
        .map_err(|_| Error::Timeout("handshake receive"))??;

    let response = match reply {
        Message::HandshakeResponse(resp) => resp,
        Message::Handshake(_) => return Err(Error::UnexpectedMessage("p2p_handshake")),
        _ => return Err(Error::UnexpectedMessage("non-handshake frame")),
    };
    response.validate()?;

    if response.node_id == identity.node_id {
        return Err(Error::SelfConnection);
    }
    if response.network_mode != identity.mode {
        return Err(Error::ModeMismatch(response.network_mode));
    }

    trace!(peer = %response.node_id, %addr, ready = response.ready, "handshake complete");

    Ok(PeerCandidate {
        id: response.node_id,
        addr: addr.ip(),
        port: addr.port(),
        wallet_address: response.wallet_address,
        mode: response.network_mode,
        ready: response.ready,
        capabilities: response.capabilities.into_iter().collect(),
        last_seen: now_millis(),
    })
}
