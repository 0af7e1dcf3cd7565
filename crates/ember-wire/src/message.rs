//! Typed messages carried over the wire.

use crate::error::{Error, Result};
use ember_peer::{NetworkMode, PeerId};
use serde::{Deserialize, Serialize};

/// Protocol name echoed by both sides of a handshake.
pub const PROTOCOL: &str = "ember/1";

/// Protocol revision carried in handshakes for diagnostics.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Any frame that can travel over a peer connection, discriminated by its
/// `type` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Message {
    /// Opening message of every connection.
    #[serde(rename = "p2p_handshake")]
    Handshake(HandshakeRequest),

    /// Answer to a handshake.
    #[serde(rename = "p2p_handshake_response")]
    HandshakeResponse(HandshakeResponse),

    /// A freshly built genesis block offered for acceptance.
    #[serde(rename = "genesis_announce")]
    GenesisAnnounce(GenesisAnnounce),

    /// Accept/reject answer to a genesis announcement.
    #[serde(rename = "genesis_ack")]
    GenesisAck(GenesisAck),

    /// Ask a peer which genesis hash it has accepted.
    #[serde(rename = "genesis_hash_request")]
    HashRequest(HashRequest),

    /// A peer's view of the accepted genesis hash.
    #[serde(rename = "genesis_hash_response")]
    HashReport(HashReport),
}

/// Handshake fields a node sends when probing a peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandshakeRequest {
    pub protocol: String,
    pub version: String,
    pub node_id: PeerId,
    pub network_mode: NetworkMode,
    pub capabilities: Vec<String>,
    pub wallet_address: Option<String>,
    /// Sender's wall clock (unix millis), informational.
    pub timestamp: u64,
}

/// Handshake answer. A response missing the matching protocol name or a
/// node id is a protocol violation, not a timeout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandshakeResponse {
    pub protocol: String,
    pub version: String,
    pub node_id: PeerId,
    pub network_mode: NetworkMode,
    pub capabilities: Vec<String>,
    pub wallet_address: Option<String>,
    /// Whether the responder is ready to participate in formation.
    pub ready: bool,
    pub timestamp: u64,
}

impl HandshakeResponse {
    /// Enforce the response contract: the protocol name must be echoed
    /// back exactly.
    pub fn validate(&self) -> Result<()> {
        if self.protocol != PROTOCOL {
            return Err(Error::WrongProtocol {
                expected: PROTOCOL.to_string(),
                got: self.protocol.clone(),
            });
        }
        Ok(())
    }
}

/// Genesis block offer. The block travels as opaque JSON so the wire crate
/// stays independent of block internals; the receiving side decodes and
/// verifies it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenesisAnnounce {
    pub node_id: PeerId,
    pub network_id: String,
    pub block: serde_json::Value,
    pub timestamp: u64,
}

/// Answer to a [`GenesisAnnounce`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenesisAck {
    pub node_id: PeerId,
    pub network_id: String,
    pub accepted: bool,
    /// Why the block was rejected, when it was.
    pub reason: Option<String>,
    pub timestamp: u64,
}

/// Query for the peer's accepted genesis hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HashRequest {
    pub node_id: PeerId,
    pub network_id: String,
    pub timestamp: u64,
}

/// The peer's accepted genesis hash, `None` if it has accepted nothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HashReport {
    pub node_id: PeerId,
    pub network_id: String,
    pub genesis_hash: Option<String>,
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_peer::capability;

    fn request() -> HandshakeRequest {
        HandshakeRequest {
            protocol: PROTOCOL.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            node_id: PeerId::from_bytes([1; 16]),
            network_mode: NetworkMode::Testnet,
            capabilities: vec![capability::GENESIS.to_string()],
            wallet_address: Some("wx1qtest".to_string()),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn handshake_uses_type_tag() {
        let msg = Message::Handshake(request());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "p2p_handshake");
        assert_eq!(json["protocol"], PROTOCOL);
        assert_eq!(json["network_mode"], "testnet");
    }

    #[test]
    fn round_trip_all_variants() {
        let node_id = PeerId::from_bytes([2; 16]);
        let messages = vec![
            Message::Handshake(request()),
            Message::HandshakeResponse(HandshakeResponse {
                protocol: PROTOCOL.to_string(),
                version: PROTOCOL_VERSION.to_string(),
                node_id,
                network_mode: NetworkMode::Mainnet,
                capabilities: vec![],
                wallet_address: None,
                ready: true,
                timestamp: 1,
            }),
            Message::GenesisAnnounce(GenesisAnnounce {
                node_id,
                network_id: "net_0011".to_string(),
                block: serde_json::json!({"index": 0}),
                timestamp: 2,
            }),
            Message::GenesisAck(GenesisAck {
                node_id,
                network_id: "net_0011".to_string(),
                accepted: false,
                reason: Some("hash mismatch".to_string()),
                timestamp: 3,
            }),
            Message::HashRequest(HashRequest {
                node_id,
                network_id: "net_0011".to_string(),
                timestamp: 4,
            }),
            Message::HashReport(HashReport {
                node_id,
                network_id: "net_0011".to_string(),
                genesis_hash: None,
                timestamp: 5,
            }),
        ];

        for msg in messages {
            let json = serde_json::to_string(&msg).unwrap();
            let back: Message = serde_json::from_str(&json).unwrap();
            assert_eq!(back, msg);
        }
    }

    #[test]
    fn response_validation_requires_protocol_echo() {
        let mut resp = HandshakeResponse {
            protocol: PROTOCOL.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            node_id: PeerId::from_bytes([3; 16]),
            network_mode: NetworkMode::Testnet,
            capabilities: vec![],
            wallet_address: None,
            ready: false,
            timestamp: 0,
        };
        assert!(resp.validate().is_ok());

        resp.protocol = "other/9".to_string();
        assert!(matches!(
            resp.validate(),
            Err(Error::WrongProtocol { .. })
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = serde_json::from_str::<Message>(r#"{"type":"gossip_blast"}"#);
        assert!(err.is_err());
    }
}
