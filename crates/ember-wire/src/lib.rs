//! Wire protocol for Ember peer connections.
//!
//! Every peer connection speaks the same framing: a 4-byte big-endian
//! length header followed by a UTF-8 JSON payload. The payload is a typed
//! [`Message`] discriminated by its `type` field, so a handshake request,
//! a genesis announcement, and a hash query all travel over the same
//! codec.
//!
//! Framing violations (oversized frames, truncated payloads, unknown
//! message types) are protocol errors, not timeouts: the peer that sent
//! them is discarded, never retried.

mod codec;
mod error;
mod message;

pub use codec::{read_frame, write_frame, MAX_FRAME_LEN};
pub use error::{Error, Result};
pub use message::{
    GenesisAck, GenesisAnnounce, HandshakeRequest, HandshakeResponse, HashReport, HashRequest,
    Message, PROTOCOL, PROTOCOL_VERSION,
};
