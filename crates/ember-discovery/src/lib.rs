//! Peer discovery scanning.
//!
//! The scanner probes candidate `address:port` targets with the Ember
//! handshake and collects the peers that answer correctly. Concurrency is
//! capped to protect socket limits, every socket operation carries a
//! timeout, and failed attempts back off exponentially before being
//! abandoned.
//!
//! Target selection is mode-dependent and strict: testnet sweeps the
//! private ranges, mainnet only ever probes externally-supplied public
//! addresses — a private, reserved, multicast, or link-local address is
//! rejected outright in mainnet mode.

mod error;
mod handshake;
mod scanner;
mod targets;

pub use error::{Error, Result};
pub use handshake::{probe, LocalIdentity};
pub use scanner::{ScanOutcome, ScanStats, Scanner, ScannerConfig};
pub use targets::{is_public, is_valid_target, mainnet_targets, testnet_targets, SCAN_PORTS};
