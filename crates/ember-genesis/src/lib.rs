//! Genesis negotiation and deterministic block construction.
//!
//! # Determinism is the whole game
//!
//! Independently-running nodes must converge on a byte-identical genesis
//! block from the same inputs. Everything here is therefore a pure
//! function of (participant set, timestamp):
//!
//! - the network id derives from the sorted participant ids + timestamp
//! - reward transactions hash only their economically-relevant fields
//! - the merkle root folds transaction hashes in a fixed order
//! - the block hash covers a canonical key-sorted serialization
//!
//! Recomputing any hash from stored fields must reproduce the stored
//! value; [`GenesisBlock::verify`] checks exactly that.
//!
//! # Negotiation phases
//!
//! ```text
//! Negotiating → Creating → Distributing → Validating → Completed
//!                                │              │
//!                                └──────────────┴────→ Failed (terminal)
//! ```
//!
//! Transitions are one-directional; `Failed` is terminal and requires an
//! external reset before another attempt. The phase machine is sans-IO:
//! a driver performs the actual distribution and hash collection, feeding
//! results back in.

mod block;
mod canonical;
mod config;
mod error;
mod merkle;
mod negotiate;
mod params;
mod transaction;

pub use block::{GenesisBlock, ZERO_HASH};
pub use config::NetworkConfiguration;
pub use error::{Error, Result};
pub use merkle::{merkle_root, proof_for, verify_proof, MerkleProof};
pub use negotiate::{
    GenesisNegotiation, NegotiationConfig, NegotiationStatus, Phase, PhaseTransition,
};
pub use params::{derive_network_id, ConsensusRules, GenesisParameters, BASE_REWARD};
pub use transaction::RewardTransaction;
