//! The genesis block and its canonical hash.

use crate::canonical::hash_json;
use crate::merkle::merkle_root;
use crate::params::GenesisParameters;
use crate::transaction::RewardTransaction;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Previous-hash of the first block: 64 zero nibbles.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// The first block of a network: issuance transactions only, zero
/// previous hash, zero nonce.
///
/// `merkle_root` and `hash` are pure functions of the other fields;
/// [`verify`](Self::verify) recomputes both and compares.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisBlock {
    pub index: u64,
    pub previous_hash: String,
    pub timestamp: u64,
    pub transactions: Vec<RewardTransaction>,
    pub merkle_root: String,
    pub nonce: u64,
    pub hash: String,
}

impl GenesisBlock {
    /// Build the genesis block for agreed parameters.
    ///
    /// Reward transactions are created in reward-map order (sorted by
    /// wallet address) and stamped with the negotiation timestamp, so any
    /// node building from the same parameters produces the same block.
    #[must_use]
    pub fn build(params: &GenesisParameters) -> Self {
        let transactions: Vec<RewardTransaction> = params
            .reward_map
            .iter()
            .map(|(addr, amount)| RewardTransaction::issuance(addr.clone(), *amount, params.timestamp))
            .collect();

        let tx_hashes: Vec<String> = transactions.iter().map(|tx| tx.hash.clone()).collect();

        let mut block = Self {
            index: 0,
            previous_hash: ZERO_HASH.to_string(),
            timestamp: params.timestamp,
            transactions,
            merkle_root: merkle_root(&tx_hashes),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Hash of the block header fields, over a canonical key-sorted
    /// serialization.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        hash_json(&json!({
            "index": self.index,
            "previous_hash": self.previous_hash,
            "timestamp": self.timestamp,
            "merkle_root": self.merkle_root,
            "nonce": self.nonce,
        }))
    }

    /// Full structural verification: every transaction hash, the merkle
    /// root, the genesis invariants, and the block hash itself must
    /// recompute to their stored values.
    #[must_use]
    pub fn verify(&self) -> bool {
        if self.index != 0 || self.previous_hash != ZERO_HASH || self.nonce != 0 {
            return false;
        }
        if !self.transactions.iter().all(RewardTransaction::verify_hash) {
            return false;
        }
        let tx_hashes: Vec<String> = self.transactions.iter().map(|tx| tx.hash.clone()).collect();
        if merkle_root(&tx_hashes) != self.merkle_root {
            return false;
        }
        self.compute_hash() == self.hash
    }
}
