//! Genesis reward transactions.

use crate::canonical::hash_json;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// An issuance transaction in the genesis block.
///
/// `sender` is `None` for issuance — rewards are minted, not transferred.
/// The hash covers only the economically-relevant fields (sender,
/// receiver, amount, timestamp); anything nondeterministic stays out so
/// independently-built transactions hash identically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardTransaction {
    pub sender: Option<String>,
    pub receiver: String,
    pub amount: u64,
    pub timestamp: u64,
    pub hash: String,
}

impl RewardTransaction {
    /// Build an issuance of `amount` to `receiver` at `timestamp`.
    #[must_use]
    pub fn issuance(receiver: impl Into<String>, amount: u64, timestamp: u64) -> Self {
        let receiver = receiver.into();
        let mut tx = Self {
            sender: None,
            receiver,
            amount,
            timestamp,
            hash: String::new(),
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// Recompute the hash from the economically-relevant fields.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        hash_json(&json!({
            "sender": self.sender,
            "receiver": self.receiver,
            "amount": self.amount,
            "timestamp": self.timestamp,
        }))
    }

    /// Whether the stored hash matches a recomputation.
    #[must_use]
    pub fn verify_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuance_has_no_sender() {
        let tx = RewardTransaction::issuance("wx1abc", 1024, 1_700_000_000_000);
        assert!(tx.sender.is_none());
        assert!(tx.verify_hash());
    }

    #[test]
    fn hash_ignores_nothing_relevant() {
        let a = RewardTransaction::issuance("wx1abc", 1024, 1000);
        let b = RewardTransaction::issuance("wx1abc", 1024, 1000);
        assert_eq!(a.hash, b.hash);

        let different_amount = RewardTransaction::issuance("wx1abc", 2048, 1000);
        assert_ne!(a.hash, different_amount.hash);

        let different_time = RewardTransaction::issuance("wx1abc", 1024, 1001);
        assert_ne!(a.hash, different_time.hash);
    }

    #[test]
    fn tampering_fails_verification() {
        let mut tx = RewardTransaction::issuance("wx1abc", 1024, 1000);
        tx.amount = 999_999;
        assert!(!tx.verify_hash());
    }
}
