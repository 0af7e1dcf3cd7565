//! Negotiated genesis parameters.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reward issued to each funded participant in the genesis block.
pub const BASE_REWARD: u64 = 1024;

/// Difficulty recorded in the genesis block. Nothing in formation mines;
/// the value is carried forward for the chain layer.
pub const GENESIS_DIFFICULTY: u32 = 1;

/// Rules every participant signs up to by accepting the genesis block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsensusRules {
    pub difficulty: u32,
    pub block_interval_secs: u64,
    pub reward_halving_interval: u64,
    pub min_participants: usize,
}

impl Default for ConsensusRules {
    fn default() -> Self {
        Self {
            difficulty: GENESIS_DIFFICULTY,
            block_interval_secs: 60,
            reward_halving_interval: 100_000,
            min_participants: 2,
        }
    }
}

/// Derive the network id from the sorted participant ids and the
/// negotiation timestamp.
///
/// Two nodes that independently negotiate with the same peer set at the
/// same timestamp derive the same id — that is what lets them recognize
/// they formed the same network.
#[must_use]
pub fn derive_network_id(sorted_participant_ids: &[String], timestamp: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    for id in sorted_participant_ids {
        hasher.update(id.as_bytes());
        hasher.update(b",");
    }
    hasher.update(timestamp.to_string().as_bytes());
    let digest = hasher.finalize();
    format!("net_{}", &digest.to_hex()[..16])
}

/// The agreed-upon inputs to genesis construction.
///
/// Immutable after negotiation closes; the block builder consumes it
/// read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisParameters {
    /// Negotiation close time (unix millis); also the block timestamp.
    pub timestamp: u64,
    pub difficulty: u32,
    /// Unique participant ids, sorted.
    pub participants: Vec<String>,
    /// Wallet address → reward amount, equal distribution.
    pub reward_map: BTreeMap<String, u64>,
    /// Deterministically derived network identifier.
    pub network_id: String,
    pub consensus_rules: ConsensusRules,
}

impl GenesisParameters {
    /// Agree on parameters for the given participants.
    ///
    /// `participants` pairs each id with its wallet address, if any.
    /// Duplicate ids collapse; every participant with a wallet receives
    /// the same `base_reward`.
    pub fn agree(
        participants: &[(String, Option<String>)],
        timestamp: u64,
        base_reward: u64,
        rules: ConsensusRules,
    ) -> Result<Self> {
        let mut ids: Vec<String> = participants.iter().map(|(id, _)| id.clone()).collect();
        ids.sort();
        ids.dedup();

        let mut reward_map = BTreeMap::new();
        for (_, wallet) in participants {
            if let Some(addr) = wallet {
                reward_map.insert(addr.clone(), base_reward);
            }
        }
        if reward_map.is_empty() {
            return Err(Error::NoRewardableParticipants);
        }

        let network_id = derive_network_id(&ids, timestamp);

        Ok(Self {
            timestamp,
            difficulty: rules.difficulty,
            participants: ids,
            reward_map,
            network_id,
            consensus_rules: rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<(String, Option<String>)> {
        vec![
            ("cc".to_string(), Some("wx1c".to_string())),
            ("aa".to_string(), Some("wx1a".to_string())),
            ("bb".to_string(), None),
        ]
    }

    #[test]
    fn network_id_is_order_independent_after_sorting() {
        let mut ids = vec!["bb".to_string(), "aa".to_string(), "cc".to_string()];
        ids.sort();
        let a = derive_network_id(&ids, 1000);

        let mut ids2 = vec!["cc".to_string(), "bb".to_string(), "aa".to_string()];
        ids2.sort();
        let b = derive_network_id(&ids2, 1000);

        assert_eq!(a, b);
        assert!(a.starts_with("net_"));
    }

    #[test]
    fn network_id_depends_on_timestamp_and_roster() {
        let ids = vec!["aa".to_string(), "bb".to_string()];
        assert_ne!(derive_network_id(&ids, 1000), derive_network_id(&ids, 1001));

        let other = vec!["aa".to_string(), "zz".to_string()];
        assert_ne!(
            derive_network_id(&ids, 1000),
            derive_network_id(&other, 1000)
        );
    }

    #[test]
    fn agree_sorts_dedups_and_rewards_funded_participants() {
        let params =
            GenesisParameters::agree(&roster(), 1000, BASE_REWARD, ConsensusRules::default())
                .unwrap();

        assert_eq!(params.participants, vec!["aa", "bb", "cc"]);
        assert_eq!(params.reward_map.len(), 2);
        assert_eq!(params.reward_map["wx1a"], BASE_REWARD);
        assert_eq!(params.reward_map["wx1c"], BASE_REWARD);
        assert!(!params.reward_map.contains_key("bb"));
    }

    #[test]
    fn agree_requires_a_funded_participant() {
        let unfunded = vec![("aa".to_string(), None), ("bb".to_string(), None)];
        assert_eq!(
            GenesisParameters::agree(&unfunded, 1000, BASE_REWARD, ConsensusRules::default()),
            Err(Error::NoRewardableParticipants)
        );
    }

    #[test]
    fn independent_negotiations_converge() {
        let a = GenesisParameters::agree(&roster(), 1000, BASE_REWARD, ConsensusRules::default())
            .unwrap();
        let mut shuffled = roster();
        shuffled.reverse();
        let b = GenesisParameters::agree(&shuffled, 1000, BASE_REWARD, ConsensusRules::default())
            .unwrap();
        assert_eq!(a, b);
    }
}
