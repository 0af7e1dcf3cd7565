//! Merkle commitment over transaction hashes.
//!
//! The fold pairs adjacent hashes level by level; a level with an odd
//! count duplicates its last hash to pair with itself. Parents hash the
//! concatenation of the two child hex strings. The same rule drives both
//! root computation and inclusion proofs, so a proof built by one peer
//! verifies against a root built by another.

use serde::{Deserialize, Serialize};

/// Hash two child hex strings into their parent.
fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Root over an empty transaction set.
fn empty_root() -> String {
    blake3::hash(&[]).to_hex().to_string()
}

/// Fold transaction hashes into a merkle root.
///
/// Deterministic: the same sequence of hashes always folds to the same
/// root. Callers are responsible for ordering the input consistently.
#[must_use]
pub fn merkle_root(hashes: &[String]) -> String {
    if hashes.is_empty() {
        return empty_root();
    }

    let mut level: Vec<String> = hashes.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left); // odd count: self-pair
            next.push(hash_pair(left, right));
        }
        level = next;
    }
    level.remove(0)
}

/// Inclusion proof: the sibling hashes along the path from a leaf to the
/// root, bottom-up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub siblings: Vec<String>,
}

/// Build an inclusion proof for the leaf at `index`, or `None` if the
/// index is out of range.
#[must_use]
pub fn proof_for(hashes: &[String], index: usize) -> Option<MerkleProof> {
    if index >= hashes.len() {
        return None;
    }

    let mut siblings = Vec::new();
    let mut level: Vec<String> = hashes.to_vec();
    let mut idx = index;

    while level.len() > 1 {
        let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
        // Odd count and we are the last leaf: sibling is ourselves
        let sibling = level.get(sibling_idx).unwrap_or(&level[idx]);
        siblings.push(sibling.clone());

        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            next.push(hash_pair(left, right));
        }
        level = next;
        idx /= 2;
    }

    Some(MerkleProof {
        leaf_index: index,
        siblings,
    })
}

/// Verify an inclusion proof against a root.
#[must_use]
pub fn verify_proof(leaf: &str, proof: &MerkleProof, root: &str) -> bool {
    let mut current = leaf.to_string();
    let mut idx = proof.leaf_index;

    for sibling in &proof.siblings {
        current = if idx % 2 == 0 {
            hash_pair(&current, sibling)
        } else {
            hash_pair(sibling, &current)
        };
        idx /= 2;
    }

    current == root
}
