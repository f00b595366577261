//! Bitcoin merkle proof verification
//!
//! Bitcoin uses double SHA256 for merkle tree computation. Proof nodes are
//! provided from leaf to root, all in internal byte order.

use super::SpvError;
use crate::primitives::hash::double_sha256_pair;

/// Split a concatenated merkle path into 32-byte siblings
pub fn parse_merkle_path(path: &[u8]) -> Result<Vec<[u8; 32]>, SpvError> {
    if path.len() % 32 != 0 {
        return Err(SpvError::InvalidLength(format!(
            "merkle path must be a multiple of 32 bytes, got {}",
            path.len()
        )));
    }

    Ok(path
        .chunks_exact(32)
        .map(|chunk| {
            let mut node = [0u8; 32];
            node.copy_from_slice(chunk);
            node
        })
        .collect())
}

/// Compute the merkle root from a leaf and proof
///
/// An empty proof means the transaction is the only one in its block and
/// is its own root.
pub fn compute_merkle_root(
    tx_hash: &[u8; 32],
    tx_index: u32,
    merkle_proof: &[[u8; 32]],
) -> [u8; 32] {
    let mut current = *tx_hash;
    let mut index = tx_index;

    for sibling in merkle_proof {
        // Even index: hash(current || sibling)
        // Odd index: hash(sibling || current)
        current = if index & 1 == 0 {
            double_sha256_pair(&current, sibling)
        } else {
            double_sha256_pair(sibling, &current)
        };
        index >>= 1;
    }

    current
}

/// Compute merkle root for a list of transaction hashes
///
/// The last element at an odd-sized level is duplicated (Bitcoin rule).
pub fn compute_merkle_root_from_txs(tx_hashes: &[[u8; 32]]) -> Option<[u8; 32]> {
    let mut level: Vec<[u8; 32]> = tx_hashes.to_vec();

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(level[level.len() - 1]);
        }

        level = level
            .chunks_exact(2)
            .map(|pair| double_sha256_pair(&pair[0], &pair[1]))
            .collect();
    }

    level.first().copied()
}

/// Build the proof for the transaction at `tx_index`
pub fn build_merkle_proof(tx_hashes: &[[u8; 32]], tx_index: usize) -> Option<Vec<[u8; 32]>> {
    if tx_index >= tx_hashes.len() {
        return None;
    }

    let mut proof = Vec::new();
    let mut level: Vec<[u8; 32]> = tx_hashes.to_vec();
    let mut index = tx_index;

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(level[level.len() - 1]);
        }

        proof.push(level[index ^ 1]);

        level = level
            .chunks_exact(2)
            .map(|pair| double_sha256_pair(&pair[0], &pair[1]))
            .collect();
        index >>= 1;
    }

    Some(proof)
}
