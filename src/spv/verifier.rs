//! SPV verifier
//!
//! Proves that a transaction hash is included in the first header of a
//! header chain, and that the chain carries enough accumulated work
//! relative to the difficulty reported by the relay.

use std::sync::Arc;

use super::difficulty::{compact_to_target, difficulty, hash_meets_target};
use super::header::parse_header_chain;
use super::merkle::{compute_merkle_root, parse_merkle_path};
use super::relay::DifficultyOracle;
use super::SpvError;
use crate::types::sweep::SweepProof;

/// Stateless verifier bound to one relay and one confirmation policy
#[derive(Clone)]
pub struct SpvVerifier {
    oracle: Arc<dyn DifficultyOracle>,
    confirmation_factor: u64,
    pow_limit_bits: u32,
}

/// What a successful verification observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofSummary {
    /// Epoch difficulty the first header matched
    pub epoch_difficulty: u128,
    /// Sum of per-header difficulties over the chain
    pub accumulated_difficulty: u128,
    pub headers: usize,
}

impl SpvVerifier {
    pub fn new(
        oracle: Arc<dyn DifficultyOracle>,
        confirmation_factor: u64,
        pow_limit_bits: u32,
    ) -> Self {
        Self {
            oracle,
            confirmation_factor,
            pow_limit_bits,
        }
    }

    pub fn confirmation_factor(&self) -> u64 {
        self.confirmation_factor
    }

    /// Verify a proof in its wire form
    pub async fn verify_proof(
        &self,
        tx_hash: &[u8; 32],
        proof: &SweepProof,
    ) -> Result<ProofSummary, SpvError> {
        self.verify(
            tx_hash,
            &proof.bitcoin_headers,
            &proof.merkle_proof,
            proof.tx_index_in_block,
        )
        .await
    }

    /// Verify inclusion and work
    ///
    /// `tx_hash` and every merkle node are in internal byte order.
    pub async fn verify(
        &self,
        tx_hash: &[u8; 32],
        headers: &[u8],
        merkle_path: &[u8],
        tx_index: u32,
    ) -> Result<ProofSummary, SpvError> {
        let chain = parse_header_chain(headers)?;
        let siblings = parse_merkle_path(merkle_path)?;

        let first = chain
            .first()
            .ok_or_else(|| SpvError::InvalidLength("empty header chain".to_string()))?;

        if compute_merkle_root(tx_hash, tx_index, &siblings) != first.merkle_root {
            return Err(SpvError::InvalidMerkleProof);
        }

        let first_difficulty = difficulty(first.bits, self.pow_limit_bits)?;
        let current = self.oracle.current_epoch_difficulty().await?;
        let previous = self.oracle.previous_epoch_difficulty().await?;

        let epoch_difficulty = if first_difficulty == current {
            current
        } else if first_difficulty == previous {
            previous
        } else {
            return Err(SpvError::StaleOrFutureDifficulty {
                found: first_difficulty,
                current,
                previous,
            });
        };

        let mut accumulated: u128 = 0;
        let mut prev_hash: Option<[u8; 32]> = None;

        for (index, header) in chain.iter().enumerate() {
            if let Some(expected) = prev_hash {
                if header.prev_block_hash != expected {
                    return Err(SpvError::BrokenChain { index });
                }
            }

            let hash = header.block_hash();
            let target = compact_to_target(header.bits)?;
            if !hash_meets_target(&hash, &target) {
                return Err(SpvError::InsufficientPerHeaderWork { index });
            }

            let work = difficulty(header.bits, self.pow_limit_bits)?;
            accumulated = accumulated.checked_add(work).ok_or_else(|| {
                SpvError::InvalidTarget("accumulated difficulty overflows".to_string())
            })?;

            prev_hash = Some(hash);
        }

        let required = epoch_difficulty
            .checked_mul(self.confirmation_factor as u128)
            .ok_or_else(|| SpvError::InvalidTarget("required difficulty overflows".to_string()))?;

        if accumulated < required {
            return Err(SpvError::InsufficientAccumulatedWork {
                observed: accumulated,
                required,
            });
        }

        tracing::debug!(
            target: "sweepbridge::spv",
            headers = chain.len(),
            accumulated = %accumulated,
            required = %required,
            "proof accepted"
        );

        Ok(ProofSummary {
            epoch_difficulty,
            accumulated_difficulty: accumulated,
            headers: chain.len(),
        })
    }
}
