//! SPV Module
//!
//! Simplified payment verification of Bitcoin transactions:
//! - Block header parsing and header-chain linking
//! - Merkle inclusion proofs
//! - Compact targets and difficulty relative to the network pow limit
//! - The difficulty relay interface
//! - Proof generation from an Esplora backend

pub mod difficulty;
pub mod header;
pub mod merkle;
pub mod proof;
pub mod relay;
pub mod verifier;

use thiserror::Error;

// Re-exports for convenience
pub use difficulty::{
    compact_to_target, difficulty, hash_meets_target, MAINNET_POW_LIMIT_BITS,
    REGTEST_POW_LIMIT_BITS,
};
pub use header::{parse_header_chain, serialize_header_chain, BlockHeader, HEADER_LEN};
pub use merkle::{build_merkle_proof, compute_merkle_root, compute_merkle_root_from_txs};
pub use proof::{ProofError, SpvProofGenerator};
pub use relay::{DifficultyOracle, OracleError, StaticDifficultyRelay};
pub use verifier::{ProofSummary, SpvVerifier};

/// SPV verification errors
#[derive(Debug, Error)]
pub enum SpvError {
    #[error("invalid length: {0}")]
    InvalidLength(String),

    #[error("merkle proof does not match the first header's root")]
    InvalidMerkleProof,

    #[error("stale first header difficulty {found}: current {current}, previous {previous}")]
    StaleOrFutureDifficulty {
        found: u128,
        current: u128,
        previous: u128,
    },

    #[error("header {index} does not reference the previous header")]
    BrokenChain { index: usize },

    #[error("header {index} hash is above its target")]
    InsufficientPerHeaderWork { index: usize },

    #[error("insufficient accumulated difficulty: {observed} < {required}")]
    InsufficientAccumulatedWork { observed: u128, required: u128 },

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("difficulty relay error: {0}")]
    Oracle(#[from] OracleError),
}
