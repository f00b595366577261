//! Sweep Types
//!
//! Inputs and outputs of sweep proof processing.

use serde::{Deserialize, Serialize};

use super::deposit::LedgerAddress;
use crate::primitives::encoding::{reverse_bytes, PrimitiveError};
use crate::primitives::hash::{double_sha256, sha256};

/// A Bitcoin transaction split into its legacy (non-witness) parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinTxInfo {
    pub version: [u8; 4],
    /// Compact-size count followed by the serialized inputs
    pub input_vector: Vec<u8>,
    /// Compact-size count followed by the serialized outputs
    pub output_vector: Vec<u8>,
    pub locktime: [u8; 4],
}

impl BitcoinTxInfo {
    /// Canonical transaction hash in internal byte order
    pub fn hash(&self) -> [u8; 32] {
        let mut raw = Vec::with_capacity(8 + self.input_vector.len() + self.output_vector.len());
        raw.extend_from_slice(&self.version);
        raw.extend_from_slice(&self.input_vector);
        raw.extend_from_slice(&self.output_vector);
        raw.extend_from_slice(&self.locktime);
        double_sha256(&raw)
    }

    /// Transaction id as shown by block explorers
    pub fn txid_hex(&self) -> String {
        hex::encode(reverse_bytes(&self.hash()))
    }

    pub fn from_transaction(tx: &bitcoin::Transaction) -> Self {
        Self {
            version: tx.version.0.to_le_bytes(),
            input_vector: bitcoin::consensus::serialize(&tx.input),
            output_vector: bitcoin::consensus::serialize(&tx.output),
            locktime: tx.lock_time.to_consensus_u32().to_le_bytes(),
        }
    }

    /// Parse a fully serialized transaction (witness data is dropped)
    pub fn from_raw(raw: &[u8]) -> Result<Self, PrimitiveError> {
        let tx: bitcoin::Transaction = bitcoin::consensus::deserialize(raw)
            .map_err(|e| PrimitiveError::MalformedVector(format!("invalid transaction: {}", e)))?;
        Ok(Self::from_transaction(&tx))
    }
}

/// SPV proof that a transaction is buried under enough work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepProof {
    /// Concatenated 32-byte merkle siblings, leaf to root
    pub merkle_proof: Vec<u8>,
    /// Position of the transaction in its block
    pub tx_index_in_block: u32,
    /// Concatenated 80-byte headers; the first contains the transaction
    pub bitcoin_headers: Vec<u8>,
}

/// The wallet's previous sweep, as claimed by the caller
///
/// The previous sweep always has exactly one output, so the spent outpoint
/// is `(tx_hash, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreviousSweep {
    /// Transaction hash in internal byte order
    pub tx_hash: [u8; 32],
    pub tx_output_value: u64,
}

impl PreviousSweep {
    /// Value stored as the wallet's sweep pointer
    pub fn pointer(&self) -> [u8; 32] {
        let mut preimage = [0u8; 40];
        preimage[..32].copy_from_slice(&self.tx_hash);
        preimage[32..].copy_from_slice(&self.tx_output_value.to_be_bytes());
        sha256(&preimage)
    }
}

/// One balance increase produced by a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub depositor: LedgerAddress,
    pub amount: u64,
}

/// Result of a successfully processed sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub sweep_tx_hash: [u8; 32],
    pub wallet_pub_key_hash: [u8; 20],
    /// The sweep's single output, which the next sweep must spend
    pub main_utxo: PreviousSweep,
    pub vault: Option<LedgerAddress>,
    pub total_fee: u64,
    pub fee_share: u64,
    pub credits: Vec<Credit>,
}

impl SweepOutcome {
    pub fn total_credited(&self) -> u64 {
        self.credits.iter().map(|c| c.amount).sum()
    }
}
