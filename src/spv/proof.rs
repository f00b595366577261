//! SPV proof generation
//!
//! Builds a [`SweepProof`] for a confirmed transaction from an Esplora
//! backend: the merkle path, the transaction's position, and a run of
//! headers starting at the block that contains it.

use std::sync::Arc;
use thiserror::Error;

use super::header::HEADER_LEN;
use crate::esplora::{ChainSource, EsploraError};
use crate::primitives::encoding::PrimitiveError;
use crate::types::sweep::{BitcoinTxInfo, SweepProof};

/// Proof generation errors
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("esplora error: {0}")]
    Esplora(#[from] EsploraError),

    #[error("transaction not confirmed")]
    TxNotConfirmed,

    #[error("need {required} headers from height {height}, chain tip is {tip}")]
    NotEnoughConfirmations { height: u64, required: u64, tip: u64 },

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("invalid transaction: {0}")]
    Transaction(#[from] PrimitiveError),
}

/// SPV proof generator over a chain data source, normally Esplora
pub struct SpvProofGenerator {
    client: Arc<dyn ChainSource>,
    headers_required: u64,
}

impl SpvProofGenerator {
    /// `headers_required` is normally the verifier's confirmation factor
    pub fn new(client: Arc<dyn ChainSource>, headers_required: u64) -> Self {
        Self {
            client,
            headers_required: headers_required.max(1),
        }
    }

    /// Generate the transaction parts and proof for a display-order txid
    pub async fn generate(&self, txid: &str) -> Result<(BitcoinTxInfo, SweepProof), ProofError> {
        let status = self.client.tx_status(txid).await?;
        if !status.confirmed {
            return Err(ProofError::TxNotConfirmed);
        }

        let raw = self.client.raw_transaction(txid).await?;
        let tx_info = BitcoinTxInfo::from_raw(&raw)?;

        let merkle = self.client.merkle_proof(txid).await?;
        let merkle_proof = decode_merkle_siblings(&merkle.merkle)?;

        let height = merkle.block_height;
        let last = height.saturating_add(self.headers_required - 1);
        let tip = self.client.tip_height().await?;
        if tip < last {
            return Err(ProofError::NotEnoughConfirmations {
                height,
                required: self.headers_required,
                tip,
            });
        }

        let mut bitcoin_headers = Vec::with_capacity(self.headers_required as usize * HEADER_LEN);
        for h in height..=last {
            let hash = self.client.block_hash(h).await?;
            bitcoin_headers.extend(self.client.block_header(&hash).await?);
        }

        tracing::info!(
            target: "sweepbridge::spv",
            txid = %txid,
            height,
            headers = self.headers_required,
            "generated sweep proof"
        );

        Ok((
            tx_info,
            SweepProof {
                merkle_proof,
                tx_index_in_block: merkle.pos,
                bitcoin_headers,
            },
        ))
    }
}

/// Convert display-order hex siblings to concatenated internal-order bytes
pub fn decode_merkle_siblings(siblings: &[String]) -> Result<Vec<u8>, ProofError> {
    let mut out = Vec::with_capacity(siblings.len() * 32);

    for sibling_hex in siblings {
        let mut sibling = hex::decode(sibling_hex)
            .map_err(|e| ProofError::ParseError(format!("invalid merkle sibling: {}", e)))?;
        if sibling.len() != 32 {
            return Err(ProofError::ParseError(format!(
                "merkle sibling must be 32 bytes, got {}",
                sibling.len()
            )));
        }
        sibling.reverse();
        out.extend(sibling);
    }

    Ok(out)
}
