//! Sweep Transaction Assembler
//!
//! Client-side counterpart of the sweep processor. Builds and signs the
//! Bitcoin transaction that consolidates deposit UTXOs, and optionally the
//! wallet's main UTXO, into one wallet-owned output. The result has exactly
//! the shape the processor accepts:
//!
//! 1. Main UTXO first, then deposits in caller order
//! 2. A single P2WPKH or P2PKH output paying the wallet
//! 3. Version 1, locktime 0, final sequences

pub mod broadcast;
pub mod builder;
pub mod signer;
pub mod utxo;

use thiserror::Error;

use crate::esplora::EsploraError;

// Re-exports for convenience
pub use broadcast::SweepBroadcaster;
pub use builder::{AssembledSweep, SweepAssembler};
pub use signer::{SweepSigner, WalletSigner};
pub use utxo::{fetch_utxo, Utxo};

/// Assembler errors
#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("{utxos} UTXOs for {deposits} deposits")]
    EmptyOrMismatchedInputSet { utxos: usize, deposits: usize },

    #[error("invalid UTXO: {0}")]
    InvalidUtxo(String),

    #[error("main UTXO is not locked to the wallet key")]
    UtxoNotOwnedByWallet,

    #[error("deposit {index}: UTXO holds {utxo} sats, expected {expected}")]
    AmountMismatch { index: usize, utxo: u64, expected: u64 },

    #[error("deposit {index} is locked to a different wallet key")]
    WalletKeyMismatch { index: usize },

    #[error("deposit {index} output is neither P2SH nor P2WSH")]
    UnsupportedDepositScript { index: usize },

    #[error("deposit {index} output does not commit to its deposit script")]
    DepositScriptMismatch { index: usize },

    #[error("fee {fee} exceeds input value {inputs}")]
    FeeExceedsInputs { fee: u64, inputs: u64 },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("bitcoin client error: {0}")]
    Client(#[from] EsploraError),
}
