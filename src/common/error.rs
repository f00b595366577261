//! Common Error Types for the Settlement Engine
//!
//! Every module keeps its own error enum; `BridgeError` unifies them for
//! callers that only need a code and a retry decision.

use thiserror::Error;

use crate::assembler::AssemblerError;
use crate::esplora::EsploraError;
use crate::primitives::PrimitiveError;
use crate::registry::{GovernanceError, RevealError};
use crate::spv::{OracleError, ProofError, SpvError};
use crate::storage::StorageError;
use crate::sweep::{FeeError, LedgerError, SweepError};

/// Root error type for the settlement engine
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Malformed Bitcoin data
    #[error("bitcoin data error: {0}")]
    Primitive(#[from] PrimitiveError),

    /// Proof verification errors
    #[error("spv error: {0}")]
    Spv(#[from] SpvError),

    /// Proof generation errors
    #[error("proof generation error: {0}")]
    Proof(#[from] ProofError),

    /// Difficulty relay errors
    #[error("difficulty relay error: {0}")]
    Oracle(#[from] OracleError),

    /// Deposit reveal errors
    #[error("reveal error: {0}")]
    Reveal(#[from] RevealError),

    /// Sweep processing errors
    #[error("sweep error: {0}")]
    Sweep(#[from] SweepError),

    /// Fee allocation errors
    #[error("fee error: {0}")]
    Fee(#[from] FeeError),

    /// Balance ledger errors
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Vault governance errors
    #[error("governance error: {0}")]
    Governance(#[from] GovernanceError),

    /// Sweep assembly errors
    #[error("assembler error: {0}")]
    Assembler(#[from] AssemblerError),

    /// Storage errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Esplora API errors
    #[error("esplora error: {0}")]
    Esplora(#[from] EsploraError),
}

impl BridgeError {
    /// Check if this is a retryable error
    ///
    /// Only storage, network and relay failures are worth retrying; every
    /// other error is a deterministic rejection of the same input.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::Storage(e) => !matches!(
                e,
                StorageError::Duplicate(_) | StorageError::InvalidData(_)
            ),
            BridgeError::Oracle(_) | BridgeError::Esplora(_) | BridgeError::Proof(_) => true,
            BridgeError::Spv(SpvError::Oracle(_)) => true,
            BridgeError::Reveal(RevealError::Storage(_)) => true,
            BridgeError::Sweep(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "CONFIG_ERROR",
            BridgeError::Logging(_) => "LOGGING_ERROR",
            BridgeError::Primitive(_) => "MALFORMED_BITCOIN_DATA",
            BridgeError::Spv(_) => "SPV_ERROR",
            BridgeError::Proof(_) => "PROOF_GENERATION_ERROR",
            BridgeError::Oracle(_) => "ORACLE_ERROR",
            BridgeError::Reveal(e) => e.error_code(),
            BridgeError::Sweep(e) => e.error_code(),
            BridgeError::Fee(_) => "FEE_ERROR",
            BridgeError::Ledger(_) => "LEDGER_ERROR",
            BridgeError::Governance(_) => "GOVERNANCE_ERROR",
            BridgeError::Assembler(_) => "ASSEMBLER_ERROR",
            BridgeError::Storage(_) => "STORAGE_ERROR",
            BridgeError::Esplora(_) => "ESPLORA_ERROR",
        }
    }
}

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err: BridgeError = SpvError::InvalidMerkleProof.into();
        assert_eq!(err.error_code(), "SPV_ERROR");
        assert!(err.to_string().contains("merkle"));

        let err: BridgeError = RevealError::DuplicateReveal.into();
        assert_eq!(err.error_code(), "DUPLICATE_REVEAL");

        // Nested errors keep the code of the failing stage
        let err: BridgeError = SweepError::Spv(SpvError::InvalidMerkleProof).into();
        assert_eq!(err.error_code(), "SPV_ERROR");
        let err: BridgeError = SweepError::DepositAlreadySwept { index: 2 }.into();
        assert_eq!(err.error_code(), "DEPOSIT_ALREADY_SWEPT");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(BridgeError::from(StorageError::Connection("pool".into())).is_retryable());
        assert!(BridgeError::from(OracleError::NotInitialized).is_retryable());
        assert!(BridgeError::from(SpvError::Oracle(OracleError::NotInitialized)).is_retryable());
        assert!(!BridgeError::from(StorageError::Duplicate("k".into())).is_retryable());
        assert!(!BridgeError::from(SpvError::InvalidMerkleProof).is_retryable());
        assert!(!BridgeError::from(SweepError::NoDepositsSwept).is_retryable());
    }
}
