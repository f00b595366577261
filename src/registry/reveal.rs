//! Deposit reveal
//!
//! A depositor funds a P2SH or P2WSH output locked to the deposit script and
//! then reveals the script parameters. The registry rebuilds the script,
//! checks it against the funding output and records the deposit under its
//! outpoint key. Funding confirmation is not checked here; an unconfirmed
//! deposit simply never shows up in a proven sweep.

use std::sync::Arc;
use thiserror::Error;

use super::vault::VaultRegistry;
use crate::events::DepositRevealed;
use crate::primitives::script::{classify_script, ScriptKind};
use crate::primitives::vectors::{
    extract_output_at, output_script, output_value, validate_input_vector, validate_output_vector,
};
use crate::primitives::{hash160, sha256, PrimitiveError};
use crate::storage::{SettlementStore, StorageError};
use crate::types::deposit::{DepositRecord, LedgerAddress, OutpointKey, RevealInfo};
use crate::types::sweep::BitcoinTxInfo;

/// Reveal errors
#[derive(Debug, Error)]
pub enum RevealError {
    #[error("vault {0} is not trusted")]
    UntrustedVault(LedgerAddress),

    #[error(transparent)]
    Primitive(#[from] PrimitiveError),

    #[error("funding output is neither P2SH nor P2WSH")]
    UnsupportedScriptHashLength,

    #[error("funding output does not commit to the revealed deposit script")]
    ScriptHashMismatch,

    #[error("deposit of {amount} sats is below the dust threshold of {threshold}")]
    DepositBelowDustThreshold { amount: u64, threshold: u64 },

    #[error("deposit already revealed")]
    DuplicateReveal,

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl RevealError {
    /// Stable code for logs and API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            RevealError::UntrustedVault(_) => "UNTRUSTED_VAULT",
            RevealError::Primitive(_) => "MALFORMED_BITCOIN_DATA",
            RevealError::UnsupportedScriptHashLength => "UNSUPPORTED_SCRIPT_HASH_LENGTH",
            RevealError::ScriptHashMismatch => "SCRIPT_HASH_MISMATCH",
            RevealError::DepositBelowDustThreshold { .. } => "DEPOSIT_BELOW_DUST_THRESHOLD",
            RevealError::DuplicateReveal => "DUPLICATE_REVEAL",
            RevealError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<StorageError> for RevealError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Duplicate(_) => RevealError::DuplicateReveal,
            other => RevealError::Storage(other),
        }
    }
}

/// Validates reveals and writes them to the store
pub struct DepositRegistry {
    store: Arc<dyn SettlementStore>,
    vaults: Arc<dyn VaultRegistry>,
    dust_threshold: u64,
}

impl DepositRegistry {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        vaults: Arc<dyn VaultRegistry>,
        dust_threshold: u64,
    ) -> Self {
        Self {
            store,
            vaults,
            dust_threshold,
        }
    }

    pub fn dust_threshold(&self) -> u64 {
        self.dust_threshold
    }

    /// Register one funding output
    pub async fn reveal(
        &self,
        funding_tx: &BitcoinTxInfo,
        info: &RevealInfo,
    ) -> Result<DepositRevealed, RevealError> {
        let vault = info.vault.and_then(LedgerAddress::non_zero);
        if let Some(vault) = vault {
            if !self.vaults.is_trusted(&vault).await {
                return Err(RevealError::UntrustedVault(vault));
            }
        }

        validate_input_vector(&funding_tx.input_vector)?;
        validate_output_vector(&funding_tx.output_vector)?;

        let output = extract_output_at(
            &funding_tx.output_vector,
            info.funding_output_index as usize,
        )?;
        let expected_script = info.script_params().script();

        let committed = match classify_script(output_script(output)?) {
            ScriptKind::P2sh(hash) => hash == hash160(&expected_script),
            ScriptKind::P2wsh(hash) => hash == sha256(&expected_script),
            // A 20-byte key hash can never equal a script commitment.
            ScriptKind::P2pkh(_) | ScriptKind::P2wpkh(_) => false,
            ScriptKind::Unsupported => return Err(RevealError::UnsupportedScriptHashLength),
        };
        if !committed {
            return Err(RevealError::ScriptHashMismatch);
        }

        let amount = output_value(output)?;
        if self.dust_threshold > 0 && amount < self.dust_threshold {
            return Err(RevealError::DepositBelowDustThreshold {
                amount,
                threshold: self.dust_threshold,
            });
        }

        let funding_tx_hash = funding_tx.hash();
        let key = OutpointKey::derive(&funding_tx_hash, info.funding_output_index);

        if self.store.get_deposit(&key).await?.is_some() {
            return Err(RevealError::DuplicateReveal);
        }

        let record = DepositRecord::new(info.depositor, amount, vault);
        self.store.insert_deposit(&key, &record).await?;

        tracing::debug!(
            target: "sweepbridge::reveal",
            outpoint_key = %key,
            amount,
            depositor = %info.depositor,
            "deposit recorded"
        );

        Ok(DepositRevealed {
            outpoint_key: key,
            funding_tx_hash,
            funding_output_index: info.funding_output_index,
            depositor: info.depositor,
            amount,
            blinding_factor: info.blinding_factor,
            wallet_pub_key_hash: info.wallet_pub_key_hash,
            refund_pub_key_hash: info.refund_pub_key_hash,
            refund_locktime: info.refund_locktime,
            vault,
        })
    }
}
