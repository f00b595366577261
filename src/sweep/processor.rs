//! Sweep proof processing
//!
//! Turns a proven sweep transaction into a `SweepPlan`: the store commit that
//! marks its deposits swept and moves the wallet's sweep pointer, plus the
//! credits owed to depositors. Planning only reads the store; the engine
//! applies the plan.

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use super::fee::{allocate_fee, sweep_fee, FeeError, FeeRemainderPolicy};
use super::ledger::LedgerError;
use crate::primitives::script::classify_script;
use crate::primitives::vectors::{
    extract_input_at, extract_output_at, input_outpoint, output_script, output_value,
    validate_input_vector, validate_output_vector,
};
use crate::primitives::PrimitiveError;
use crate::spv::{SpvError, SpvVerifier};
use crate::storage::{SettlementStore, StorageError, SweepCommit};
use crate::types::deposit::{LedgerAddress, OutpointKey};
use crate::types::sweep::{BitcoinTxInfo, Credit, PreviousSweep, SweepOutcome, SweepProof};

/// Sweep errors
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Primitive(#[from] PrimitiveError),

    #[error("proof rejected: {0}")]
    Spv(#[from] SpvError),

    #[error("sweep has {0} outputs, exactly one is supported")]
    MultiOutputSweepUnsupported(usize),

    #[error("sweep output is neither P2PKH nor P2WPKH")]
    UnsupportedWalletOutput,

    #[error("claimed previous sweep does not match the wallet's sweep pointer")]
    InvalidPreviousSweepData,

    #[error("input {index} spends a deposit that is already swept")]
    DepositAlreadySwept { index: usize },

    #[error("input {index} deposit vault {deposit:?} differs from sweep vault {sweep:?}")]
    VaultMismatch {
        index: usize,
        deposit: Option<LedgerAddress>,
        sweep: Option<LedgerAddress>,
    },

    #[error("input {index} is neither a revealed deposit nor the previous sweep output")]
    UnknownInputOrigin { index: usize },

    #[error("sweep does not spend the wallet's previous sweep output")]
    MissingPreviousSweepInput,

    #[error("sweep spends no revealed deposits")]
    NoDepositsSwept,

    #[error("input value overflows")]
    ValueOverflow,

    #[error(transparent)]
    Fee(#[from] FeeError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ledger rejected credits: {0}")]
    Ledger(#[from] LedgerError),

    #[error("sweep settlement aborted: {0}")]
    SettlementAborted(String),
}

impl SweepError {
    /// Stable code for logs and API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            SweepError::Primitive(_) => "MALFORMED_BITCOIN_DATA",
            SweepError::Spv(_) => "SPV_ERROR",
            SweepError::MultiOutputSweepUnsupported(_) => "MULTI_OUTPUT_SWEEP_UNSUPPORTED",
            SweepError::UnsupportedWalletOutput => "UNSUPPORTED_WALLET_OUTPUT",
            SweepError::InvalidPreviousSweepData => "INVALID_PREVIOUS_SWEEP_DATA",
            SweepError::DepositAlreadySwept { .. } => "DEPOSIT_ALREADY_SWEPT",
            SweepError::VaultMismatch { .. } => "VAULT_MISMATCH",
            SweepError::UnknownInputOrigin { .. } => "UNKNOWN_INPUT_ORIGIN",
            SweepError::MissingPreviousSweepInput => "MISSING_PREVIOUS_SWEEP_INPUT",
            SweepError::NoDepositsSwept => "NO_DEPOSITS_SWEPT",
            SweepError::ValueOverflow => "VALUE_OVERFLOW",
            SweepError::Fee(_) => "FEE_ERROR",
            SweepError::Storage(_) => "STORAGE_ERROR",
            SweepError::Ledger(_) => "LEDGER_ERROR",
            SweepError::SettlementAborted(_) => "SETTLEMENT_ABORTED",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SweepError::Spv(SpvError::Oracle(_)) => true,
            SweepError::Storage(e) => !matches!(e, StorageError::InvalidData(_)),
            SweepError::Ledger(LedgerError::Unavailable(_)) => true,
            _ => false,
        }
    }
}

/// Everything an accepted sweep changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    pub commit: SweepCommit,
    pub outcome: SweepOutcome,
}

/// Validates sweeps against the registry and the wallet's sweep chain
pub struct SweepProcessor {
    store: Arc<dyn SettlementStore>,
    verifier: SpvVerifier,
    max_fee_per_deposit: Option<u64>,
    fee_policy: FeeRemainderPolicy,
}

impl SweepProcessor {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        verifier: SpvVerifier,
        max_fee_per_deposit: Option<u64>,
        fee_policy: FeeRemainderPolicy,
    ) -> Self {
        Self {
            store,
            verifier,
            max_fee_per_deposit,
            fee_policy,
        }
    }

    pub fn fee_policy(&self) -> FeeRemainderPolicy {
        self.fee_policy
    }

    /// Validate a sweep and compute its effects without applying them
    ///
    /// `claimed_previous` is ignored for a wallet that has never swept.
    pub async fn plan(
        &self,
        sweep_tx: &BitcoinTxInfo,
        proof: &SweepProof,
        claimed_previous: &PreviousSweep,
        vault: Option<LedgerAddress>,
    ) -> Result<SweepPlan, SweepError> {
        let vault = vault.and_then(LedgerAddress::non_zero);
        let input_count = validate_input_vector(&sweep_tx.input_vector)?;
        let output_count = validate_output_vector(&sweep_tx.output_vector)?;

        let sweep_tx_hash = sweep_tx.hash();
        self.verifier.verify_proof(&sweep_tx_hash, proof).await?;

        if output_count != 1 {
            return Err(SweepError::MultiOutputSweepUnsupported(output_count));
        }
        let output = extract_output_at(&sweep_tx.output_vector, 0)?;
        let output_value = output_value(output)?;
        let wallet_pub_key_hash = classify_script(output_script(output)?)
            .wallet_key_hash()
            .ok_or(SweepError::UnsupportedWalletOutput)?;

        let pointer = self.store.sweep_pointer(&wallet_pub_key_hash).await?;
        if let Some(expected) = pointer {
            if claimed_previous.pointer() != expected {
                return Err(SweepError::InvalidPreviousSweepData);
            }
        }

        let mut previous_spent = false;
        let mut total_inputs: u64 = 0;
        let mut seen: HashSet<OutpointKey> = HashSet::new();
        let mut keys: Vec<OutpointKey> = Vec::new();
        let mut deposits: Vec<(LedgerAddress, u64)> = Vec::new();

        for index in 0..input_count {
            let input = extract_input_at(&sweep_tx.input_vector, index)?;
            let (tx_hash, output_index) = input_outpoint(input)?;
            let key = OutpointKey::derive(&tx_hash, output_index);

            let value = match self.store.get_deposit(&key).await? {
                Some(record) => {
                    if record.is_swept() || !seen.insert(key) {
                        return Err(SweepError::DepositAlreadySwept { index });
                    }
                    if record.vault != vault {
                        return Err(SweepError::VaultMismatch {
                            index,
                            deposit: record.vault,
                            sweep: vault,
                        });
                    }
                    keys.push(key);
                    deposits.push((record.depositor, record.amount));
                    record.amount
                }
                None if pointer.is_some()
                    && !previous_spent
                    && tx_hash == claimed_previous.tx_hash
                    && output_index == 0 =>
                {
                    previous_spent = true;
                    claimed_previous.tx_output_value
                }
                None => return Err(SweepError::UnknownInputOrigin { index }),
            };

            total_inputs = total_inputs
                .checked_add(value)
                .ok_or(SweepError::ValueOverflow)?;
        }

        if pointer.is_some() && !previous_spent {
            return Err(SweepError::MissingPreviousSweepInput);
        }
        if deposits.is_empty() {
            return Err(SweepError::NoDepositsSwept);
        }

        let fee = sweep_fee(total_inputs, output_value)?;
        let amounts: Vec<u64> = deposits.iter().map(|(_, amount)| *amount).collect();
        let allocation = allocate_fee(fee, &amounts, self.max_fee_per_deposit, self.fee_policy)?;

        let credits = deposits
            .iter()
            .zip(&allocation.credits)
            .map(|((depositor, _), amount)| Credit {
                depositor: *depositor,
                amount: *amount,
            })
            .collect();

        let main_utxo = PreviousSweep {
            tx_hash: sweep_tx_hash,
            tx_output_value: output_value,
        };

        Ok(SweepPlan {
            commit: SweepCommit {
                wallet_pub_key_hash,
                previous_pointer: pointer,
                new_pointer: main_utxo.pointer(),
                deposits: keys,
                swept_at: chrono::Utc::now().timestamp().max(0) as u64,
            },
            outcome: SweepOutcome {
                sweep_tx_hash,
                wallet_pub_key_hash,
                main_utxo,
                vault,
                total_fee: allocation.total_fee,
                fee_share: allocation.fee_share,
                credits,
            },
        })
    }
}
