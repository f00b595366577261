//! Settlement Engine
//!
//! Composes the deposit registry and the sweep processor over one store and
//! serializes every state transition behind a single lock, so two sweeps of
//! the same wallet can never interleave between validation and commit.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::common::config::SettlementConfig;
use crate::common::logging::{log_proof_rejected, log_reveal_event, log_sweep_event};
use crate::events::{self, DepositsSwept, EventReceiver, EventSender, SettlementEvent};
use crate::primitives::reverse_bytes;
use crate::registry::{DepositRegistry, RevealError, VaultRegistry};
use crate::spv::{DifficultyOracle, SpvVerifier};
use crate::storage::{SettlementStore, StorageError};
use crate::sweep::{BalanceLedger, FeeRemainderPolicy, SweepError, SweepPlan, SweepProcessor};
use crate::types::deposit::{DepositRecord, LedgerAddress, OutpointKey, RevealInfo};
use crate::types::sweep::{BitcoinTxInfo, PreviousSweep, SweepOutcome, SweepProof};

/// Verification and accounting policy of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub tx_proof_difficulty_factor: u64,
    pub pow_limit_bits: u32,
    pub deposit_dust_threshold: u64,
    pub deposit_tx_max_fee: Option<u64>,
    pub fee_remainder_policy: FeeRemainderPolicy,
}

impl From<&SettlementConfig> for EngineSettings {
    fn from(config: &SettlementConfig) -> Self {
        Self {
            tx_proof_difficulty_factor: config.tx_proof_difficulty_factor,
            pow_limit_bits: config.network.pow_limit_bits(),
            deposit_dust_threshold: config.deposit_dust_threshold,
            deposit_tx_max_fee: config.deposit_tx_max_fee,
            fee_remainder_policy: config.fee_remainder_policy,
        }
    }
}

fn display_hash(hash: &[u8; 32]) -> String {
    hex::encode(reverse_bytes(hash))
}

pub struct SettlementEngine {
    store: Arc<dyn SettlementStore>,
    ledger: Arc<dyn BalanceLedger>,
    registry: DepositRegistry,
    processor: SweepProcessor,
    events: EventSender,
    transitions: Arc<Mutex<()>>,
}

impl SettlementEngine {
    pub fn new(
        settings: EngineSettings,
        store: Arc<dyn SettlementStore>,
        oracle: Arc<dyn DifficultyOracle>,
        ledger: Arc<dyn BalanceLedger>,
        vaults: Arc<dyn VaultRegistry>,
    ) -> Self {
        let verifier = SpvVerifier::new(
            oracle,
            settings.tx_proof_difficulty_factor,
            settings.pow_limit_bits,
        );

        Self {
            registry: DepositRegistry::new(store.clone(), vaults, settings.deposit_dust_threshold),
            processor: SweepProcessor::new(
                store.clone(),
                verifier,
                settings.deposit_tx_max_fee,
                settings.fee_remainder_policy,
            ),
            store,
            ledger,
            events: events::channel(),
            transitions: Arc::new(Mutex::new(())),
        }
    }

    pub fn from_config(
        config: &SettlementConfig,
        store: Arc<dyn SettlementStore>,
        oracle: Arc<dyn DifficultyOracle>,
        ledger: Arc<dyn BalanceLedger>,
        vaults: Arc<dyn VaultRegistry>,
    ) -> Self {
        Self::new(EngineSettings::from(config), store, oracle, ledger, vaults)
    }

    /// Receive notifications of committed reveals and sweeps
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Register a deposit; returns its outpoint key
    pub async fn reveal(
        &self,
        funding_tx: &BitcoinTxInfo,
        info: &RevealInfo,
    ) -> Result<OutpointKey, RevealError> {
        let _guard = self.transitions.lock().await;
        let funding_tx_hash = display_hash(&funding_tx.hash());

        match self.registry.reveal(funding_tx, info).await {
            Ok(revealed) => {
                log_reveal_event(
                    &revealed.outpoint_key.to_hex(),
                    &funding_tx_hash,
                    revealed.funding_output_index,
                    revealed.amount,
                    None,
                );
                let key = revealed.outpoint_key;
                // No subscribers is fine.
                let _ = self.events.send(SettlementEvent::DepositRevealed(revealed));
                Ok(key)
            }
            Err(e) => {
                log_reveal_event(
                    "-",
                    &funding_tx_hash,
                    info.funding_output_index,
                    0,
                    Some((e.error_code(), &e.to_string())),
                );
                Err(e)
            }
        }
    }

    /// Settle a proven sweep
    ///
    /// `claimed_previous` is ignored for a wallet's first sweep. Once the
    /// sweep passes validation it is settled on a separate task, so dropping
    /// the returned future never leaves it committed but uncredited.
    pub async fn sweep(
        &self,
        sweep_tx: &BitcoinTxInfo,
        proof: &SweepProof,
        claimed_previous: &PreviousSweep,
        vault: Option<LedgerAddress>,
    ) -> Result<SweepOutcome, SweepError> {
        let guard = self.transitions.clone().lock_owned().await;
        let sweep_tx_hash = display_hash(&sweep_tx.hash());

        let plan = match self
            .processor
            .plan(sweep_tx, proof, claimed_previous, vault)
            .await
        {
            Ok(plan) => plan,
            Err(e) => {
                log_proof_rejected(&sweep_tx_hash, e.error_code(), &e.to_string());
                return Err(e);
            }
        };

        let settlement = Settlement {
            store: self.store.clone(),
            ledger: self.ledger.clone(),
            events: self.events.clone(),
        };
        let task = tokio::spawn(async move {
            // Held until the sweep is either credited or reverted.
            let _guard = guard;
            let result = settlement.apply(plan).await;
            match &result {
                Ok(outcome) => log_sweep_event(
                    &sweep_tx_hash,
                    &hex::encode(outcome.wallet_pub_key_hash),
                    outcome.credits.len(),
                    outcome.total_fee,
                    outcome.fee_share,
                    outcome.main_utxo.tx_output_value,
                ),
                Err(e) => log_proof_rejected(&sweep_tx_hash, e.error_code(), &e.to_string()),
            }
            result
        });

        task.await.map_err(|e| {
            tracing::error!(
                target: "sweepbridge::sweep",
                error = %e,
                "sweep settlement task failed"
            );
            SweepError::SettlementAborted(e.to_string())
        })?
    }

    pub async fn deposit(&self, key: &OutpointKey) -> Result<Option<DepositRecord>, StorageError> {
        self.store.get_deposit(key).await
    }

    /// Current sweep pointer of a wallet
    pub async fn main_utxo_hash(
        &self,
        wallet_pub_key_hash: &[u8; 20],
    ) -> Result<Option<[u8; 32]>, StorageError> {
        self.store.sweep_pointer(wallet_pub_key_hash).await
    }
}

/// Owned handles for applying a validated sweep
struct Settlement {
    store: Arc<dyn SettlementStore>,
    ledger: Arc<dyn BalanceLedger>,
    events: EventSender,
}

impl Settlement {
    /// Commit, credit, and revert the commit if the ledger refuses
    async fn apply(self, plan: SweepPlan) -> Result<SweepOutcome, SweepError> {
        self.store.commit_sweep(&plan.commit).await?;

        let (depositors, amounts): (Vec<LedgerAddress>, Vec<u64>) = plan
            .outcome
            .credits
            .iter()
            .map(|credit| (credit.depositor, credit.amount))
            .unzip();

        let credited = match plan.outcome.vault {
            Some(vault) => {
                self.ledger
                    .increase_balances_and_call(vault, &depositors, &amounts)
                    .await
            }
            None => self.ledger.increase_balances(&depositors, &amounts).await,
        };

        if let Err(e) = credited {
            if let Err(revert) = self.store.revert_sweep(&plan.commit).await {
                tracing::error!(
                    target: "sweepbridge::sweep",
                    error = %revert,
                    wallet = %hex::encode(plan.commit.wallet_pub_key_hash),
                    "failed to revert sweep after ledger rejection"
                );
                return Err(SweepError::Storage(revert));
            }
            return Err(SweepError::Ledger(e));
        }

        let outcome = plan.outcome;
        let _ = self.events.send(SettlementEvent::DepositsSwept(DepositsSwept {
            wallet_pub_key_hash: outcome.wallet_pub_key_hash,
            sweep_tx_hash: outcome.sweep_tx_hash,
            main_utxo: outcome.main_utxo,
            vault: outcome.vault,
            total_fee: outcome.total_fee,
            credits: outcome.credits.clone(),
        }));

        Ok(outcome)
    }
}
