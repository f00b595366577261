//! Balance ledger interface
//!
//! The ledger receiving credits lives outside this crate. `MemoryLedger`
//! backs tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::types::deposit::LedgerAddress;

/// Ledger errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{depositors} depositors but {amounts} amounts")]
    LengthMismatch { depositors: usize, amounts: usize },

    #[error("balance of {0} would overflow")]
    Overflow(LedgerAddress),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Receives the credit batch of each accepted sweep
///
/// Both calls are all-or-nothing: on error no balance may have changed.
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    async fn increase_balances(
        &self,
        depositors: &[LedgerAddress],
        amounts: &[u64],
    ) -> Result<(), LedgerError>;

    /// Credit through a vault, which is notified of the depositors
    async fn increase_balances_and_call(
        &self,
        vault: LedgerAddress,
        depositors: &[LedgerAddress],
        amounts: &[u64],
    ) -> Result<(), LedgerError>;
}

#[derive(Default)]
struct Balances {
    balances: HashMap<LedgerAddress, u64>,
    vault_calls: Vec<(LedgerAddress, Vec<LedgerAddress>)>,
}

/// In-memory ledger
///
/// Vault-routed credits are booked to the vault's balance and the call is
/// recorded so tests can inspect which depositors it was told about.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<RwLock<Balances>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn balance_of(&self, account: &LedgerAddress) -> u64 {
        self.state.read().await.balances.get(account).copied().unwrap_or(0)
    }

    /// Every `increase_balances_and_call` seen, in order
    pub async fn vault_calls(&self) -> Vec<(LedgerAddress, Vec<LedgerAddress>)> {
        self.state.read().await.vault_calls.clone()
    }

    fn apply(
        state: &mut Balances,
        accounts: impl Iterator<Item = LedgerAddress>,
        amounts: &[u64],
    ) -> Result<(), LedgerError> {
        // Dry run first so an overflow leaves every balance untouched.
        let mut staged: HashMap<LedgerAddress, u64> = HashMap::new();
        for (account, amount) in accounts.zip(amounts) {
            let current = staged
                .get(&account)
                .copied()
                .unwrap_or_else(|| state.balances.get(&account).copied().unwrap_or(0));
            let next = current
                .checked_add(*amount)
                .ok_or(LedgerError::Overflow(account))?;
            staged.insert(account, next);
        }

        state.balances.extend(staged);
        Ok(())
    }
}

fn check_lengths(depositors: &[LedgerAddress], amounts: &[u64]) -> Result<(), LedgerError> {
    if depositors.len() != amounts.len() {
        return Err(LedgerError::LengthMismatch {
            depositors: depositors.len(),
            amounts: amounts.len(),
        });
    }
    Ok(())
}

#[async_trait]
impl BalanceLedger for MemoryLedger {
    async fn increase_balances(
        &self,
        depositors: &[LedgerAddress],
        amounts: &[u64],
    ) -> Result<(), LedgerError> {
        check_lengths(depositors, amounts)?;
        let mut state = self.state.write().await;
        Self::apply(&mut state, depositors.iter().copied(), amounts)
    }

    async fn increase_balances_and_call(
        &self,
        vault: LedgerAddress,
        depositors: &[LedgerAddress],
        amounts: &[u64],
    ) -> Result<(), LedgerError> {
        check_lengths(depositors, amounts)?;
        let mut state = self.state.write().await;
        Self::apply(&mut state, std::iter::repeat(vault).take(amounts.len()), amounts)?;
        state.vault_calls.push((vault, depositors.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: LedgerAddress = LedgerAddress([0xaa; 20]);
    const B: LedgerAddress = LedgerAddress([0xbb; 20]);

    #[tokio::test]
    async fn test_increase_balances() {
        let ledger = MemoryLedger::new();
        ledger.increase_balances(&[A, B, A], &[10, 20, 5]).await.unwrap();

        assert_eq!(ledger.balance_of(&A).await, 15);
        assert_eq!(ledger.balance_of(&B).await, 20);
    }

    #[tokio::test]
    async fn test_length_mismatch() {
        let ledger = MemoryLedger::new();
        assert_eq!(
            ledger.increase_balances(&[A], &[1, 2]).await,
            Err(LedgerError::LengthMismatch { depositors: 1, amounts: 2 })
        );
    }

    #[tokio::test]
    async fn test_overflow_is_atomic() {
        let ledger = MemoryLedger::new();
        ledger.increase_balances(&[B], &[u64::MAX]).await.unwrap();

        let result = ledger.increase_balances(&[A, B], &[7, 1]).await;
        assert_eq!(result, Err(LedgerError::Overflow(B)));
        assert_eq!(ledger.balance_of(&A).await, 0);
    }

    #[tokio::test]
    async fn test_vault_call() {
        let ledger = MemoryLedger::new();
        let vault = LedgerAddress([0x99; 20]);
        ledger
            .increase_balances_and_call(vault, &[A, B], &[100, 200])
            .await
            .unwrap();

        assert_eq!(ledger.balance_of(&vault).await, 300);
        assert_eq!(ledger.balance_of(&A).await, 0);
        assert_eq!(ledger.vault_calls().await, vec![(vault, vec![A, B])]);
    }
}
