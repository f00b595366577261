//! Vault trust
//!
//! A deposit may name a vault that receives its credit instead of the
//! depositor's plain balance. Only vaults marked trusted by governance
//! are accepted at reveal time.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::types::deposit::LedgerAddress;

/// Governance errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("caller {0} is not the governance address")]
    NotGovernance(LedgerAddress),
}

#[async_trait]
pub trait VaultRegistry: Send + Sync {
    async fn is_trusted(&self, vault: &LedgerAddress) -> bool;
}

/// Trusted-vault set that only governance can change
#[derive(Clone)]
pub struct GovernedVaultRegistry {
    governance: LedgerAddress,
    trusted: Arc<RwLock<HashSet<LedgerAddress>>>,
}

impl GovernedVaultRegistry {
    pub fn new(governance: LedgerAddress) -> Self {
        Self {
            governance,
            trusted: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub fn governance(&self) -> LedgerAddress {
        self.governance
    }

    /// Mark a vault trusted or untrusted
    pub async fn set_vault_status(
        &self,
        caller: LedgerAddress,
        vault: LedgerAddress,
        trusted: bool,
    ) -> Result<(), GovernanceError> {
        if caller != self.governance {
            return Err(GovernanceError::NotGovernance(caller));
        }

        let mut set = self.trusted.write().await;
        if trusted {
            set.insert(vault);
        } else {
            set.remove(&vault);
        }

        tracing::info!(
            target: "sweepbridge::reveal",
            vault = %vault,
            trusted,
            "vault status updated"
        );
        Ok(())
    }
}

#[async_trait]
impl VaultRegistry for GovernedVaultRegistry {
    async fn is_trusted(&self, vault: &LedgerAddress) -> bool {
        self.trusted.read().await.contains(vault)
    }
}
