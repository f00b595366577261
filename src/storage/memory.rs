//! In-Memory Storage Implementation
//!
//! Provides in-memory storage for testing and development.
//! Data is lost when the service restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{SettlementStore, StorageError, StorageResult, SweepCommit};
use crate::types::deposit::{DepositRecord, OutpointKey};

#[derive(Default)]
struct State {
    deposits: HashMap<OutpointKey, DepositRecord>,
    pointers: HashMap<[u8; 20], [u8; 32]>,
}

/// In-memory settlement store
///
/// Deposits and pointers share one lock so a sweep commit is atomic.
#[derive(Clone, Default)]
pub struct MemorySettlementStore {
    state: Arc<RwLock<State>>,
}

impl MemorySettlementStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettlementStore for MemorySettlementStore {
    async fn insert_deposit(&self, key: &OutpointKey, record: &DepositRecord) -> StorageResult<()> {
        let mut state = self.state.write().await;

        if state.deposits.contains_key(key) {
            return Err(StorageError::Duplicate(key.to_hex()));
        }

        state.deposits.insert(*key, record.clone());
        Ok(())
    }

    async fn get_deposit(&self, key: &OutpointKey) -> StorageResult<Option<DepositRecord>> {
        let state = self.state.read().await;
        Ok(state.deposits.get(key).cloned())
    }

    async fn sweep_pointer(
        &self,
        wallet_pub_key_hash: &[u8; 20],
    ) -> StorageResult<Option<[u8; 32]>> {
        let state = self.state.read().await;
        Ok(state.pointers.get(wallet_pub_key_hash).copied())
    }

    async fn commit_sweep(&self, commit: &SweepCommit) -> StorageResult<()> {
        let mut state = self.state.write().await;

        if state.pointers.get(&commit.wallet_pub_key_hash) != commit.previous_pointer.as_ref() {
            return Err(StorageError::Conflict(format!(
                "sweep pointer of wallet {} moved",
                hex::encode(commit.wallet_pub_key_hash)
            )));
        }

        for key in &commit.deposits {
            match state.deposits.get(key) {
                None => return Err(StorageError::Conflict(format!("deposit {} missing", key))),
                Some(record) if record.is_swept() => {
                    return Err(StorageError::Conflict(format!("deposit {} already swept", key)))
                }
                Some(_) => {}
            }
        }

        for key in &commit.deposits {
            if let Some(record) = state.deposits.get_mut(key) {
                record.swept_at = Some(commit.swept_at);
            }
        }
        state.pointers.insert(commit.wallet_pub_key_hash, commit.new_pointer);

        Ok(())
    }

    async fn revert_sweep(&self, commit: &SweepCommit) -> StorageResult<()> {
        let mut state = self.state.write().await;

        for key in &commit.deposits {
            if let Some(record) = state.deposits.get_mut(key) {
                record.swept_at = None;
            }
        }

        match commit.previous_pointer {
            Some(pointer) => state.pointers.insert(commit.wallet_pub_key_hash, pointer),
            None => state.pointers.remove(&commit.wallet_pub_key_hash),
        };

        Ok(())
    }

    async fn deposit_count(&self) -> StorageResult<u64> {
        let state = self.state.read().await;
        Ok(state.deposits.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::conformance;

    #[tokio::test]
    async fn test_insert_and_get() {
        conformance::insert_and_get(&MemorySettlementStore::new()).await;
    }

    #[tokio::test]
    async fn test_duplicate_key() {
        conformance::duplicate_key(&MemorySettlementStore::new()).await;
    }

    #[tokio::test]
    async fn test_commit_and_revert() {
        conformance::commit_and_revert(&MemorySettlementStore::new()).await;
    }

    #[tokio::test]
    async fn test_commit_conflicts() {
        conformance::commit_conflicts(&MemorySettlementStore::new()).await;
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemorySettlementStore::new();
        let clone = store.clone();
        let key = OutpointKey([1u8; 32]);
        store
            .insert_deposit(&key, &conformance::record(5_000))
            .await
            .unwrap();
        assert!(clone.get_deposit(&key).await.unwrap().is_some());
    }
}
