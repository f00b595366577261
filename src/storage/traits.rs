//! Storage Trait Definitions
//!
//! The deposit registry and the per-wallet sweep pointers live behind one
//! store so a sweep can update both in a single transaction.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::deposit::{DepositRecord, OutpointKey};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Conflicting update: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// State transition applied by one accepted sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepCommit {
    pub wallet_pub_key_hash: [u8; 20],
    /// Pointer the sweep was validated against
    pub previous_pointer: Option<[u8; 32]>,
    pub new_pointer: [u8; 32],
    /// Deposits consumed, in input order
    pub deposits: Vec<OutpointKey>,
    pub swept_at: u64,
}

/// Settlement storage interface
///
/// Implementations:
/// - `SqliteSettlementStore` - Production storage with SQLite
/// - `MemorySettlementStore` - In-memory storage for testing
#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Insert a new deposit; `Duplicate` if the key exists
    async fn insert_deposit(&self, key: &OutpointKey, record: &DepositRecord) -> StorageResult<()>;

    /// Get a deposit by outpoint key
    async fn get_deposit(&self, key: &OutpointKey) -> StorageResult<Option<DepositRecord>>;

    /// Current sweep pointer of a wallet
    async fn sweep_pointer(
        &self,
        wallet_pub_key_hash: &[u8; 20],
    ) -> StorageResult<Option<[u8; 32]>>;

    /// Atomically mark deposits swept and move the wallet pointer
    ///
    /// Fails with `Conflict` and changes nothing if the pointer moved or any
    /// deposit is missing or already swept.
    async fn commit_sweep(&self, commit: &SweepCommit) -> StorageResult<()>;

    /// Undo a commit that downstream crediting rejected
    async fn revert_sweep(&self, commit: &SweepCommit) -> StorageResult<()>;

    /// Number of revealed deposits
    async fn deposit_count(&self) -> StorageResult<u64>;
}

/// Behaviour every `SettlementStore` must share
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use crate::types::deposit::LedgerAddress;

    pub(crate) fn record(amount: u64) -> DepositRecord {
        DepositRecord {
            depositor: LedgerAddress([0x42; 20]),
            amount,
            vault: None,
            revealed_at: 1_700_000_000,
            swept_at: None,
        }
    }

    fn commit(keys: &[OutpointKey], previous: Option<[u8; 32]>, new: [u8; 32]) -> SweepCommit {
        SweepCommit {
            wallet_pub_key_hash: [0x77; 20],
            previous_pointer: previous,
            new_pointer: new,
            deposits: keys.to_vec(),
            swept_at: 1_700_000_600,
        }
    }

    pub(crate) async fn insert_and_get(store: &dyn SettlementStore) {
        let key = OutpointKey([1u8; 32]);
        let mut rec = record(25_000);
        rec.vault = Some(LedgerAddress([0x99; 20]));

        store.insert_deposit(&key, &rec).await.unwrap();

        assert_eq!(store.get_deposit(&key).await.unwrap(), Some(rec));
        assert_eq!(store.get_deposit(&OutpointKey([2u8; 32])).await.unwrap(), None);
        assert_eq!(store.deposit_count().await.unwrap(), 1);
        assert_eq!(store.sweep_pointer(&[0x77; 20]).await.unwrap(), None);
    }

    pub(crate) async fn duplicate_key(store: &dyn SettlementStore) {
        let key = OutpointKey([1u8; 32]);
        store.insert_deposit(&key, &record(1)).await.unwrap();

        let result = store.insert_deposit(&key, &record(2)).await;
        assert!(matches!(result, Err(StorageError::Duplicate(_))));
        assert_eq!(store.get_deposit(&key).await.unwrap().unwrap().amount, 1);
    }

    pub(crate) async fn commit_and_revert(store: &dyn SettlementStore) {
        let a = OutpointKey([1u8; 32]);
        let b = OutpointKey([2u8; 32]);
        store.insert_deposit(&a, &record(10)).await.unwrap();
        store.insert_deposit(&b, &record(20)).await.unwrap();

        let first = commit(&[a], None, [0xa1; 32]);
        store.commit_sweep(&first).await.unwrap();
        assert_eq!(store.sweep_pointer(&[0x77; 20]).await.unwrap(), Some([0xa1; 32]));
        assert_eq!(
            store.get_deposit(&a).await.unwrap().unwrap().swept_at,
            Some(1_700_000_600)
        );

        let second = commit(&[b], Some([0xa1; 32]), [0xb2; 32]);
        store.commit_sweep(&second).await.unwrap();
        store.revert_sweep(&second).await.unwrap();

        assert_eq!(store.sweep_pointer(&[0x77; 20]).await.unwrap(), Some([0xa1; 32]));
        assert!(!store.get_deposit(&b).await.unwrap().unwrap().is_swept());
        assert!(store.get_deposit(&a).await.unwrap().unwrap().is_swept());

        store.revert_sweep(&first).await.unwrap();
        assert_eq!(store.sweep_pointer(&[0x77; 20]).await.unwrap(), None);
    }

    pub(crate) async fn commit_conflicts(store: &dyn SettlementStore) {
        let a = OutpointKey([1u8; 32]);
        let b = OutpointKey([2u8; 32]);
        store.insert_deposit(&a, &record(10)).await.unwrap();
        store.insert_deposit(&b, &record(20)).await.unwrap();

        store.commit_sweep(&commit(&[a], None, [0xa1; 32])).await.unwrap();

        // Stale pointer
        let stale = commit(&[b], None, [0xb2; 32]);
        assert!(matches!(store.commit_sweep(&stale).await, Err(StorageError::Conflict(_))));

        // Already swept deposit; b must stay untouched
        let reswept = commit(&[b, a], Some([0xa1; 32]), [0xb2; 32]);
        assert!(matches!(store.commit_sweep(&reswept).await, Err(StorageError::Conflict(_))));
        assert!(!store.get_deposit(&b).await.unwrap().unwrap().is_swept());

        // Unknown deposit
        let unknown = commit(&[OutpointKey([3u8; 32])], Some([0xa1; 32]), [0xc3; 32]);
        assert!(matches!(store.commit_sweep(&unknown).await, Err(StorageError::Conflict(_))));
        assert_eq!(store.sweep_pointer(&[0x77; 20]).await.unwrap(), Some([0xa1; 32]));
    }
}
