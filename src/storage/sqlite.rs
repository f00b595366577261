//! SQLite Persistent Storage for the Settlement Engine
//!
//! Durable registry and sweep pointers that survive service restarts.
//! Uses connection pooling via r2d2 for concurrent access.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

use super::traits::{SettlementStore, StorageError, StorageResult, SweepCommit};
use crate::types::deposit::{DepositRecord, LedgerAddress, OutpointKey};

/// SQLite-backed settlement store with connection pooling
pub struct SqliteSettlementStore {
    pool: Pool<SqliteConnectionManager>,
}

type RawRow = (String, i64, Option<String>, i64, Option<i64>);

fn db_err(e: rusqlite::Error) -> StorageError {
    StorageError::Database(e.to_string())
}

fn to_i64(value: u64, field: &str) -> Result<i64, StorageError> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidData(format!("{} out of range: {}", field, value)))
}

fn parse_address(s: &str) -> Result<LedgerAddress, StorageError> {
    s.parse().map_err(StorageError::InvalidData)
}

fn parse_hash32(s: &str) -> Result<[u8; 32], StorageError> {
    hex::decode(s)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| StorageError::InvalidData(format!("invalid 32-byte hex: {}", s)))
}

impl SqliteSettlementStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Get a connection from the pool
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS deposits (
                outpoint_key TEXT PRIMARY KEY,
                depositor TEXT NOT NULL,
                amount_sats INTEGER NOT NULL,
                vault TEXT,
                revealed_at INTEGER NOT NULL,
                swept_at INTEGER
            );

            CREATE TABLE IF NOT EXISTS sweep_pointers (
                wallet_pub_key_hash TEXT PRIMARY KEY,
                pointer TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_deposits_swept_at ON deposits(swept_at);
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn row_to_record(raw: RawRow) -> Result<DepositRecord, StorageError> {
        let (depositor, amount, vault, revealed_at, swept_at) = raw;

        Ok(DepositRecord {
            depositor: parse_address(&depositor)?,
            amount: amount as u64,
            vault: vault.as_deref().map(parse_address).transpose()?,
            revealed_at: revealed_at as u64,
            swept_at: swept_at.map(|v| v as u64),
        })
    }

    // Synchronous helper methods for the trait implementations

    fn insert_sync(&self, key: &OutpointKey, record: &DepositRecord) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO deposits (
                outpoint_key, depositor, amount_sats, vault, revealed_at, swept_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                key.to_hex(),
                record.depositor.to_string(),
                to_i64(record.amount, "amount")?,
                record.vault.map(|v| v.to_string()),
                to_i64(record.revealed_at, "revealed_at")?,
                record.swept_at.map(|v| to_i64(v, "swept_at")).transpose()?,
            ],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.extended_code == 1555 || err.extended_code == 2067 {
                    return StorageError::Duplicate(key.to_hex());
                }
            }
            db_err(e)
        })?;

        Ok(())
    }

    fn get_sync(&self, key: &OutpointKey) -> Result<Option<DepositRecord>, StorageError> {
        let conn = self.conn()?;

        let raw: Option<RawRow> = conn
            .query_row(
                "SELECT depositor, amount_sats, vault, revealed_at, swept_at
                 FROM deposits WHERE outpoint_key = ?1",
                params![key.to_hex()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()
            .map_err(db_err)?;

        raw.map(Self::row_to_record).transpose()
    }

    fn pointer_sync(&self, wallet: &[u8; 20]) -> Result<Option<[u8; 32]>, StorageError> {
        let conn = self.conn()?;

        let pointer: Option<String> = conn
            .query_row(
                "SELECT pointer FROM sweep_pointers WHERE wallet_pub_key_hash = ?1",
                params![hex::encode(wallet)],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        pointer.as_deref().map(parse_hash32).transpose()
    }

    fn commit_sync(&self, commit: &SweepCommit) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let wallet = hex::encode(commit.wallet_pub_key_hash);

        let current: Option<String> = tx
            .query_row(
                "SELECT pointer FROM sweep_pointers WHERE wallet_pub_key_hash = ?1",
                params![wallet],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        if current != commit.previous_pointer.map(hex::encode) {
            return Err(StorageError::Conflict(format!("sweep pointer of wallet {} moved", wallet)));
        }

        let swept_at = to_i64(commit.swept_at, "swept_at")?;
        for key in &commit.deposits {
            let updated = tx
                .execute(
                    "UPDATE deposits SET swept_at = ?2
                     WHERE outpoint_key = ?1 AND swept_at IS NULL",
                    params![key.to_hex(), swept_at],
                )
                .map_err(db_err)?;

            // Dropping `tx` without commit rolls back earlier updates.
            if updated == 0 {
                return Err(StorageError::Conflict(format!(
                    "deposit {} missing or already swept",
                    key
                )));
            }
        }

        tx.execute(
            r#"
            INSERT INTO sweep_pointers (wallet_pub_key_hash, pointer) VALUES (?1, ?2)
            ON CONFLICT(wallet_pub_key_hash) DO UPDATE SET pointer = excluded.pointer
            "#,
            params![wallet, hex::encode(commit.new_pointer)],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)
    }

    fn revert_sync(&self, commit: &SweepCommit) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let wallet = hex::encode(commit.wallet_pub_key_hash);

        for key in &commit.deposits {
            tx.execute(
                "UPDATE deposits SET swept_at = NULL WHERE outpoint_key = ?1",
                params![key.to_hex()],
            )
            .map_err(db_err)?;
        }

        let restored = match commit.previous_pointer {
            Some(pointer) => tx.execute(
                "UPDATE sweep_pointers SET pointer = ?2 WHERE wallet_pub_key_hash = ?1",
                params![wallet, hex::encode(pointer)],
            ),
            None => tx.execute(
                "DELETE FROM sweep_pointers WHERE wallet_pub_key_hash = ?1",
                params![wallet],
            ),
        };
        restored.map_err(db_err)?;

        tx.commit().map_err(db_err)
    }

    fn count_sync(&self) -> Result<u64, StorageError> {
        let conn = self.conn()?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM deposits", [], |row| row.get(0))
            .map_err(db_err)?;

        Ok(count as u64)
    }
}

#[async_trait]
impl SettlementStore for SqliteSettlementStore {
    async fn insert_deposit(&self, key: &OutpointKey, record: &DepositRecord) -> StorageResult<()> {
        self.insert_sync(key, record)
    }

    async fn get_deposit(&self, key: &OutpointKey) -> StorageResult<Option<DepositRecord>> {
        self.get_sync(key)
    }

    async fn sweep_pointer(
        &self,
        wallet_pub_key_hash: &[u8; 20],
    ) -> StorageResult<Option<[u8; 32]>> {
        self.pointer_sync(wallet_pub_key_hash)
    }

    async fn commit_sweep(&self, commit: &SweepCommit) -> StorageResult<()> {
        self.commit_sync(commit)
    }

    async fn revert_sweep(&self, commit: &SweepCommit) -> StorageResult<()> {
        self.revert_sync(commit)
    }

    async fn deposit_count(&self) -> StorageResult<u64> {
        self.count_sync()
    }
}
