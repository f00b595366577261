//! Storage Layer Module
//!
//! Provides persistence for the deposit registry and wallet sweep pointers.
//!
//! This module contains:
//! - Storage trait definitions for abstraction
//! - SQLite implementation for production
//! - In-memory implementation for testing

pub mod memory;
pub mod sqlite;
pub mod traits;

use std::sync::Arc;

use crate::common::config::SettlementConfig;

// Re-exports for convenience
pub use memory::MemorySettlementStore;
pub use sqlite::SqliteSettlementStore;
pub use traits::{SettlementStore, StorageError, StorageResult, SweepCommit};

/// Open the store the configuration asks for
///
/// SQLite when `db_path` is set, otherwise an in-memory store.
pub fn open_store(config: &SettlementConfig) -> Result<Arc<dyn SettlementStore>, StorageError> {
    match &config.db_path {
        Some(path) => {
            tracing::info!(target: "sweepbridge::storage", path = %path, "opening sqlite store");
            Ok(Arc::new(SqliteSettlementStore::new(path)?))
        }
        None => {
            tracing::warn!(
                target: "sweepbridge::storage",
                "no database path set, using in-memory store"
            );
            Ok(Arc::new(MemorySettlementStore::new()))
        }
    }
}
