//! Difficulty relay interface
//!
//! The only external oracle the verifier trusts: it reports the difficulty
//! of the current and previous Bitcoin difficulty epochs.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Relay errors
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("relay unavailable: {0}")]
    Unavailable(String),

    #[error("relay not initialized")]
    NotInitialized,
}

/// Source of epoch difficulties
#[async_trait]
pub trait DifficultyOracle: Send + Sync {
    async fn current_epoch_difficulty(&self) -> Result<u128, OracleError>;

    async fn previous_epoch_difficulty(&self) -> Result<u128, OracleError>;
}

#[derive(Debug, Clone, Copy, Default)]
struct Epochs {
    current: u128,
    previous: u128,
}

/// In-memory relay whose epochs are set by the operator
#[derive(Clone, Default)]
pub struct StaticDifficultyRelay {
    epochs: Arc<RwLock<Option<Epochs>>>,
}

impl StaticDifficultyRelay {
    pub fn new(current: u128, previous: u128) -> Self {
        Self {
            epochs: Arc::new(RwLock::new(Some(Epochs { current, previous }))),
        }
    }

    /// Relay that has not been fed any epoch yet
    pub fn uninitialized() -> Self {
        Self::default()
    }

    pub async fn set_epochs(&self, current: u128, previous: u128) {
        *self.epochs.write().await = Some(Epochs { current, previous });
    }

    /// Start a new epoch; the old current becomes previous
    pub async fn advance_epoch(&self, difficulty: u128) {
        let mut epochs = self.epochs.write().await;
        let previous = epochs.as_ref().map(|e| e.current).unwrap_or(difficulty);
        *epochs = Some(Epochs {
            current: difficulty,
            previous,
        });
        tracing::info!(
            target: "sweepbridge::spv",
            current = %difficulty,
            previous = %previous,
            "difficulty epoch advanced"
        );
    }
}

#[async_trait]
impl DifficultyOracle for StaticDifficultyRelay {
    async fn current_epoch_difficulty(&self) -> Result<u128, OracleError> {
        let epochs = *self.epochs.read().await;
        epochs.map(|e| e.current).ok_or(OracleError::NotInitialized)
    }

    async fn previous_epoch_difficulty(&self) -> Result<u128, OracleError> {
        let epochs = *self.epochs.read().await;
        epochs.map(|e| e.previous).ok_or(OracleError::NotInitialized)
    }
}
