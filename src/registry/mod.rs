//! Deposit Registry Module
//!
//! One record per funding outpoint, created when the depositor reveals the
//! deposit script parameters.

pub mod reveal;
pub mod vault;

// Re-exports for convenience
pub use reveal::{DepositRegistry, RevealError};
pub use vault::{GovernanceError, GovernedVaultRegistry, VaultRegistry};
