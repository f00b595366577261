//! Shared Types Module
//!
//! Data types shared across the settlement engine and the assembler.

pub mod deposit;
pub mod sweep;
pub mod units;

// Re-exports for convenience
pub use deposit::{
    DepositParams, DepositRecord, DepositScriptParams, LedgerAddress, OutpointKey, RevealInfo,
};
pub use sweep::{BitcoinTxInfo, Credit, PreviousSweep, SweepOutcome, SweepProof};
pub use units::{parse_sats, sats_to_btc_string, sats_to_display, SATS_PER_BTC};
