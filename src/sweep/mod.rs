//! Sweep Processing Module
//!
//! Validates proven sweep transactions, allocates their fee and hands the
//! resulting credits to the balance ledger.

pub mod fee;
pub mod ledger;
pub mod processor;

// Re-exports for convenience
pub use fee::{allocate_fee, sweep_fee, FeeAllocation, FeeError, FeeRemainderPolicy};
pub use ledger::{BalanceLedger, LedgerError, MemoryLedger};
pub use processor::{SweepError, SweepPlan, SweepProcessor};
