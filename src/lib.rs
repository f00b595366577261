//! sweepbridge - Bitcoin Deposit-Sweep Settlement
//!
//! Settles Bitcoin deposits into an external balance ledger using only
//! public chain data and a difficulty relay.
//!
//! ## Settlement Side
//!
//! 1. **Deposit Registry** - Rebuilds the revealed deposit script and records the funding outpoint
//! 2. **SPV Verifier** - Proves inclusion and accumulated work of a sweep transaction
//! 3. **Sweep Processor** - Matches sweep inputs, enforces the wallet sweep chain, splits the fee
//! 4. **Settlement Engine** - Serializes reveals and sweeps over one store and emits events
//!
//! ## Wallet Side
//!
//! - **Assembler** - Builds and signs the sweep transaction the processor expects
//! - **Esplora client** - Fetches UTXOs, broadcasts sweeps, gathers proof data

pub mod assembler;
pub mod common;
pub mod engine;
pub mod esplora;
pub mod events;
pub mod primitives;
pub mod registry;
pub mod spv;
pub mod storage;
pub mod sweep;
pub mod types;

// Re-exports: infrastructure
pub use common::{BridgeError, Network, SettlementConfig};

// Re-exports: engine
pub use engine::{EngineSettings, SettlementEngine};
pub use events::{DepositRevealed, DepositsSwept, SettlementEvent};

// Re-exports: settlement components
pub use registry::{DepositRegistry, GovernedVaultRegistry, RevealError, VaultRegistry};
pub use spv::{DifficultyOracle, SpvError, SpvProofGenerator, SpvVerifier, StaticDifficultyRelay};
pub use storage::{open_store, MemorySettlementStore, SettlementStore, SqliteSettlementStore};
pub use sweep::{BalanceLedger, FeeRemainderPolicy, MemoryLedger, SweepError, SweepProcessor};

// Re-exports: assembler
pub use assembler::{
    fetch_utxo, AssembledSweep, AssemblerError, SweepAssembler, SweepBroadcaster, SweepSigner,
    Utxo, WalletSigner,
};
pub use esplora::{BitcoinClient, ChainSource, EsploraClient, EsploraError};

// Re-exports: data types
pub use types::{
    BitcoinTxInfo, Credit, DepositParams, DepositRecord, LedgerAddress, OutpointKey,
    PreviousSweep, RevealInfo, SweepOutcome, SweepProof,
};
