//! Settlement notifications
//!
//! Emitted by the engine after a state transition has been committed.
//! Subscribers that lag behind lose the oldest events; the store stays the
//! source of truth.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::deposit::{LedgerAddress, OutpointKey};
use crate::types::sweep::{Credit, PreviousSweep};

/// Buffered events per subscriber
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRevealed {
    pub outpoint_key: OutpointKey,
    /// Internal byte order
    pub funding_tx_hash: [u8; 32],
    pub funding_output_index: u32,
    pub depositor: LedgerAddress,
    pub amount: u64,
    pub blinding_factor: [u8; 8],
    pub wallet_pub_key_hash: [u8; 20],
    pub refund_pub_key_hash: [u8; 20],
    pub refund_locktime: [u8; 4],
    pub vault: Option<LedgerAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositsSwept {
    pub wallet_pub_key_hash: [u8; 20],
    /// Internal byte order
    pub sweep_tx_hash: [u8; 32],
    pub main_utxo: PreviousSweep,
    pub vault: Option<LedgerAddress>,
    pub total_fee: u64,
    pub credits: Vec<Credit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementEvent {
    DepositRevealed(DepositRevealed),
    DepositsSwept(DepositsSwept),
}

pub type EventSender = broadcast::Sender<SettlementEvent>;
pub type EventReceiver = broadcast::Receiver<SettlementEvent>;

pub fn channel() -> EventSender {
    let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    tx
}
