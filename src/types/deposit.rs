//! Deposit Types
//!
//! Registry records and the parameters a depositor reveals to prove
//! which Bitcoin output belongs to them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::primitives::hash::sha256;

/// A 20-byte account identifier on the ledger side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerAddress(pub [u8; 20]);

impl LedgerAddress {
    pub const ZERO: LedgerAddress = LedgerAddress([0u8; 20]);

    /// Build from a byte slice; `None` unless it is exactly 20 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(LedgerAddress)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// `None` for the zero address, which stands for "no vault"
    pub fn non_zero(self) -> Option<Self> {
        (self != Self::ZERO).then_some(self)
    }
}

impl fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for LedgerAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| format!("invalid address hex: {}", e))?;
        LedgerAddress::from_slice(&bytes)
            .ok_or_else(|| format!("address must be 20 bytes, got {}", bytes.len()))
    }
}

/// Registry key for a funding outpoint
///
/// `SHA256(funding_tx_hash ‖ output_index as big-endian u32)`, where the
/// transaction hash is in internal (little-endian) byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutpointKey(pub [u8; 32]);

impl OutpointKey {
    pub fn derive(funding_tx_hash: &[u8; 32], output_index: u32) -> Self {
        let mut preimage = [0u8; 36];
        preimage[..32].copy_from_slice(funding_tx_hash);
        preimage[32..].copy_from_slice(&output_index.to_be_bytes());
        OutpointKey(sha256(&preimage))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        bytes.try_into().ok().map(OutpointKey)
    }
}

impl fmt::Display for OutpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One revealed deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    /// Ledger account credited when the deposit is swept
    pub depositor: LedgerAddress,
    /// Value of the funding output in satoshis
    pub amount: u64,
    /// Vault the credit is routed through, if any
    pub vault: Option<LedgerAddress>,
    /// Unix seconds at reveal
    pub revealed_at: u64,
    /// Unix seconds at sweep; set at most once
    pub swept_at: Option<u64>,
}

impl DepositRecord {
    pub fn new(depositor: LedgerAddress, amount: u64, vault: Option<LedgerAddress>) -> Self {
        Self {
            depositor,
            amount,
            vault,
            revealed_at: chrono::Utc::now().timestamp().max(0) as u64,
            swept_at: None,
        }
    }

    pub fn is_swept(&self) -> bool {
        self.swept_at.is_some()
    }
}

/// The five values baked into a deposit locking script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositScriptParams {
    pub depositor: LedgerAddress,
    pub blinding_factor: [u8; 8],
    pub wallet_pub_key_hash: [u8; 20],
    pub refund_pub_key_hash: [u8; 20],
    /// Raw 4 bytes exactly as pushed into the script
    pub refund_locktime: [u8; 4],
}

impl DepositScriptParams {
    /// The reconstructed locking script
    pub fn script(&self) -> Vec<u8> {
        crate::primitives::script::deposit_script(self)
    }
}

/// Everything a depositor reveals about one funding output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealInfo {
    pub funding_output_index: u32,
    pub depositor: LedgerAddress,
    pub blinding_factor: [u8; 8],
    pub wallet_pub_key_hash: [u8; 20],
    pub refund_pub_key_hash: [u8; 20],
    pub refund_locktime: [u8; 4],
    pub vault: Option<LedgerAddress>,
}

impl RevealInfo {
    pub fn script_params(&self) -> DepositScriptParams {
        DepositScriptParams {
            depositor: self.depositor,
            blinding_factor: self.blinding_factor,
            wallet_pub_key_hash: self.wallet_pub_key_hash,
            refund_pub_key_hash: self.refund_pub_key_hash,
            refund_locktime: self.refund_locktime,
        }
    }
}

/// Assembler-side description of a deposit being spent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositParams {
    /// Expected value of the deposit UTXO
    pub amount: u64,
    pub depositor: LedgerAddress,
    pub blinding_factor: [u8; 8],
    pub wallet_pub_key_hash: [u8; 20],
    pub refund_pub_key_hash: [u8; 20],
    pub refund_locktime: [u8; 4],
}

impl DepositParams {
    pub fn script_params(&self) -> DepositScriptParams {
        DepositScriptParams {
            depositor: self.depositor,
            blinding_factor: self.blinding_factor,
            wallet_pub_key_hash: self.wallet_pub_key_hash,
            refund_pub_key_hash: self.refund_pub_key_hash,
            refund_locktime: self.refund_locktime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let addr: LedgerAddress = "0x934b98637ca318a4d6e7ca6ffd1690b8e77df637".parse().unwrap();
        assert_eq!(addr.to_string(), "0x934b98637ca318a4d6e7ca6ffd1690b8e77df637");

        let bare: LedgerAddress = "934b98637ca318a4d6e7ca6ffd1690b8e77df637".parse().unwrap();
        assert_eq!(addr, bare);

        assert!("0x1234".parse::<LedgerAddress>().is_err());
        assert!("zz".parse::<LedgerAddress>().is_err());
    }

    #[test]
    fn test_outpoint_key_depends_on_index() {
        let tx_hash = [7u8; 32];
        let a = OutpointKey::derive(&tx_hash, 0);
        let b = OutpointKey::derive(&tx_hash, 1);
        assert_ne!(a, b);
        assert_eq!(a, OutpointKey::derive(&tx_hash, 0));
    }

    #[test]
    fn test_outpoint_key_encoding() {
        let tx_hash = [0xabu8; 32];
        let mut preimage = tx_hash.to_vec();
        preimage.extend_from_slice(&[0, 0, 0, 5]);
        assert_eq!(OutpointKey::derive(&tx_hash, 5).0, sha256(&preimage));
    }

    #[test]
    fn test_outpoint_key_hex_roundtrip() {
        let key = OutpointKey::derive(&[1u8; 32], 3);
        assert_eq!(OutpointKey::from_hex(&key.to_hex()), Some(key));
        assert_eq!(OutpointKey::from_hex("00"), None);
    }

    #[test]
    fn test_new_record_is_unswept() {
        let record = DepositRecord::new(LedgerAddress([1u8; 20]), 10_000, None);
        assert!(!record.is_swept());
        assert!(record.revealed_at > 0);
    }
}
