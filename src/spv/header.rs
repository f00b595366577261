//! Bitcoin block headers

use serde::{Deserialize, Serialize};

use super::SpvError;
use crate::primitives::encoding::{read_array, read_u32_le};
use crate::primitives::hash::double_sha256;

/// Serialized header length
pub const HEADER_LEN: usize = 80;

/// Bitcoin block header (80 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// Serialize to raw 80-byte format (little-endian)
    pub fn to_raw(&self) -> [u8; 80] {
        let mut raw = [0u8; 80];

        raw[0..4].copy_from_slice(&self.version.to_le_bytes());
        raw[4..36].copy_from_slice(&self.prev_block_hash);
        raw[36..68].copy_from_slice(&self.merkle_root);
        raw[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        raw[72..76].copy_from_slice(&self.bits.to_le_bytes());
        raw[76..80].copy_from_slice(&self.nonce.to_le_bytes());

        raw
    }

    /// Block hash in internal byte order
    pub fn block_hash(&self) -> [u8; 32] {
        double_sha256(&self.to_raw())
    }

    /// Parse one header from exactly 80 bytes
    pub fn from_raw(raw: &[u8]) -> Result<Self, SpvError> {
        if raw.len() != HEADER_LEN {
            return Err(SpvError::InvalidLength(format!(
                "header must be {} bytes, got {}",
                HEADER_LEN,
                raw.len()
            )));
        }

        let truncated =
            |e: crate::primitives::PrimitiveError| SpvError::InvalidLength(e.to_string());

        Ok(Self {
            version: read_u32_le(raw, 0).map_err(truncated)? as i32,
            prev_block_hash: read_array(raw, 4).map_err(truncated)?,
            merkle_root: read_array(raw, 36).map_err(truncated)?,
            timestamp: read_u32_le(raw, 68).map_err(truncated)?,
            bits: read_u32_le(raw, 72).map_err(truncated)?,
            nonce: read_u32_le(raw, 76).map_err(truncated)?,
        })
    }
}

/// Split a concatenated header chain, first header first
pub fn parse_header_chain(headers: &[u8]) -> Result<Vec<BlockHeader>, SpvError> {
    if headers.is_empty() || headers.len() % HEADER_LEN != 0 {
        return Err(SpvError::InvalidLength(format!(
            "header chain must be a non-empty multiple of {} bytes, got {}",
            HEADER_LEN,
            headers.len()
        )));
    }

    headers.chunks_exact(HEADER_LEN).map(BlockHeader::from_raw).collect()
}

/// Concatenate headers into the wire format the verifier takes
pub fn serialize_header_chain(headers: &[BlockHeader]) -> Vec<u8> {
    headers.iter().flat_map(|h| h.to_raw()).collect()
}
