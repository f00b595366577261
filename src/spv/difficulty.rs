//! Compact targets and difficulty
//!
//! Difficulty is `pow_limit_target / header_target`, computed exactly from
//! the two compact encodings. With the mainnet limit (`0x1d00ffff`) this is
//! the familiar Bitcoin difficulty; with the regtest limit a minimum-work
//! regtest header has difficulty 1.

use super::SpvError;

/// Mainnet and testnet proof-of-work limit
pub const MAINNET_POW_LIMIT_BITS: u32 = 0x1d00ffff;

/// Regtest proof-of-work limit
pub const REGTEST_POW_LIMIT_BITS: u32 = 0x207fffff;

fn split_compact(bits: u32) -> Result<(u32, u32), SpvError> {
    let exponent = bits >> 24;
    let mantissa = bits & 0x007f_ffff;

    if mantissa == 0 {
        return Err(SpvError::InvalidTarget(format!("{:#010x}: zero target", bits)));
    }
    if bits & 0x0080_0000 != 0 {
        return Err(SpvError::InvalidTarget(format!("{:#010x}: negative target", bits)));
    }
    if exponent > 34 || (mantissa > 0xff && exponent > 33) || (mantissa > 0xffff && exponent > 32) {
        return Err(SpvError::InvalidTarget(format!("{:#010x}: target overflows 256 bits", bits)));
    }

    // Below exponent 3 the mantissa is shifted right; normalize to exponent 3.
    if exponent < 3 {
        let shifted = mantissa >> (8 * (3 - exponent));
        if shifted == 0 {
            return Err(SpvError::InvalidTarget(format!("{:#010x}: zero target", bits)));
        }
        return Ok((3, shifted));
    }

    Ok((exponent, mantissa))
}

/// Expand compact `nBits` into a 256-bit little-endian target
pub fn compact_to_target(bits: u32) -> Result<[u8; 32], SpvError> {
    let (exponent, mantissa) = split_compact(bits)?;
    let mut target = [0u8; 32];

    let offset = (exponent - 3) as usize;
    for (i, byte) in mantissa.to_le_bytes().iter().take(3).enumerate() {
        // Overflow checks above guarantee bytes past the end are zero.
        if let Some(slot) = target.get_mut(offset + i) {
            *slot = *byte;
        }
    }

    Ok(target)
}

/// Check if hash meets difficulty target (both little-endian)
pub fn hash_meets_target(hash: &[u8; 32], target: &[u8; 32]) -> bool {
    for i in (0..32).rev() {
        if hash[i] > target[i] {
            return false;
        }
        if hash[i] < target[i] {
            return true;
        }
    }
    true
}

/// Difficulty of a header target relative to the network's pow limit
///
/// Targets easier than the limit are rejected as invalid.
pub fn difficulty(bits: u32, pow_limit_bits: u32) -> Result<u128, SpvError> {
    let target = compact_to_target(bits)?;
    let limit = compact_to_target(pow_limit_bits)?;
    if !hash_meets_target(&target, &limit) {
        return Err(SpvError::InvalidTarget(format!(
            "{:#010x}: easier than pow limit {:#010x}",
            bits, pow_limit_bits
        )));
    }

    let (header_exp, header_mantissa) = split_compact(bits)?;
    let (limit_exp, limit_mantissa) = split_compact(pow_limit_bits)?;

    let overflow = || SpvError::InvalidTarget(format!("{:#010x}: difficulty overflows", bits));

    let (numerator, denominator) = if limit_exp >= header_exp {
        let scale = 256u128.checked_pow(limit_exp - header_exp).ok_or_else(overflow)?;
        let numerator = (limit_mantissa as u128).checked_mul(scale).ok_or_else(overflow)?;
        (numerator, header_mantissa as u128)
    } else {
        let scale = 256u128.checked_pow(header_exp - limit_exp).ok_or_else(overflow)?;
        let denominator = (header_mantissa as u128).checked_mul(scale).ok_or_else(overflow)?;
        (limit_mantissa as u128, denominator)
    };

    Ok(numerator / denominator)
}
