//! Locking script templates and classification

use crate::types::deposit::DepositScriptParams;

const OP_0: u8 = 0x00;
const OP_PUSHBYTES_4: u8 = 0x04;
const OP_PUSHBYTES_8: u8 = 0x08;
const OP_PUSHBYTES_20: u8 = 0x14;
const OP_PUSHBYTES_32: u8 = 0x20;
const OP_IF: u8 = 0x63;
const OP_ELSE: u8 = 0x67;
const OP_ENDIF: u8 = 0x68;
const OP_DROP: u8 = 0x75;
const OP_DUP: u8 = 0x76;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_HASH160: u8 = 0xa9;
const OP_CHECKSIG: u8 = 0xac;
const OP_CHECKLOCKTIMEVERIFY: u8 = 0xb1;

/// Standard output script shapes this system understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    P2pkh([u8; 20]),
    P2wpkh([u8; 20]),
    P2sh([u8; 20]),
    P2wsh([u8; 32]),
    Unsupported,
}

impl ScriptKind {
    /// Hash payload carried by the script
    pub fn hash(&self) -> Option<&[u8]> {
        match self {
            ScriptKind::P2pkh(h) | ScriptKind::P2wpkh(h) | ScriptKind::P2sh(h) => Some(&h[..]),
            ScriptKind::P2wsh(h) => Some(&h[..]),
            ScriptKind::Unsupported => None,
        }
    }

    /// Key hash if this is a single-key wallet output
    pub fn wallet_key_hash(&self) -> Option<[u8; 20]> {
        match self {
            ScriptKind::P2pkh(h) | ScriptKind::P2wpkh(h) => Some(*h),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScriptKind::P2pkh(_) => "p2pkh",
            ScriptKind::P2wpkh(_) => "p2wpkh",
            ScriptKind::P2sh(_) => "p2sh",
            ScriptKind::P2wsh(_) => "p2wsh",
            ScriptKind::Unsupported => "unsupported",
        }
    }
}

/// Classify an output's locking script (without length prefix)
pub fn classify_script(script: &[u8]) -> ScriptKind {
    match script {
        [OP_DUP, OP_HASH160, OP_PUSHBYTES_20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG]
            if hash.len() == 20 =>
        {
            hash.try_into().map(ScriptKind::P2pkh).unwrap_or(ScriptKind::Unsupported)
        }
        [OP_0, OP_PUSHBYTES_20, hash @ ..] if hash.len() == 20 => {
            hash.try_into().map(ScriptKind::P2wpkh).unwrap_or(ScriptKind::Unsupported)
        }
        [OP_HASH160, OP_PUSHBYTES_20, hash @ .., OP_EQUAL] if hash.len() == 20 => {
            hash.try_into().map(ScriptKind::P2sh).unwrap_or(ScriptKind::Unsupported)
        }
        [OP_0, OP_PUSHBYTES_32, hash @ ..] if hash.len() == 32 => {
            hash.try_into().map(ScriptKind::P2wsh).unwrap_or(ScriptKind::Unsupported)
        }
        _ => ScriptKind::Unsupported,
    }
}

pub fn p2pkh_script(pub_key_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, OP_PUSHBYTES_20]);
    script.extend_from_slice(pub_key_hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

pub fn p2wpkh_script(pub_key_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(22);
    script.extend_from_slice(&[OP_0, OP_PUSHBYTES_20]);
    script.extend_from_slice(pub_key_hash);
    script
}

pub fn p2sh_script(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.extend_from_slice(&[OP_HASH160, OP_PUSHBYTES_20]);
    script.extend_from_slice(script_hash);
    script.push(OP_EQUAL);
    script
}

pub fn p2wsh_script(script_hash: &[u8; 32]) -> Vec<u8> {
    let mut script = Vec::with_capacity(34);
    script.extend_from_slice(&[OP_0, OP_PUSHBYTES_32]);
    script.extend_from_slice(script_hash);
    script
}

/// The deposit locking script
///
/// Spendable by the wallet key, or by the refund key once the locktime
/// has passed. The depositor and blinding factor are pushed and dropped so
/// every deposit gets a unique script hash.
pub fn deposit_script(params: &DepositScriptParams) -> Vec<u8> {
    let mut script = Vec::with_capacity(92);

    script.push(OP_PUSHBYTES_20);
    script.extend_from_slice(params.depositor.as_bytes());
    script.push(OP_DROP);

    script.push(OP_PUSHBYTES_8);
    script.extend_from_slice(&params.blinding_factor);
    script.push(OP_DROP);

    script.extend_from_slice(&[OP_DUP, OP_HASH160, OP_PUSHBYTES_20]);
    script.extend_from_slice(&params.wallet_pub_key_hash);
    script.extend_from_slice(&[OP_EQUAL, OP_IF, OP_CHECKSIG, OP_ELSE]);

    script.extend_from_slice(&[OP_DUP, OP_HASH160, OP_PUSHBYTES_20]);
    script.extend_from_slice(&params.refund_pub_key_hash);
    script.push(OP_EQUALVERIFY);

    script.push(OP_PUSHBYTES_4);
    script.extend_from_slice(&params.refund_locktime);
    script.extend_from_slice(&[OP_CHECKLOCKTIMEVERIFY, OP_DROP, OP_CHECKSIG, OP_ENDIF]);

    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::deposit::LedgerAddress;

    fn params() -> DepositScriptParams {
        DepositScriptParams {
            depositor: LedgerAddress([0x11; 20]),
            blinding_factor: [0x22; 8],
            wallet_pub_key_hash: [0x33; 20],
            refund_pub_key_hash: [0x44; 20],
            refund_locktime: [0x60, 0xbc, 0xea, 0x61],
        }
    }

    #[test]
    fn test_deposit_script_layout() {
        let script = deposit_script(&params());

        let expected = format!(
            "14{}7508{}7576a914{}8763ac6776a914{}8804{}b175ac68",
            "11".repeat(20),
            "22".repeat(8),
            "33".repeat(20),
            "44".repeat(20),
            "60bcea61"
        );
        assert_eq!(hex::encode(&script), expected);
        assert_eq!(script.len(), 92);
    }

    #[test]
    fn test_deposit_script_changes_with_blinding() {
        let mut other = params();
        other.blinding_factor[7] ^= 1;
        assert_ne!(deposit_script(&params()), deposit_script(&other));
    }

    #[test]
    fn test_classify_standard_scripts() {
        let h20 = [0xab; 20];
        let h32 = [0xcd; 32];

        assert_eq!(classify_script(&p2pkh_script(&h20)), ScriptKind::P2pkh(h20));
        assert_eq!(classify_script(&p2wpkh_script(&h20)), ScriptKind::P2wpkh(h20));
        assert_eq!(classify_script(&p2sh_script(&h20)), ScriptKind::P2sh(h20));
        assert_eq!(classify_script(&p2wsh_script(&h32)), ScriptKind::P2wsh(h32));
    }

    #[test]
    fn test_classify_rejects_near_misses() {
        let h20 = [0xab; 20];

        let mut bad_p2pkh = p2pkh_script(&h20);
        bad_p2pkh[24] = 0x87;
        assert_eq!(classify_script(&bad_p2pkh), ScriptKind::Unsupported);

        // Witness v1 program
        let mut taproot = vec![0x51, 0x20];
        taproot.extend_from_slice(&[0u8; 32]);
        assert_eq!(classify_script(&taproot), ScriptKind::Unsupported);

        assert_eq!(classify_script(&[]), ScriptKind::Unsupported);
        assert_eq!(classify_script(&[0x00, 0x14, 0x01]), ScriptKind::Unsupported);
    }

    #[test]
    fn test_wallet_key_hash() {
        let h20 = [0x01; 20];
        assert_eq!(ScriptKind::P2wpkh(h20).wallet_key_hash(), Some(h20));
        assert_eq!(ScriptKind::P2sh(h20).wallet_key_hash(), None);
        assert_eq!(ScriptKind::P2wsh([0u8; 32]).hash().map(|h| h.len()), Some(32));
        assert_eq!(ScriptKind::Unsupported.hash(), None);
    }
}
