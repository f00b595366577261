//! Sweep Signer
//!
//! Signs sweep sighashes with the wallet key.
//! Single-key signing; a threshold wallet only needs to implement `SweepSigner`.

use bitcoin::secp256k1::{ecdsa, Message, PublicKey, SecretKey};
use secp256k1::SECP256K1;

use super::AssemblerError;
use crate::primitives::hash160;

/// Trait for sweep signers
pub trait SweepSigner: Send + Sync {
    /// Compressed wallet public key
    fn public_key(&self) -> bitcoin::PublicKey;

    /// ECDSA signature over a 32-byte sighash
    fn sign_digest(&self, digest: [u8; 32]) -> Result<ecdsa::Signature, AssemblerError>;

    /// HASH160 of the compressed public key
    fn pub_key_hash(&self) -> [u8; 20] {
        hash160(&self.public_key().to_bytes())
    }
}

/// Single-key wallet signer
pub struct WalletSigner {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl WalletSigner {
    /// Create from secret key bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, AssemblerError> {
        let secret_key =
            SecretKey::from_slice(bytes).map_err(|e| AssemblerError::InvalidKey(e.to_string()))?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Create from hex string
    pub fn from_hex(hex: &str) -> Result<Self, AssemblerError> {
        let bytes = hex::decode(hex.trim()).map_err(|e| AssemblerError::InvalidKey(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AssemblerError::InvalidKey("key must be 32 bytes".to_string()))?;
        Self::from_bytes(&arr)
    }

    /// Generate a new random signer
    pub fn generate() -> Self {
        Self::from_secret_key(SecretKey::new(&mut rand::thread_rng()))
    }

    fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key_global(&secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Get secret key hex (for backup)
    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }
}

impl SweepSigner for WalletSigner {
    fn public_key(&self) -> bitcoin::PublicKey {
        bitcoin::PublicKey::new(self.public_key)
    }

    fn sign_digest(&self, digest: [u8; 32]) -> Result<ecdsa::Signature, AssemblerError> {
        let message = Message::from_digest(digest);
        Ok(SECP256K1.sign_ecdsa(&message, &self.secret_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex_roundtrip() {
        let signer = WalletSigner::generate();
        let restored = WalletSigner::from_hex(&signer.secret_hex()).unwrap();
        assert_eq!(signer.public_key(), restored.public_key());
        assert!(signer.public_key().compressed);
        assert_eq!(signer.public_key().to_bytes().len(), 33);
    }

    #[test]
    fn test_invalid_keys() {
        assert!(matches!(WalletSigner::from_hex("zz"), Err(AssemblerError::InvalidKey(_))));
        assert!(matches!(WalletSigner::from_hex("0102"), Err(AssemblerError::InvalidKey(_))));
        assert!(matches!(WalletSigner::from_bytes(&[0u8; 32]), Err(AssemblerError::InvalidKey(_))));
    }

    #[test]
    fn test_signature_verifies() {
        let signer = WalletSigner::from_bytes(&[0x01; 32]).unwrap();
        let digest = [0x5a; 32];
        let sig = signer.sign_digest(digest).unwrap();

        SECP256K1
            .verify_ecdsa(&Message::from_digest(digest), &sig, &signer.public_key().inner)
            .unwrap();
    }
}
