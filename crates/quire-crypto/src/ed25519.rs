//! Ed25519 signatures
//!
//! Signing keys are built from caller-supplied 32-byte seeds. Verification is
//! strict: small-order keys and non-canonical signatures are rejected.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Size of an Ed25519 public key or seed (32 bytes)
pub const ED25519_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature (64 bytes)
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// An Ed25519 public (verification) key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(VerifyingKey);

impl Ed25519PublicKey {
    /// Parse a public key. Fails if the bytes are not a valid curve point.
    pub fn from_bytes(bytes: &[u8; ED25519_KEY_SIZE]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(bytes).map(Self).map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Parse a public key from a slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: &[u8; ED25519_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: ED25519_KEY_SIZE, actual: bytes.len() }
        })?;
        Self::from_bytes(key)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; ED25519_KEY_SIZE] {
        self.0.as_bytes()
    }

    /// Owned copy of the raw key bytes.
    pub fn to_bytes(self) -> [u8; ED25519_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Verify `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        let signature = Signature::from_bytes(&signature.0);
        self.0.verify_strict(message, &signature).map_err(|_| CryptoError::BadSignature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519PublicKey(")?;
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// A detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519Signature([u8; ED25519_SIGNATURE_SIZE]);

impl Ed25519Signature {
    /// Wrap raw signature bytes. Validity is only checked on verification.
    pub fn from_bytes(bytes: [u8; ED25519_SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a signature from a slice of exactly 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let signature: [u8; ED25519_SIGNATURE_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: ED25519_SIGNATURE_SIZE, actual: bytes.len() }
        })?;
        Ok(Self(signature))
    }

    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; ED25519_SIGNATURE_SIZE] {
        &self.0
    }

    /// Owned copy of the raw signature bytes.
    pub fn to_bytes(self) -> [u8; ED25519_SIGNATURE_SIZE] {
        self.0
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Signature(")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

/// An Ed25519 signing key pair.
#[derive(Clone)]
pub struct Ed25519Keypair {
    signing_key: SigningKey,
}

impl Ed25519Keypair {
    /// Build a key pair from a 32-byte random seed.
    pub fn from_seed(seed: &[u8; ED25519_KEY_SIZE]) -> Self {
        Self { signing_key: SigningKey::from_bytes(seed) }
    }

    /// The 32-byte seed, for persistence.
    pub fn seed(&self) -> Zeroizing<[u8; ED25519_KEY_SIZE]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// Public half.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key())
    }

    /// Sign `message`.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Ed25519Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Keypair").field("public_key", &self.public_key()).finish()
    }
}

/// Verify a detached signature made with [`Ed25519Keypair::sign`].
pub fn verify_signature(
    public_key: &Ed25519PublicKey,
    message: &[u8],
    signature: &Ed25519Signature,
) -> Result<(), CryptoError> {
    public_key.verify(message, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let keypair = Ed25519Keypair::from_seed(&[0x07; 32]);
        let signature = keypair.sign(b"message");

        assert!(verify_signature(&keypair.public_key(), b"message", &signature).is_ok());
    }

    #[test]
    fn signature_over_different_message_fails() {
        let keypair = Ed25519Keypair::from_seed(&[0x07; 32]);
        let signature = keypair.sign(b"message");

        let result = keypair.public_key().verify(b"massage", &signature);
        assert_eq!(result, Err(CryptoError::BadSignature));
    }

    #[test]
    fn signature_from_other_key_fails() {
        let alice = Ed25519Keypair::from_seed(&[0x01; 32]);
        let mallory = Ed25519Keypair::from_seed(&[0x02; 32]);
        let signature = mallory.sign(b"message");

        assert!(alice.public_key().verify(b"message", &signature).is_err());
    }

    #[test]
    fn flipped_signature_bit_fails() {
        let keypair = Ed25519Keypair::from_seed(&[0x07; 32]);
        let mut bytes = keypair.sign(b"message").to_bytes();
        bytes[63] ^= 0x01;

        let result = keypair.public_key().verify(b"message", &Ed25519Signature::from_bytes(bytes));
        assert_eq!(result, Err(CryptoError::BadSignature));
    }

    #[test]
    fn signing_is_deterministic() {
        let keypair = Ed25519Keypair::from_seed(&[0x07; 32]);
        assert_eq!(keypair.sign(b"message"), keypair.sign(b"message"));
    }

    #[test]
    fn seed_roundtrip_preserves_public_key() {
        let keypair = Ed25519Keypair::from_seed(&[0x09; 32]);
        let restored = Ed25519Keypair::from_seed(&keypair.seed());
        assert_eq!(keypair.public_key(), restored.public_key());
    }

    #[test]
    fn public_key_bytes_roundtrip() {
        let keypair = Ed25519Keypair::from_seed(&[0x09; 32]);
        let bytes = keypair.public_key().to_bytes();
        assert_eq!(Ed25519PublicKey::from_bytes(&bytes), Ok(keypair.public_key()));
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(matches!(
            Ed25519PublicKey::from_slice(&[0u8; 33]),
            Err(CryptoError::InvalidKeyLength { expected: 32, actual: 33 })
        ));
        assert!(matches!(
            Ed25519Signature::from_slice(&[0u8; 10]),
            Err(CryptoError::InvalidKeyLength { expected: 64, actual: 10 })
        ));
    }
}
