//! Curve25519 key agreement
//!
//! Thin value types over `x25519-dalek`. Secret keys are built from
//! caller-supplied random bytes and zeroized on drop.

use std::fmt;

use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Size of a Curve25519 key, public or secret (32 bytes)
pub const CURVE25519_KEY_SIZE: usize = 32;

/// A Curve25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Curve25519PublicKey([u8; CURVE25519_KEY_SIZE]);

impl Curve25519PublicKey {
    /// Wrap raw public key bytes.
    pub fn from_bytes(bytes: [u8; CURVE25519_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a public key from a slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; CURVE25519_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: CURVE25519_KEY_SIZE, actual: bytes.len() }
        })?;
        Ok(Self(key))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; CURVE25519_KEY_SIZE] {
        &self.0
    }

    /// Owned copy of the raw key bytes.
    pub fn to_bytes(self) -> [u8; CURVE25519_KEY_SIZE] {
        self.0
    }
}

impl fmt::Debug for Curve25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Curve25519PublicKey(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

impl From<[u8; CURVE25519_KEY_SIZE]> for Curve25519PublicKey {
    fn from(bytes: [u8; CURVE25519_KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

/// A Curve25519 secret key.
#[derive(Clone)]
pub struct Curve25519SecretKey(StaticSecret);

impl Curve25519SecretKey {
    /// Build a secret key from 32 random bytes (clamped internally).
    pub fn from_bytes(bytes: [u8; CURVE25519_KEY_SIZE]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Raw secret bytes, for persistence.
    pub fn to_bytes(&self) -> Zeroizing<[u8; CURVE25519_KEY_SIZE]> {
        Zeroizing::new(self.0.to_bytes())
    }

    /// Public half of this key.
    pub fn public_key(&self) -> Curve25519PublicKey {
        Curve25519PublicKey(PublicKey::from(&self.0).to_bytes())
    }

    /// X25519 Diffie-Hellman with `their_key`.
    pub fn diffie_hellman(
        &self,
        their_key: &Curve25519PublicKey,
    ) -> Zeroizing<[u8; CURVE25519_KEY_SIZE]> {
        let shared = self.0.diffie_hellman(&PublicKey::from(their_key.0));
        Zeroizing::new(shared.to_bytes())
    }
}

impl fmt::Debug for Curve25519SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Curve25519SecretKey").field(&"<redacted>").finish()
    }
}

/// A Curve25519 secret key together with its public key.
#[derive(Clone, Debug)]
pub struct Curve25519Keypair {
    secret_key: Curve25519SecretKey,
    public_key: Curve25519PublicKey,
}

impl Curve25519Keypair {
    /// Build a key pair from 32 random bytes.
    pub fn from_secret_bytes(bytes: [u8; CURVE25519_KEY_SIZE]) -> Self {
        Self::from(Curve25519SecretKey::from_bytes(bytes))
    }

    /// Secret half.
    pub fn secret_key(&self) -> &Curve25519SecretKey {
        &self.secret_key
    }

    /// Public half.
    pub fn public_key(&self) -> Curve25519PublicKey {
        self.public_key
    }

    /// X25519 Diffie-Hellman with `their_key`.
    pub fn diffie_hellman(
        &self,
        their_key: &Curve25519PublicKey,
    ) -> Zeroizing<[u8; CURVE25519_KEY_SIZE]> {
        self.secret_key.diffie_hellman(their_key)
    }
}

impl From<Curve25519SecretKey> for Curve25519Keypair {
    fn from(secret_key: Curve25519SecretKey) -> Self {
        let public_key = secret_key.public_key();
        Self { secret_key, public_key }
    }
}
