//! Symmetric chain-key ratchet for forward-secure message key derivation
//!
//! # Security Properties
//!
//! - Forward Secrecy: Old chain keys are overwritten when advancing
//! - Key Uniqueness: Each index produces a unique message key
//! - Determinism: Same seed always produces same key sequence

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{cipher::CipherKeys, kdf::hmac_sha256};

/// HMAC input for deriving a message key
const MESSAGE_KEY_SEED: &[u8] = &[0x01];

/// HMAC input for deriving the next chain key
const CHAIN_KEY_SEED: &[u8] = &[0x02];

/// HKDF info for expanding a message key into cipher keys
const MESSAGE_KEYS_INFO: &[u8] = b"OLM_KEYS";

/// A message key derived from a chain key.
///
/// Used for a single encryption or decryption. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MessageKey {
    /// The 32-byte secret the cipher keys are expanded from
    key: [u8; 32],
    /// Chain index this key was derived at
    index: u32,
}

impl MessageKey {
    /// Rebuild a message key from persisted bytes.
    pub fn new(key: [u8; 32], index: u32) -> Self {
        Self { key, index }
    }

    /// Raw 32-byte key.
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// Chain index this key was derived at.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Expand into AES key, MAC key and IV.
    pub fn cipher_keys(&self) -> CipherKeys {
        CipherKeys::derive(&self.key, MESSAGE_KEYS_INFO)
    }
}

/// Forward-secure chain key.
///
/// Each [`advance()`](Self::advance) call overwrites the current chain key
/// with `HMAC(chain_key, 0x02)` and increments the index. Message keys are
/// `HMAC(chain_key, 0x01)` and never feed back into the chain.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ChainKey {
    /// Current chain key (32 bytes)
    key: [u8; 32],
    /// Number of `advance()` calls since the chain was created
    index: u32,
}

impl ChainKey {
    /// Start a chain at index 0.
    pub fn new(key: [u8; 32]) -> Self {
        Self { key, index: 0 }
    }

    /// Rebuild a chain at a known index (used when restoring state).
    pub fn with_index(key: [u8; 32], index: u32) -> Self {
        Self { key, index }
    }

    /// Current chain index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Raw chain key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Message key for the current index. Does not advance the chain.
    pub fn create_message_key(&self) -> MessageKey {
        MessageKey { key: hmac_sha256(&self.key, MESSAGE_KEY_SEED), index: self.index }
    }

    /// Replace the chain key with its successor and bump the index.
    ///
    /// The index wraps to 0 after `u32::MAX`. Callers that put the index on
    /// the wire must stop before that point.
    pub fn advance(&mut self) {
        let next = hmac_sha256(&self.key, CHAIN_KEY_SEED);
        self.key.zeroize();
        self.key = next;
        self.index = self.index.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_seed() -> [u8; 32] {
        let mut seed = [0u8; 32];
        for (i, byte) in seed.iter_mut().enumerate() {
            *byte = i as u8;
        }
        seed
    }

    #[test]
    fn new_chain_starts_at_index_zero() {
        let chain = ChainKey::new(test_seed());
        assert_eq!(chain.index(), 0);
        assert_eq!(chain.create_message_key().index(), 0);
    }

    #[test]
    fn advance_increments_index() {
        let mut chain = ChainKey::new(test_seed());
        chain.advance();
        assert_eq!(chain.index(), 1);
        chain.advance();
        assert_eq!(chain.index(), 2);
        assert_eq!(chain.create_message_key().index(), 2);
    }

    #[test]
    fn advance_changes_chain_key() {
        let mut chain = ChainKey::new(test_seed());
        let before = *chain.as_bytes();
        chain.advance();
        assert_ne!(chain.as_bytes(), &before);
    }

    #[test]
    fn message_keys_are_unique_per_index() {
        let mut chain = ChainKey::new(test_seed());
        let key0 = chain.create_message_key();
        chain.advance();
        let key1 = chain.create_message_key();
        chain.advance();
        let key2 = chain.create_message_key();

        assert_ne!(key0.key(), key1.key(), "keys must be unique");
        assert_ne!(key1.key(), key2.key(), "keys must be unique");
        assert_ne!(key0.key(), key2.key(), "keys must be unique");
    }

    #[test]
    fn message_key_differs_from_next_chain_key() {
        let mut chain = ChainKey::new(test_seed());
        let message_key = chain.create_message_key();
        chain.advance();
        assert_ne!(message_key.key(), chain.as_bytes());
    }

    #[test]
    fn chain_is_deterministic() {
        let mut chain1 = ChainKey::new(test_seed());
        let mut chain2 = ChainKey::new(test_seed());

        for _ in 0..10 {
            assert_eq!(chain1.create_message_key().key(), chain2.create_message_key().key());
            chain1.advance();
            chain2.advance();
        }
    }

    #[test]
    fn with_index_resumes_sequence() {
        let mut chain = ChainKey::new(test_seed());
        chain.advance();
        chain.advance();

        let mut resumed = ChainKey::with_index(*chain.as_bytes(), chain.index());
        chain.advance();
        resumed.advance();

        assert_eq!(chain.as_bytes(), resumed.as_bytes());
        assert_eq!(chain.index(), resumed.index());
    }

    #[test]
    fn message_key_roundtrip_through_bytes() {
        let chain = ChainKey::new(test_seed());
        let key = chain.create_message_key();
        let restored = MessageKey::new(*key.key(), key.index());

        let plaintext = b"hello";
        let ciphertext = key.cipher_keys().encrypt(plaintext);
        assert_eq!(restored.cipher_keys().decrypt(&ciphertext), plaintext);
    }
}
