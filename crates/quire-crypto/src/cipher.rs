//! Symmetric encryption using AES-256-CTR with an HMAC-SHA-256 tag
//!
//! All functions are pure. Keys, IV and MAC key are derived together from a
//! single secret so a message key never needs more than one HKDF call.

use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::kdf::hkdf_expand;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Full HMAC-SHA-256 tag size (32 bytes)
pub const MAC_SIZE: usize = 32;

/// Truncated tag carried by ratchet messages (8 bytes)
pub const TRUNCATED_MAC_SIZE: usize = 8;

/// Length of the HKDF output split into AES key, MAC key and IV
const DERIVED_LENGTH: usize = 80;

/// AES key, HMAC key and CTR initial counter block derived from one secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKeys {
    aes_key: [u8; 32],
    mac_key: [u8; 32],
    iv: [u8; 16],
}

impl CipherKeys {
    /// Derive cipher keys from `secret` with HKDF-SHA-256 under `info`.
    ///
    /// Layout of the 80-byte expansion:
    /// - bytes 0-31: AES-256 key
    /// - bytes 32-63: HMAC-SHA-256 key
    /// - bytes 64-79: AES-CTR initial counter block
    pub fn derive(secret: &[u8], info: &[u8]) -> Self {
        let mut okm: [u8; DERIVED_LENGTH] = hkdf_expand(None, secret, info);

        let mut keys = Self { aes_key: [0u8; 32], mac_key: [0u8; 32], iv: [0u8; 16] };
        keys.aes_key.copy_from_slice(&okm[0..32]);
        keys.mac_key.copy_from_slice(&okm[32..64]);
        keys.iv.copy_from_slice(&okm[64..80]);
        okm.zeroize();

        keys
    }

    /// Encrypt with AES-256-CTR. Output length equals input length.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        self.apply_keystream(plaintext)
    }

    /// Decrypt with AES-256-CTR.
    ///
    /// CTR mode has no padding, so decryption cannot fail. Authenticity must
    /// be checked with [`Self::verify_mac`] before trusting the output.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        self.apply_keystream(ciphertext)
    }

    /// Full 32-byte HMAC-SHA-256 tag over `data`.
    pub fn mac(&self, data: &[u8]) -> [u8; MAC_SIZE] {
        let mut mac = self.hmac();
        mac.update(data);

        let mut tag = [0u8; MAC_SIZE];
        tag.copy_from_slice(&mac.finalize().into_bytes());
        tag
    }

    /// Tag truncated to its first 8 bytes.
    pub fn truncated_mac(&self, data: &[u8]) -> [u8; TRUNCATED_MAC_SIZE] {
        let full = self.mac(data);

        let mut tag = [0u8; TRUNCATED_MAC_SIZE];
        tag.copy_from_slice(&full[..TRUNCATED_MAC_SIZE]);
        tag
    }

    /// Constant-time check of a full or left-truncated tag over `data`.
    ///
    /// Empty tags never verify.
    pub fn verify_mac(&self, data: &[u8], tag: &[u8]) -> bool {
        let mut mac = self.hmac();
        mac.update(data);
        mac.verify_truncated_left(tag).is_ok()
    }

    fn hmac(&self) -> HmacSha256 {
        let Ok(mac) = HmacSha256::new_from_slice(&self.mac_key) else {
            unreachable!("HMAC-SHA256 accepts any key size");
        };
        mac
    }

    fn apply_keystream(&self, input: &[u8]) -> Vec<u8> {
        let mut buffer = input.to_vec();
        let mut cipher = Aes256Ctr::new((&self.aes_key).into(), (&self.iv).into());
        cipher.apply_keystream(&mut buffer);
        buffer
    }
}
