//! Four-part one-way hash ratchet for group sessions
//!
//! The ratchet behaves like a 4-digit base-256 counter `R0 R1 R2 R3` where
//! each digit is a 32-byte secret. Incrementing the counter rehashes the
//! lowest digit; a carry into digit `h` rehashes `R(h)` and reseeds every
//! finer digit from the new `R(h)`. Because every step is a keyed hash, the
//! state at index `n` reveals nothing about the state at any index `< n`.
//!
//! ```text
//! index = 0x01_02_03_04
//!          R0 R1 R2 R3
//!          │  │  │  └── rehashed every step
//!          │  │  └───── rehashed every 2^8 steps
//!          │  └──────── rehashed every 2^16 steps
//!          └─────────── rehashed every 2^24 steps
//! ```
//!
//! Jumping forward with [`HashRatchet::advance_to`] costs at most 255 hashes
//! per digit, independent of the distance.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{cipher::CipherKeys, kdf::hkdf_expand, kdf::hmac_sha256};

/// Number of parts (digits) in the ratchet
pub const RATCHET_PARTS: usize = 4;

/// Size of one ratchet part (32 bytes)
pub const RATCHET_PART_LENGTH: usize = 32;

/// Size of the full ratchet state (128 bytes)
pub const RATCHET_LENGTH: usize = RATCHET_PARTS * RATCHET_PART_LENGTH;

/// HKDF info for expanding random seed bytes into the initial parts
const RATCHET_SEED_INFO: &[u8] = b"MEGOLM_RATCHET";

/// HKDF info for expanding the ratchet into cipher keys
const MESSAGE_KEYS_INFO: &[u8] = b"MEGOLM_KEYS";

/// One-way hash ratchet state at a given message index.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HashRatchet {
    /// `R0` (coarsest) through `R3` (finest)
    parts: [[u8; RATCHET_PART_LENGTH]; RATCHET_PARTS],
    /// Message index this state corresponds to
    index: u32,
}

impl HashRatchet {
    /// Seed a fresh ratchet at index 0 from caller-supplied random bytes.
    pub fn from_seed(seed: &[u8]) -> Self {
        let mut okm: [u8; RATCHET_LENGTH] = hkdf_expand(None, seed, RATCHET_SEED_INFO);
        let ratchet = Self::from_bytes(&okm, 0);
        okm.zeroize();
        ratchet
    }

    /// Rebuild a ratchet from its 128-byte serialized parts.
    pub fn from_bytes(bytes: &[u8; RATCHET_LENGTH], index: u32) -> Self {
        let mut parts = [[0u8; RATCHET_PART_LENGTH]; RATCHET_PARTS];
        for (i, part) in parts.iter_mut().enumerate() {
            part.copy_from_slice(&bytes[i * RATCHET_PART_LENGTH..(i + 1) * RATCHET_PART_LENGTH]);
        }
        Self { parts, index }
    }

    /// Rebuild a ratchet from its parts.
    pub fn from_parts(parts: [[u8; RATCHET_PART_LENGTH]; RATCHET_PARTS], index: u32) -> Self {
        Self { parts, index }
    }

    /// Message index this state corresponds to.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The four parts, coarsest first.
    pub fn parts(&self) -> &[[u8; RATCHET_PART_LENGTH]; RATCHET_PARTS] {
        &self.parts
    }

    /// Concatenated parts `R0 | R1 | R2 | R3`.
    pub fn to_bytes(&self) -> [u8; RATCHET_LENGTH] {
        let mut bytes = [0u8; RATCHET_LENGTH];
        for (i, part) in self.parts.iter().enumerate() {
            bytes[i * RATCHET_PART_LENGTH..(i + 1) * RATCHET_PART_LENGTH].copy_from_slice(part);
        }
        bytes
    }

    /// Cipher keys for the message at the current index.
    pub fn cipher_keys(&self) -> CipherKeys {
        let mut bytes = self.to_bytes();
        let keys = CipherKeys::derive(&bytes, MESSAGE_KEYS_INFO);
        bytes.zeroize();
        keys
    }

    /// Advance by exactly one index.
    ///
    /// The index wraps to 0 after `u32::MAX`, which would repeat keys.
    /// Senders must stop advancing once the index reaches `u32::MAX`.
    pub fn advance(&mut self) {
        self.index = self.index.wrapping_add(1);

        // Find the coarsest part whose digit changed. Part 3 always does, so
        // the loop stops at h = 3 at the latest.
        let mut mask: u32 = 0x00FF_FFFF;
        let mut h = 0;
        while h < RATCHET_PARTS {
            if self.index & mask == 0 {
                break;
            }
            h += 1;
            mask >>= 8;
        }

        // Reseed R(h+1)..R(3) from the old R(h) before R(h) itself moves.
        for i in (h..RATCHET_PARTS).rev() {
            self.rehash_part(h, i);
        }
    }

    /// Advance to `target`, touching only the digits that change.
    ///
    /// A `target` below the current index wraps around through 2^32.
    pub fn advance_to(&mut self, target: u32) {
        for j in 0..RATCHET_PARTS {
            let shift = (RATCHET_PARTS - 1 - j) * 8;
            let mask: u32 = u32::MAX << shift;

            // Number of increments needed in digit j
            let mut steps = (target >> shift).wrapping_sub(self.index >> shift) & 0xff;
            if steps == 0 {
                if target < self.index {
                    steps = 0x100;
                } else {
                    continue;
                }
            }

            // All but the last increment only need R(j) itself.
            while steps > 1 {
                self.rehash_part(j, j);
                steps -= 1;
            }

            // The last increment also reseeds the finer digits.
            for k in (j..RATCHET_PARTS).rev() {
                self.rehash_part(j, k);
            }

            self.index = target & mask;
        }
    }

    /// `R(to) = HMAC(R(from), [to])`
    fn rehash_part(&mut self, from: usize, to: usize) {
        let next = hmac_sha256(&self.parts[from], &[to as u8]);
        self.parts[to].zeroize();
        self.parts[to] = next;
    }
}
