//! Group ratchet messages and checkpoints.
//!
//! ```text
//! GroupMessage (0x03)
//! ┌─────────┬───────────────┬────────┬────────────┬─────────┬───────────┐
//! │ version │ message_index │ ct_len │ ciphertext │ mac     │ signature │
//! │ 1 byte  │ u32 BE        │ u32 BE │ ct_len     │ 8 bytes │ 64 bytes  │
//! └─────────┴───────────────┴────────┴────────────┴─────────┴───────────┘
//!
//! SessionKey (0x02)          version | index | R0..R3 | signing_key | signature
//! ExportedSessionKey (0x01)  version | index | R0..R3 | signing_key
//! GroupSessionBackup (0x04)  version | index | R0..R3 | signing_seed
//! ```
//!
//! `R0..R3` is the 128-byte hash ratchet state. The MAC of a group message
//! covers everything before it; the signature covers everything before it
//! including the MAC.
//!
//! # Security
//!
//! Parsing never verifies signatures or MACs. [`SessionKey`] is the only
//! checkpoint that proves it came from the holder of the signing key.
//! [`GroupSessionBackup`] carries the private signing seed and must never be
//! shared with recipients.

use bytes::{BufMut, Bytes};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    codec::{Reader, put_length_prefixed},
    errors::Result,
    message::MAX_CIPHERTEXT_SIZE,
};

/// Version byte of group messages
pub const GROUP_MESSAGE_VERSION: u8 = 0x03;

/// Version byte of signed session keys
pub const SESSION_KEY_VERSION: u8 = 0x02;

/// Version byte of unsigned exported session keys
pub const EXPORTED_SESSION_KEY_VERSION: u8 = 0x01;

/// Version byte of author backups
pub const GROUP_BACKUP_VERSION: u8 = 0x04;

/// Hash ratchet state length (4 parts of 32 bytes)
pub const GROUP_RATCHET_SIZE: usize = 128;

/// Truncated MAC length carried by group messages
pub const GROUP_MAC_SIZE: usize = 8;

/// Ed25519 signature length
pub const SIGNATURE_SIZE: usize = 64;

/// Ed25519 public key / seed length
const KEY_SIZE: usize = 32;

/// A signed, encrypted group message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMessage {
    /// Ratchet index the message key was derived at
    pub message_index: u32,
    /// AES-256-CTR ciphertext
    pub ciphertext: Bytes,
    /// Truncated HMAC-SHA-256 over [`GroupMessage::mac_input`]
    pub mac: [u8; GROUP_MAC_SIZE],
    /// Ed25519 signature over [`GroupMessage::signature_input`]
    pub signature: [u8; SIGNATURE_SIZE],
}

impl GroupMessage {
    /// Build a message with zeroed MAC and signature, to be filled by the
    /// sender.
    pub fn new(message_index: u32, ciphertext: impl Into<Bytes>) -> Self {
        Self {
            message_index,
            ciphertext: ciphertext.into(),
            mac: [0u8; GROUP_MAC_SIZE],
            signature: [0u8; SIGNATURE_SIZE],
        }
    }

    /// Bytes covered by the MAC.
    pub fn mac_input(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            9 + self.ciphertext.len() + GROUP_MAC_SIZE + SIGNATURE_SIZE,
        );
        out.put_u8(GROUP_MESSAGE_VERSION);
        out.put_u32(self.message_index);
        put_length_prefixed(&mut out, &self.ciphertext);
        out
    }

    /// Bytes covered by the signature (MAC input followed by the MAC).
    pub fn signature_input(&self) -> Vec<u8> {
        let mut out = self.mac_input();
        out.put_slice(&self.mac);
        out
    }

    /// Full wire encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.signature_input();
        out.put_slice(&self.signature);
        out
    }

    /// Parse a group message without verifying anything.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        reader.read_version(GROUP_MESSAGE_VERSION)?;
        let message_index = reader.read_u32()?;
        let ciphertext = Bytes::copy_from_slice(reader.read_length_prefixed(MAX_CIPHERTEXT_SIZE)?);
        let mac = reader.read_array()?;
        let signature = reader.read_array()?;
        reader.finish()?;

        Ok(Self { message_index, ciphertext, mac, signature })
    }
}

/// Signed checkpoint handed to recipients.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    /// Index the ratchet state corresponds to
    pub message_index: u32,
    /// Hash ratchet state `R0..R3`
    pub ratchet: [u8; GROUP_RATCHET_SIZE],
    /// Ed25519 public key of the sending session
    pub signing_key: [u8; KEY_SIZE],
    /// Signature over [`SessionKey::signature_input`]
    pub signature: [u8; SIGNATURE_SIZE],
}

impl SessionKey {
    /// Bytes covered by the signature.
    pub fn signature_input(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + GROUP_RATCHET_SIZE + KEY_SIZE + SIGNATURE_SIZE);
        out.put_u8(SESSION_KEY_VERSION);
        out.put_u32(self.message_index);
        out.put_slice(&self.ratchet);
        out.put_slice(&self.signing_key);
        out
    }

    /// Full wire encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.signature_input();
        out.put_slice(&self.signature);
        out
    }

    /// Parse a session key without verifying its signature.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        reader.read_version(SESSION_KEY_VERSION)?;
        let message_index = reader.read_u32()?;
        let ratchet = reader.read_array()?;
        let signing_key = reader.read_array()?;
        let signature = reader.read_array()?;
        reader.finish()?;

        Ok(Self { message_index, ratchet, signing_key, signature })
    }
}

/// Unsigned checkpoint exported from an inbound session.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ExportedSessionKey {
    /// Index the ratchet state corresponds to
    pub message_index: u32,
    /// Hash ratchet state `R0..R3`
    pub ratchet: [u8; GROUP_RATCHET_SIZE],
    /// Ed25519 public key of the sending session
    pub signing_key: [u8; KEY_SIZE],
}

impl ExportedSessionKey {
    /// Full wire encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + GROUP_RATCHET_SIZE + KEY_SIZE);
        out.put_u8(EXPORTED_SESSION_KEY_VERSION);
        out.put_u32(self.message_index);
        out.put_slice(&self.ratchet);
        out.put_slice(&self.signing_key);
        out
    }

    /// Parse an exported session key.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        reader.read_version(EXPORTED_SESSION_KEY_VERSION)?;
        let message_index = reader.read_u32()?;
        let ratchet = reader.read_array()?;
        let signing_key = reader.read_array()?;
        reader.finish()?;

        Ok(Self { message_index, ratchet, signing_key })
    }
}

/// Author backup of an outbound session, including the private signing seed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct GroupSessionBackup {
    /// Index the ratchet state corresponds to
    pub message_index: u32,
    /// Hash ratchet state `R0..R3`
    pub ratchet: [u8; GROUP_RATCHET_SIZE],
    /// Ed25519 private seed of the sending session
    pub signing_seed: [u8; KEY_SIZE],
}

impl GroupSessionBackup {
    /// Full wire encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + GROUP_RATCHET_SIZE + KEY_SIZE);
        out.put_u8(GROUP_BACKUP_VERSION);
        out.put_u32(self.message_index);
        out.put_slice(&self.ratchet);
        out.put_slice(&self.signing_seed);
        out
    }

    /// Parse a backup.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        reader.read_version(GROUP_BACKUP_VERSION)?;
        let message_index = reader.read_u32()?;
        let ratchet = reader.read_array()?;
        let signing_seed = reader.read_array()?;
        reader.finish()?;

        Ok(Self { message_index, ratchet, signing_seed })
    }
}

macro_rules! redacted_debug {
    ($ty:ident, $key:ident) => {
        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("message_index", &self.message_index)
                    .field(stringify!($key), &"<redacted>")
                    .finish_non_exhaustive()
            }
        }
    };
}

redacted_debug!(SessionKey, ratchet);
redacted_debug!(ExportedSessionKey, ratchet);
redacted_debug!(GroupSessionBackup, ratchet);
