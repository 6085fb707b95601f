//! Encrypted, authenticated persistence format.
//!
//! ```text
//! ┌─────────┬────────────────────────────┬──────────────────────┐
//! │ version │ AES-256-CTR(fields)        │ HMAC-SHA-256         │
//! │ 1 byte  │ variable                   │ 32 bytes             │
//! └─────────┴────────────────────────────┴──────────────────────┘
//! ```
//!
//! AES key, MAC key and IV are expanded from the caller's pickle key with
//! HKDF-SHA-256 under the info string `"Pickle"`. The MAC covers the version
//! byte and the ciphertext.
//!
//! # Security
//!
//! - MAC First: the tag is checked before the version byte is interpreted or
//!   any field is decrypted. A flipped bit anywhere yields
//!   [`PickleError::BadMac`], never a silently different state.
//! - Deterministic: the IV is derived from the key, so pickling the same
//!   state twice with the same key is byte-identical. Pickles of different
//!   states under one key share a keystream; they are at-rest snapshots of
//!   one entity, not a channel.
//! - Canonical: field decoding rejects trailing bytes.

use quire_crypto::{CipherKeys, MAC_SIZE};
use quire_proto::{ProtocolError, codec::Reader};
use zeroize::Zeroizing;

use crate::error::PickleError;

/// Current pickle format version
pub const PICKLE_VERSION: u8 = 1;

/// HKDF info for pickle keys
const PICKLE_INFO: &[u8] = b"Pickle";

/// Persistence for a stateful entity.
///
/// Implementors describe their flat field list; the container format and
/// its encryption live in the provided methods.
pub trait Pickle: Sized {
    /// Append the entity's fields in their stable order.
    fn encode_fields(&self, dst: &mut Vec<u8>);

    /// Read the fields written by [`Pickle::encode_fields`].
    fn decode_fields(reader: &mut Reader<'_>) -> Result<Self, PickleError>;

    /// Encrypt and authenticate the entity under `key`.
    fn pickle(&self, key: &[u8]) -> Vec<u8> {
        let mut fields = Zeroizing::new(Vec::new());
        self.encode_fields(&mut fields);
        seal(key, &fields)
    }

    /// Restore an entity from a blob produced by [`Pickle::pickle`].
    fn from_pickle(blob: &[u8], key: &[u8]) -> Result<Self, PickleError> {
        let fields = open(key, blob)?;
        let mut reader = Reader::new(&fields);
        let entity = Self::decode_fields(&mut reader)?;
        reader.finish()?;
        Ok(entity)
    }
}

/// Encrypt `fields` into a pickle blob.
pub fn seal(key: &[u8], fields: &[u8]) -> Vec<u8> {
    let keys = CipherKeys::derive(key, PICKLE_INFO);

    let mut blob = Vec::with_capacity(1 + fields.len() + MAC_SIZE);
    blob.push(PICKLE_VERSION);
    blob.extend_from_slice(&keys.encrypt(fields));

    let mac = keys.mac(&blob);
    blob.extend_from_slice(&mac);
    blob
}

/// Authenticate and decrypt a pickle blob back into its field bytes.
pub fn open(key: &[u8], blob: &[u8]) -> Result<Zeroizing<Vec<u8>>, PickleError> {
    let Some(body_len) = blob.len().checked_sub(MAC_SIZE).filter(|len| *len >= 1) else {
        return Err(ProtocolError::Truncated { expected: 1 + MAC_SIZE, actual: blob.len() }.into());
    };
    let (body, mac) = blob.split_at(body_len);

    let keys = CipherKeys::derive(key, PICKLE_INFO);
    if !keys.verify_mac(body, mac) {
        return Err(PickleError::BadMac);
    }

    let version = body[0];
    if version != PICKLE_VERSION {
        return Err(PickleError::UnsupportedVersion(version));
    }

    Ok(Zeroizing::new(keys.decrypt(&body[1..])))
}
