//! Receiving half of a group session.
//!
//! # Retention
//!
//! The session keeps two ratchets: the one it was created with (the first
//! known index) and the one at the highest index it has decrypted. Any
//! message at or above the first known index stays decryptable regardless
//! of delivery order; indices below it are unrecoverable.

use quire_crypto::{Ed25519PublicKey, Ed25519Signature, HashRatchet, RATCHET_LENGTH};
use quire_proto::{
    ExportedSessionKey, GroupMessage, SessionKey,
    codec::{Reader, put_bool},
};
use zeroize::Zeroizing;

use crate::{
    error::{GroupDecryptionError, PickleError, SessionKeyError},
    pickle::Pickle,
};

/// Plaintext of a group message and the index it was sent at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedGroupMessage {
    /// Decrypted payload
    pub plaintext: Vec<u8>,
    /// Ratchet index the sender encrypted at
    pub message_index: u32,
}

/// Verifies and decrypts messages from one [`OutboundGroupSession`].
///
/// [`OutboundGroupSession`]: super::OutboundGroupSession
pub struct InboundGroupSession {
    initial_ratchet: HashRatchet,
    latest_ratchet: HashRatchet,
    signing_key: Ed25519PublicKey,
    verified: bool,
}

impl InboundGroupSession {
    /// Create a session from a signed checkpoint.
    ///
    /// The checkpoint must carry a valid signature by its own signing key.
    /// The resulting session is marked verified.
    pub fn new(session_key: &SessionKey) -> Result<Self, SessionKeyError> {
        let signing_key = Ed25519PublicKey::from_bytes(&session_key.signing_key)?;
        let signature = Ed25519Signature::from_bytes(session_key.signature);

        if signing_key.verify(&session_key.signature_input(), &signature).is_err() {
            tracing::warn!(session_id = ?signing_key, "session key signature mismatch");
            return Err(SessionKeyError::BadSignature);
        }

        let session = Self::from_parts(&session_key.ratchet, session_key.message_index, signing_key, true);
        tracing::debug!(
            session_id = ?signing_key,
            first_known_index = session_key.message_index,
            "created inbound group session"
        );
        Ok(session)
    }

    /// Create a session from an unsigned export.
    ///
    /// Nothing binds the export to its claimed sender, so the session starts
    /// unverified until a message signed by that key decrypts.
    pub fn import(exported: &ExportedSessionKey) -> Result<Self, SessionKeyError> {
        let signing_key = Ed25519PublicKey::from_bytes(&exported.signing_key)?;

        let session = Self::from_parts(&exported.ratchet, exported.message_index, signing_key, false);
        tracing::debug!(
            session_id = ?signing_key,
            first_known_index = exported.message_index,
            "imported inbound group session"
        );
        Ok(session)
    }

    /// Decode a signed checkpoint received as bytes and create a session
    /// from it.
    pub fn from_session_key_bytes(bytes: &[u8]) -> Result<Self, SessionKeyError> {
        Self::new(&SessionKey::decode(bytes)?)
    }

    fn from_parts(
        ratchet: &[u8; RATCHET_LENGTH],
        message_index: u32,
        signing_key: Ed25519PublicKey,
        verified: bool,
    ) -> Self {
        let ratchet = HashRatchet::from_bytes(ratchet, message_index);
        Self { latest_ratchet: ratchet.clone(), initial_ratchet: ratchet, signing_key, verified }
    }

    /// Session identifier (the sender's signing public key).
    pub fn session_id(&self) -> Ed25519PublicKey {
        self.signing_key
    }

    /// Lowest message index this session can decrypt.
    pub fn first_known_index(&self) -> u32 {
        self.initial_ratchet.index()
    }

    /// Whether the session's provenance is authenticated.
    ///
    /// True when created from a signed [`SessionKey`] or after any message
    /// has decrypted. This is informational; decryption never depends on it.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Verify and decrypt a group message.
    ///
    /// Checks run in order: signature, index, MAC. State changes only after
    /// all three pass.
    pub fn decrypt(
        &mut self,
        message: &GroupMessage,
    ) -> Result<DecryptedGroupMessage, GroupDecryptionError> {
        let signature = Ed25519Signature::from_bytes(message.signature);
        if self.signing_key.verify(&message.signature_input(), &signature).is_err() {
            tracing::warn!(
                session_id = ?self.signing_key,
                message_index = message.message_index,
                "group message signature mismatch"
            );
            return Err(GroupDecryptionError::BadSignature);
        }

        let Some(ratchet) = self.ratchet_at(message.message_index) else {
            return Err(GroupDecryptionError::UnknownMessageIndex {
                first_known: self.first_known_index(),
                requested: message.message_index,
            });
        };

        let keys = ratchet.cipher_keys();
        if !keys.verify_mac(&message.mac_input(), &message.mac) {
            return Err(GroupDecryptionError::BadMac);
        }
        let plaintext = keys.decrypt(&message.ciphertext);

        if ratchet.index() > self.latest_ratchet.index() {
            self.latest_ratchet = ratchet;
        }
        self.verified = true;

        Ok(DecryptedGroupMessage { plaintext, message_index: message.message_index })
    }

    /// Decode and decrypt a group message received as bytes.
    ///
    /// Undecodable input is [`GroupDecryptionError::Malformed`] and leaves
    /// the session unchanged.
    pub fn decrypt_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<DecryptedGroupMessage, GroupDecryptionError> {
        let message = GroupMessage::decode(bytes)?;
        self.decrypt(&message)
    }

    /// Unsigned export at `message_index`.
    ///
    /// Returns `None` if `message_index` is below the first known index.
    pub fn export_at(&self, message_index: u32) -> Option<ExportedSessionKey> {
        let ratchet = self.ratchet_at(message_index)?;
        Some(ExportedSessionKey {
            message_index,
            ratchet: ratchet.to_bytes(),
            signing_key: self.signing_key.to_bytes(),
        })
    }

    /// Unsigned export at the first known index.
    pub fn export_at_first_known_index(&self) -> ExportedSessionKey {
        ExportedSessionKey {
            message_index: self.initial_ratchet.index(),
            ratchet: self.initial_ratchet.to_bytes(),
            signing_key: self.signing_key.to_bytes(),
        }
    }

    /// Ratchet advanced to `index`, starting from the closest retained state.
    fn ratchet_at(&self, index: u32) -> Option<HashRatchet> {
        if index < self.initial_ratchet.index() {
            return None;
        }

        let mut ratchet = if index >= self.latest_ratchet.index() {
            self.latest_ratchet.clone()
        } else {
            self.initial_ratchet.clone()
        };
        ratchet.advance_to(index);
        Some(ratchet)
    }
}

impl std::fmt::Debug for InboundGroupSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundGroupSession")
            .field("session_id", &self.signing_key)
            .field("first_known_index", &self.first_known_index())
            .field("latest_index", &self.latest_ratchet.index())
            .field("verified", &self.verified)
            .finish_non_exhaustive()
    }
}

/// Field order: `initial_index u32 | initial [128] | latest_index u32 |
/// latest [128] | signing_key [32] | verified u8`.
impl Pickle for InboundGroupSession {
    fn encode_fields(&self, dst: &mut Vec<u8>) {
        for ratchet in [&self.initial_ratchet, &self.latest_ratchet] {
            dst.extend_from_slice(&ratchet.index().to_be_bytes());
            dst.extend_from_slice(&ratchet.to_bytes());
        }
        dst.extend_from_slice(self.signing_key.as_bytes());
        put_bool(dst, self.verified);
    }

    fn decode_fields(reader: &mut Reader<'_>) -> Result<Self, PickleError> {
        let initial_index = reader.read_u32()?;
        let initial = Zeroizing::new(reader.read_array::<RATCHET_LENGTH>()?);
        let latest_index = reader.read_u32()?;
        let latest = Zeroizing::new(reader.read_array::<RATCHET_LENGTH>()?);
        let signing_key = Ed25519PublicKey::from_bytes(&reader.read_array::<32>()?)?;
        let verified = reader.read_bool()?;

        if latest_index < initial_index {
            return Err(PickleError::InvalidState("latest ratchet precedes initial ratchet"));
        }

        Ok(Self {
            initial_ratchet: HashRatchet::from_bytes(&initial, initial_index),
            latest_ratchet: HashRatchet::from_bytes(&latest, latest_index),
            signing_key,
            verified,
        })
    }
}
