//! Sending half of a group session.

use quire_crypto::{Ed25519Keypair, Ed25519PublicKey, HashRatchet, RATCHET_LENGTH};
use quire_proto::{GroupMessage, GroupSessionBackup, SessionKey, codec::Reader};
use zeroize::Zeroizing;

use crate::{
    env::Environment,
    error::{EncryptionError, PickleError},
    pickle::Pickle,
};

/// Random bytes consumed by [`OutboundGroupSession::new`]: 128 for the
/// ratchet seed, 32 for the signing key.
pub const GROUP_SESSION_RANDOM_LENGTH: usize = RATCHET_LENGTH + 32;

/// Produces signed, encrypted messages from an ever-advancing hash ratchet.
///
/// # Invariants
///
/// - Forward Only: the ratchet advances exactly one step per encrypted
///   message and is never rewound.
/// - Unique Keys: no two messages are encrypted at the same index.
pub struct OutboundGroupSession {
    ratchet: HashRatchet,
    signing_key: Ed25519Keypair,
}

impl OutboundGroupSession {
    /// Create a session with a fresh ratchet and signing key at index 0.
    pub fn new(env: &impl Environment) -> Self {
        let random = Zeroizing::new(env.random_array::<GROUP_SESSION_RANDOM_LENGTH>());
        Self::from_random(&random)
    }

    /// Create a session from caller-supplied random bytes.
    ///
    /// The first 128 bytes seed the ratchet through HKDF; the last 32 are the
    /// Ed25519 seed.
    pub fn from_random(random: &[u8; GROUP_SESSION_RANDOM_LENGTH]) -> Self {
        let ratchet = HashRatchet::from_seed(&random[..RATCHET_LENGTH]);

        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&random[RATCHET_LENGTH..]);
        let signing_key = Ed25519Keypair::from_seed(&seed);

        let session = Self { ratchet, signing_key };
        tracing::debug!(session_id = ?session.session_id(), "created outbound group session");
        session
    }

    /// Restore an author backup, including the signing key.
    pub fn from_backup(backup: &GroupSessionBackup) -> Self {
        Self {
            ratchet: HashRatchet::from_bytes(&backup.ratchet, backup.message_index),
            signing_key: Ed25519Keypair::from_seed(&backup.signing_seed),
        }
    }

    /// Session identifier (the signing public key).
    pub fn session_id(&self) -> Ed25519PublicKey {
        self.signing_key.public_key()
    }

    /// Index the next message will be encrypted at.
    pub fn message_index(&self) -> u32 {
        self.ratchet.index()
    }

    /// Encrypt `plaintext` at the current index, then advance the ratchet.
    ///
    /// Fails without advancing if the plaintext is larger than a group
    /// message can carry, or if the ratchet has reached `u32::MAX`.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<GroupMessage, EncryptionError> {
        EncryptionError::check_size(plaintext)?;

        // The key at u32::MAX is never used so the ratchet index cannot wrap.
        if self.ratchet.index() == u32::MAX {
            tracing::warn!(session_id = ?self.session_id(), "group ratchet index exhausted");
            return Err(EncryptionError::IndexExhausted);
        }

        let keys = self.ratchet.cipher_keys();

        let mut message = GroupMessage::new(self.ratchet.index(), keys.encrypt(plaintext));
        message.mac = keys.truncated_mac(&message.mac_input());
        message.signature = self.signing_key.sign(&message.signature_input()).to_bytes();

        self.ratchet.advance();
        Ok(message)
    }

    /// Signed checkpoint at the current index, for recipients.
    ///
    /// Recipients can decrypt the next message encrypted and every one
    /// after it.
    pub fn session_key(&self) -> SessionKey {
        let mut session_key = SessionKey {
            message_index: self.ratchet.index(),
            ratchet: self.ratchet.to_bytes(),
            signing_key: self.session_id().to_bytes(),
            signature: [0u8; 64],
        };
        session_key.signature = self.signing_key.sign(&session_key.signature_input()).to_bytes();
        session_key
    }

    /// Author backup at `message_index`, including the private signing key.
    ///
    /// Returns `None` if `message_index` is below the current index, since
    /// the ratchet cannot move backwards. The backup must not be handed to
    /// recipients: it lets the holder forge messages.
    pub fn export_at(&self, message_index: u32) -> Option<GroupSessionBackup> {
        if message_index < self.ratchet.index() {
            return None;
        }

        let mut ratchet = self.ratchet.clone();
        ratchet.advance_to(message_index);

        Some(GroupSessionBackup {
            message_index,
            ratchet: ratchet.to_bytes(),
            signing_seed: *self.signing_key.seed(),
        })
    }
}

impl std::fmt::Debug for OutboundGroupSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundGroupSession")
            .field("session_id", &self.session_id())
            .field("message_index", &self.message_index())
            .finish_non_exhaustive()
    }
}

/// Field order: `message_index u32 | ratchet [128] | signing_seed [32]`.
impl Pickle for OutboundGroupSession {
    fn encode_fields(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(&self.ratchet.index().to_be_bytes());
        dst.extend_from_slice(&self.ratchet.to_bytes());
        dst.extend_from_slice(&self.signing_key.seed()[..]);
    }

    fn decode_fields(reader: &mut Reader<'_>) -> Result<Self, PickleError> {
        let message_index = reader.read_u32()?;
        let ratchet = Zeroizing::new(reader.read_array::<RATCHET_LENGTH>()?);
        let seed = Zeroizing::new(reader.read_array::<32>()?);

        Ok(Self {
            ratchet: HashRatchet::from_bytes(&ratchet, message_index),
            signing_key: Ed25519Keypair::from_seed(&seed),
        })
    }
}

#[cfg(test)]
mod tests {
    use quire_crypto::{Ed25519Signature, verify_signature};
    use quire_proto::MAX_CIPHERTEXT_SIZE;

    use super::*;
    use crate::env::testing::SeededEnv;

    #[test]
    fn new_session_starts_at_zero() {
        let session = OutboundGroupSession::new(&SeededEnv::new(1));
        assert_eq!(session.message_index(), 0);
    }

    #[test]
    fn encrypt_advances_index() {
        let mut session = OutboundGroupSession::new(&SeededEnv::new(1));

        let first = session.encrypt(b"one").unwrap();
        let second = session.encrypt(b"two").unwrap();

        assert_eq!(first.message_index, 0);
        assert_eq!(second.message_index, 1);
        assert_eq!(session.message_index(), 2);
    }

    #[test]
    fn same_plaintext_encrypts_differently_per_index() {
        let mut session = OutboundGroupSession::new(&SeededEnv::new(1));
        assert_ne!(session.encrypt(b"same").unwrap().ciphertext, session.encrypt(b"same").unwrap().ciphertext);
    }

    #[test]
    fn messages_are_signed_by_session_key() {
        let mut session = OutboundGroupSession::new(&SeededEnv::new(1));
        let message = session.encrypt(b"signed").unwrap();

        let signature = Ed25519Signature::from_bytes(message.signature);
        assert!(verify_signature(&session.session_id(), &message.signature_input(), &signature).is_ok());
    }

    #[test]
    fn session_key_tracks_index_and_is_signed() {
        let mut session = OutboundGroupSession::new(&SeededEnv::new(1));
        session.encrypt(b"x").unwrap();

        let key = session.session_key();
        assert_eq!(key.message_index, 1);
        assert_eq!(key.signing_key, session.session_id().to_bytes());

        let signature = Ed25519Signature::from_bytes(key.signature);
        assert!(verify_signature(&session.session_id(), &key.signature_input(), &signature).is_ok());
    }

    #[test]
    fn from_random_is_deterministic() {
        let random = [7u8; GROUP_SESSION_RANDOM_LENGTH];
        let mut a = OutboundGroupSession::from_random(&random);
        let mut b = OutboundGroupSession::from_random(&random);

        assert_eq!(a.session_id(), b.session_id());
        assert_eq!(a.encrypt(b"m").unwrap(), b.encrypt(b"m").unwrap());
    }

    #[test]
    fn export_at_rejects_past_indices() {
        let mut session = OutboundGroupSession::new(&SeededEnv::new(1));
        session.encrypt(b"x").unwrap();
        session.encrypt(b"y").unwrap();

        assert!(session.export_at(1).is_none());
        assert_eq!(session.export_at(2).map(|backup| backup.message_index), Some(2));
        assert_eq!(session.export_at(10).map(|backup| backup.message_index), Some(10));
    }

    #[test]
    fn backup_restores_sender() {
        let mut session = OutboundGroupSession::new(&SeededEnv::new(1));
        session.encrypt(b"x").unwrap();

        let Some(backup) = session.export_at(session.message_index()) else {
            unreachable!("current index is exportable");
        };
        let mut restored = OutboundGroupSession::from_backup(&backup);

        assert_eq!(restored.session_id(), session.session_id());
        assert_eq!(restored.encrypt(b"next").unwrap(), session.encrypt(b"next").unwrap());
    }

    #[test]
    fn plaintext_at_size_limit_encrypts() {
        let mut session = OutboundGroupSession::new(&SeededEnv::new(1));
        let message = session.encrypt(&vec![0u8; MAX_CIPHERTEXT_SIZE]).unwrap();

        assert_eq!(message.ciphertext.len(), MAX_CIPHERTEXT_SIZE);
        assert_eq!(GroupMessage::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn oversized_plaintext_is_rejected_without_advancing() {
        let mut session = OutboundGroupSession::new(&SeededEnv::new(1));

        assert_eq!(
            session.encrypt(&vec![0u8; MAX_CIPHERTEXT_SIZE + 1]),
            Err(EncryptionError::PlaintextTooLarge {
                size: MAX_CIPHERTEXT_SIZE + 1,
                max: MAX_CIPHERTEXT_SIZE,
            })
        );
        assert_eq!(session.message_index(), 0);
    }

    #[test]
    fn encrypt_stops_before_index_wraps() {
        let session = OutboundGroupSession::new(&SeededEnv::new(1));
        let Some(backup) = session.export_at(u32::MAX - 1) else {
            unreachable!("future index is exportable");
        };
        let mut session = OutboundGroupSession::from_backup(&backup);

        assert_eq!(session.encrypt(b"last").unwrap().message_index, u32::MAX - 1);
        assert_eq!(session.message_index(), u32::MAX);
        assert_eq!(session.encrypt(b"wraps"), Err(EncryptionError::IndexExhausted));
        assert_eq!(session.message_index(), u32::MAX);
    }

    #[test]
    fn pickle_round_trip_is_byte_identical() {
        let mut session = OutboundGroupSession::new(&SeededEnv::new(1));
        session.encrypt(b"x").unwrap();

        let blob = session.pickle(b"key");
        let mut restored = OutboundGroupSession::from_pickle(&blob, b"key").unwrap();

        assert_eq!(restored.pickle(b"key"), blob);
        assert_eq!(restored.message_index(), 1);
        assert_eq!(restored.encrypt(b"next").unwrap(), session.encrypt(b"next").unwrap());
    }
}
