//! Long-term identity and one-time key bookkeeping.
//!
//! An [`Account`] owns a Curve25519 identity key (key agreement), an Ed25519
//! signing key, and a pool of Curve25519 one-time keys that peers consume to
//! start pairwise sessions with us.
//!
//! # One-Time Key Lifecycle
//!
//! ```text
//! generate_one_time_keys ──▶ unpublished ──mark_keys_as_published──▶ published
//!                                 │                                      │
//!                                 └──────── create_inbound_session ──────┘
//!                                                    │
//!                                                    ▼
//!                                                 removed
//! ```
//!
//! The pool holds at most [`Account::MAX_ONE_TIME_KEYS`]; generating past
//! that evicts the oldest keys, published or not.

use std::collections::BTreeMap;

use quire_crypto::{
    Curve25519Keypair, Curve25519PublicKey, Ed25519Keypair, Ed25519PublicKey, Ed25519Signature,
};
use quire_proto::{
    OlmMessage, PreKeyMessage,
    codec::{Reader, put_bool, put_count},
};
use zeroize::Zeroizing;

use crate::{
    env::{Environment, generate_curve25519, generate_ed25519},
    error::{PickleError, SessionCreationError},
    pickle::Pickle,
    session::Session,
};

/// Locally assigned identifier of a one-time key.
///
/// Identifiers increase monotonically over the life of an account and are
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub u64);

/// Public halves of the account's long-term keys, for publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityKeys {
    /// Key agreement identity key
    pub curve25519: Curve25519PublicKey,
    /// Signing (fingerprint) key
    pub ed25519: Ed25519PublicKey,
}

#[derive(Clone)]
struct OneTimeKey {
    id: KeyId,
    keypair: Curve25519Keypair,
    published: bool,
}

/// Result of accepting a pre-key message.
#[derive(Debug)]
pub struct InboundCreationResult {
    /// The newly established session
    pub session: Session,
    /// Plaintext of the pre-key message that established it
    pub plaintext: Vec<u8>,
}

/// A device's long-term keys and its pool of one-time keys.
pub struct Account {
    identity_key: Curve25519Keypair,
    signing_key: Ed25519Keypair,
    /// Oldest first
    one_time_keys: Vec<OneTimeKey>,
    next_key_id: u64,
}

impl Account {
    /// Maximum number of one-time keys held at once
    pub const MAX_ONE_TIME_KEYS: usize = 100;

    /// Upper bound on one-time keys accepted from a pickle
    const MAX_PICKLED_ONE_TIME_KEYS: usize = 1 << 16;

    /// Create an account with fresh identity and signing keys and no
    /// one-time keys.
    pub fn new(env: &impl Environment) -> Self {
        let account = Self {
            identity_key: generate_curve25519(env),
            signing_key: generate_ed25519(env),
            one_time_keys: Vec::new(),
            next_key_id: 0,
        };

        tracing::debug!(identity_key = ?account.identity_key.public_key(), "created account");
        account
    }

    /// Public identity keys.
    pub fn identity_keys(&self) -> IdentityKeys {
        IdentityKeys {
            curve25519: self.identity_key.public_key(),
            ed25519: self.signing_key.public_key(),
        }
    }

    /// Sign `message` with the long-term Ed25519 key.
    ///
    /// Check with [`quire_crypto::verify_signature`].
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        self.signing_key.sign(message)
    }

    /// Maximum number of one-time keys the account holds at once.
    pub fn max_number_of_one_time_keys(&self) -> usize {
        Self::MAX_ONE_TIME_KEYS
    }

    /// Generate `count` new one-time keys, evicting the oldest if the pool
    /// would exceed [`Account::MAX_ONE_TIME_KEYS`].
    ///
    /// Returns the identifiers of the keys that were generated.
    pub fn generate_one_time_keys(&mut self, env: &impl Environment, count: usize) -> Vec<KeyId> {
        let mut generated = Vec::with_capacity(count);
        for _ in 0..count {
            let id = KeyId(self.next_key_id);
            self.next_key_id += 1;

            self.one_time_keys.push(OneTimeKey {
                id,
                keypair: generate_curve25519(env),
                published: false,
            });
            generated.push(id);
        }

        let excess = self.one_time_keys.len().saturating_sub(Self::MAX_ONE_TIME_KEYS);
        if excess > 0 {
            self.one_time_keys.drain(..excess);
            tracing::debug!(evicted = excess, "evicted oldest one-time keys");
        }

        generated
    }

    /// Public halves of the one-time keys not yet published.
    pub fn one_time_keys(&self) -> BTreeMap<KeyId, Curve25519PublicKey> {
        self.one_time_keys
            .iter()
            .filter(|key| !key.published)
            .map(|key| (key.id, key.keypair.public_key()))
            .collect()
    }

    /// Mark every current one-time key as published.
    pub fn mark_keys_as_published(&mut self) {
        for key in &mut self.one_time_keys {
            key.published = true;
        }
    }

    /// Remove the one-time key with public half `public_key`.
    pub fn remove_one_time_key(&mut self, public_key: &Curve25519PublicKey) -> Option<KeyId> {
        let position =
            self.one_time_keys.iter().position(|key| key.keypair.public_key() == *public_key)?;
        Some(self.one_time_keys.remove(position).id)
    }

    /// Remove the one-time key `session` was established with.
    pub fn remove_one_time_keys(&mut self, session: &Session) -> Option<KeyId> {
        self.remove_one_time_key(&session.session_keys().one_time_key)
    }

    /// Start a session to a peer using one of their published one-time keys.
    pub fn create_outbound_session(
        &self,
        env: &impl Environment,
        their_identity_key: Curve25519PublicKey,
        their_one_time_key: Curve25519PublicKey,
    ) -> Session {
        Session::new_outbound(env, &self.identity_key, their_identity_key, their_one_time_key)
    }

    /// Accept a pre-key message, establishing the session it started.
    ///
    /// When `their_identity_key` is given, the pre-key message must come from
    /// that identity. The one-time key the message names is removed only if
    /// the embedded message decrypts.
    pub fn create_inbound_session(
        &mut self,
        their_identity_key: Option<&Curve25519PublicKey>,
        pre_key: &PreKeyMessage,
    ) -> Result<InboundCreationResult, SessionCreationError> {
        if let Some(expected) = their_identity_key
            && *expected.as_bytes() != pre_key.identity_key
        {
            return Err(SessionCreationError::MismatchedIdentityKey);
        }

        let one_time_key = Curve25519PublicKey::from_bytes(pre_key.one_time_key);
        let Some(key) = self.one_time_keys.iter().find(|key| key.keypair.public_key() == one_time_key)
        else {
            tracing::warn!(one_time_key = ?one_time_key, "pre-key message names unknown one-time key");
            return Err(SessionCreationError::MissingOneTimeKey);
        };

        let mut session = Session::new_inbound(&self.identity_key, &key.keypair, pre_key);
        let plaintext = session.decrypt(&OlmMessage::PreKey(pre_key.clone()))?;

        self.remove_one_time_key(&one_time_key);
        Ok(InboundCreationResult { session, plaintext })
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("identity_keys", &self.identity_keys())
            .field("one_time_keys", &self.one_time_keys.len())
            .finish_non_exhaustive()
    }
}

/// Field order:
///
/// ```text
/// identity_secret [32] | signing_seed [32] | next_key_id u64
/// key_count u32 (key_id u64 | published u8 | secret [32])*
/// ```
impl Pickle for Account {
    fn encode_fields(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(&self.identity_key.secret_key().to_bytes()[..]);
        dst.extend_from_slice(&self.signing_key.seed()[..]);
        dst.extend_from_slice(&self.next_key_id.to_be_bytes());

        put_count(dst, self.one_time_keys.len());
        for key in &self.one_time_keys {
            dst.extend_from_slice(&key.id.0.to_be_bytes());
            put_bool(dst, key.published);
            dst.extend_from_slice(&key.keypair.secret_key().to_bytes()[..]);
        }
    }

    fn decode_fields(reader: &mut Reader<'_>) -> Result<Self, PickleError> {
        let identity_secret = Zeroizing::new(reader.read_array::<32>()?);
        let signing_seed = Zeroizing::new(reader.read_array::<32>()?);
        let next_key_id = reader.read_u64()?;

        let mut one_time_keys = Vec::new();
        for _ in 0..reader.read_count(Self::MAX_PICKLED_ONE_TIME_KEYS)? {
            let id = KeyId(reader.read_u64()?);
            let published = reader.read_bool()?;
            let secret = Zeroizing::new(reader.read_array::<32>()?);

            if id.0 >= next_key_id {
                return Err(PickleError::InvalidState("one-time key id not below next id"));
            }
            one_time_keys.push(OneTimeKey {
                id,
                keypair: Curve25519Keypair::from_secret_bytes(*secret),
                published,
            });
        }

        Ok(Self {
            identity_key: Curve25519Keypair::from_secret_bytes(*identity_secret),
            signing_key: Ed25519Keypair::from_seed(&signing_seed),
            one_time_keys,
            next_key_id,
        })
    }
}
