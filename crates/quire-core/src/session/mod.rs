//! Pairwise double-ratchet session.
//!
//! A session is created by [`Account::create_outbound_session`] on the
//! initiating side and [`Account::create_inbound_session`] on the responding
//! side. From then on both sides call [`Session::encrypt`] and
//! [`Session::decrypt`].
//!
//! # Ratchets
//!
//! - Symmetric: every message consumes one step of a chain key
//!   (`message_key = HMAC(chain, 0x01)`, `chain' = HMAC(chain, 0x02)`).
//! - Asymmetric: when a message arrives under a ratchet key we have not seen,
//!   a DH between our current ratchet key and theirs replaces the root key
//!   and starts a new receiver chain. The next message we send starts a new
//!   sender chain with a fresh ratchet key.
//!
//! # Invariants
//!
//! - Failure Atomicity: a decrypt that fails (bad MAC, replay, excessive
//!   skip) leaves the session unchanged. Chains are advanced on copies and
//!   only committed once the MAC verifies.
//! - Monotonic Chains: chain indices only increase.
//! - Single Use: a skipped message key is removed when it is used.
//! - Bounded State: skipped keys and receiver chains are capped by
//!   [`RatchetConfig`], oldest entries evicted first.
//!
//! # Concurrency
//!
//! A session is a plain value. Callers sharing one across threads must
//! serialize every operation on it.
//!
//! [`Account::create_outbound_session`]: crate::Account::create_outbound_session
//! [`Account::create_inbound_session`]: crate::Account::create_inbound_session

mod chains;
mod shared_secret;

use std::{collections::VecDeque, fmt};

use chains::{ReceiverChain, RootKey, SenderChain, SkippedMessageKey};
use quire_crypto::{ChainKey, Curve25519Keypair, Curve25519PublicKey, MessageKey, sha256};
use quire_proto::{
    Message, MessageType, OlmMessage, PreKeyMessage,
    codec::{Reader, put_bool, put_count},
};
use zeroize::Zeroizing;

use crate::{
    config::RatchetConfig,
    env::{Environment, generate_curve25519},
    error::{DecryptionError, EncryptionError, PickleError},
    pickle::Pickle,
};

/// Upper bound on chain entries accepted from a pickle
const MAX_PICKLED_ENTRIES: usize = 1 << 16;

/// The public keys a session was established with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionKeys {
    /// Initiator's long-term identity key
    pub identity_key: Curve25519PublicKey,
    /// Initiator's ephemeral base key
    pub base_key: Curve25519PublicKey,
    /// Responder's one-time key the initiator picked
    pub one_time_key: Curve25519PublicKey,
}

impl SessionKeys {
    /// `SHA-256(identity_key | base_key | one_time_key)`.
    pub fn session_id(&self) -> SessionId {
        let mut input = [0u8; 96];
        input[..32].copy_from_slice(self.identity_key.as_bytes());
        input[32..64].copy_from_slice(self.base_key.as_bytes());
        input[64..].copy_from_slice(self.one_time_key.as_bytes());
        SessionId(sha256(&input))
    }
}

/// Stable identifier of a pairwise session, equal on both sides.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId([u8; 32]);

impl SessionId {
    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({self})")
    }
}

/// One end of a pairwise conversation.
pub struct Session {
    session_keys: SessionKeys,
    /// Set once any message from the peer has decrypted. Until then we keep
    /// sending pre-key messages.
    received_message: bool,
    root_key: RootKey,
    sender_chain: Option<SenderChain>,
    /// Newest first
    receiver_chains: VecDeque<ReceiverChain>,
    /// Oldest first
    skipped_keys: VecDeque<SkippedMessageKey>,
    config: RatchetConfig,
}

impl Session {
    pub(crate) fn new_outbound(
        env: &impl Environment,
        identity_key: &Curve25519Keypair,
        their_identity_key: Curve25519PublicKey,
        their_one_time_key: Curve25519PublicKey,
    ) -> Self {
        let base_key = generate_curve25519(env);
        let ratchet_key = generate_curve25519(env);

        let (root_key, chain_key) = shared_secret::outbound(
            identity_key,
            &base_key,
            &their_identity_key,
            &their_one_time_key,
        );

        let session = Self {
            session_keys: SessionKeys {
                identity_key: identity_key.public_key(),
                base_key: base_key.public_key(),
                one_time_key: their_one_time_key,
            },
            received_message: false,
            root_key,
            sender_chain: Some(SenderChain { ratchet_key, chain_key }),
            receiver_chains: VecDeque::new(),
            skipped_keys: VecDeque::new(),
            config: RatchetConfig::default(),
        };

        tracing::debug!(session_id = %session.session_id(), "created outbound session");
        session
    }

    pub(crate) fn new_inbound(
        identity_key: &Curve25519Keypair,
        one_time_key: &Curve25519Keypair,
        pre_key: &PreKeyMessage,
    ) -> Self {
        let their_identity_key = Curve25519PublicKey::from_bytes(pre_key.identity_key);
        let their_base_key = Curve25519PublicKey::from_bytes(pre_key.base_key);
        let their_ratchet_key = Curve25519PublicKey::from_bytes(pre_key.message.ratchet_key);

        let (root_key, chain_key) = shared_secret::inbound(
            identity_key,
            one_time_key,
            &their_identity_key,
            &their_base_key,
        );

        let mut receiver_chains = VecDeque::new();
        receiver_chains.push_front(ReceiverChain { ratchet_key: their_ratchet_key, chain_key });

        let session = Self {
            session_keys: SessionKeys {
                identity_key: their_identity_key,
                base_key: their_base_key,
                one_time_key: one_time_key.public_key(),
            },
            received_message: false,
            root_key,
            sender_chain: None,
            receiver_chains,
            skipped_keys: VecDeque::new(),
            config: RatchetConfig::default(),
        };

        tracing::debug!(session_id = %session.session_id(), "created inbound session");
        session
    }

    /// Replace the resource bounds.
    #[must_use]
    pub fn with_config(mut self, config: RatchetConfig) -> Self {
        self.config = config;
        self
    }

    /// Current resource bounds.
    pub fn config(&self) -> &RatchetConfig {
        &self.config
    }

    /// Stable identifier, identical on both ends.
    pub fn session_id(&self) -> SessionId {
        self.session_keys.session_id()
    }

    /// The keys this session was established with.
    pub fn session_keys(&self) -> &SessionKeys {
        &self.session_keys
    }

    /// Whether any message from the peer has decrypted yet.
    pub fn has_received_message(&self) -> bool {
        self.received_message
    }

    /// Whether `pre_key` was produced by the initiator of this session.
    ///
    /// Lets a responder tell a retransmitted establishment message from a new
    /// session attempt.
    pub fn matches_inbound_session(&self, pre_key: &PreKeyMessage) -> bool {
        *self.session_keys.identity_key.as_bytes() == pre_key.identity_key
            && *self.session_keys.base_key.as_bytes() == pre_key.base_key
            && *self.session_keys.one_time_key.as_bytes() == pre_key.one_time_key
    }

    /// Like [`Session::matches_inbound_session`], additionally requiring the
    /// pre-key message to come from `their_identity_key`.
    pub fn matches_inbound_session_from(
        &self,
        their_identity_key: &Curve25519PublicKey,
        pre_key: &PreKeyMessage,
    ) -> bool {
        *their_identity_key.as_bytes() == pre_key.identity_key
            && self.matches_inbound_session(pre_key)
    }

    /// Encrypt `plaintext` with the next sender message key.
    ///
    /// Returns a pre-key message until the peer has replied, a normal message
    /// afterwards. Draws randomness only when a new sender chain is needed.
    /// On error the session is unchanged.
    pub fn encrypt(
        &mut self,
        env: &impl Environment,
        plaintext: &[u8],
    ) -> Result<OlmMessage, EncryptionError> {
        EncryptionError::check_size(plaintext)?;

        if self.sender_chain.is_none() {
            self.create_sender_chain(env);
        }
        let Some(sender_chain) = self.sender_chain.as_mut() else {
            unreachable!("sender chain was created above");
        };
        // The key at u32::MAX is never used so the chain index cannot wrap.
        if sender_chain.chain_key.index() == u32::MAX {
            tracing::warn!(
                session_id = %self.session_keys.session_id(),
                "sender chain index exhausted"
            );
            return Err(EncryptionError::IndexExhausted);
        }

        let message_key = sender_chain.chain_key.create_message_key();
        sender_chain.chain_key.advance();

        let keys = message_key.cipher_keys();
        let mut message = Message::new(
            sender_chain.ratchet_key.public_key().to_bytes(),
            message_key.index(),
            keys.encrypt(plaintext),
        );
        message.mac = keys.truncated_mac(&message.mac_input());

        if self.received_message {
            Ok(OlmMessage::Normal(message))
        } else {
            Ok(OlmMessage::PreKey(PreKeyMessage {
                one_time_key: self.session_keys.one_time_key.to_bytes(),
                base_key: self.session_keys.base_key.to_bytes(),
                identity_key: self.session_keys.identity_key.to_bytes(),
                message,
            }))
        }
    }

    /// Decrypt a message from the peer.
    ///
    /// On failure the session is left unchanged.
    pub fn decrypt(&mut self, message: &OlmMessage) -> Result<Vec<u8>, DecryptionError> {
        let message = message.message();
        let ratchet_key = Curve25519PublicKey::from_bytes(message.ratchet_key);

        let plaintext =
            match self.receiver_chains.iter().position(|chain| chain.ratchet_key == ratchet_key) {
                Some(position) => self.decrypt_on_chain(position, message)?,
                None => self.decrypt_on_new_chain(ratchet_key, message)?,
            };

        self.received_message = true;
        Ok(plaintext)
    }

    /// Decode and decrypt a message received as bytes.
    ///
    /// `message_type` is the tag the transport carried next to the bytes.
    /// Undecodable input is [`DecryptionError::Malformed`] and leaves the
    /// session unchanged.
    pub fn decrypt_bytes(
        &mut self,
        message_type: MessageType,
        bytes: &[u8],
    ) -> Result<Vec<u8>, DecryptionError> {
        let message = OlmMessage::decode(message_type, bytes)?;
        self.decrypt(&message)
    }

    fn create_sender_chain(&mut self, env: &impl Environment) {
        let Some(their_ratchet_key) = self.receiver_chains.front().map(|chain| chain.ratchet_key)
        else {
            unreachable!("a session without a sender chain always has a receiver chain");
        };

        let ratchet_key = generate_curve25519(env);
        let (root_key, chain_key) = self.root_key.advance(&ratchet_key, &their_ratchet_key);

        self.root_key = root_key;
        self.sender_chain = Some(SenderChain { ratchet_key, chain_key });

        tracing::debug!(session_id = %self.session_id(), "advanced sending ratchet");
    }

    fn decrypt_on_chain(
        &mut self,
        position: usize,
        message: &Message,
    ) -> Result<Vec<u8>, DecryptionError> {
        let chain = &self.receiver_chains[position];
        let ratchet_key = chain.ratchet_key;
        if message.chain_index < chain.chain_key.index() {
            return self.decrypt_with_skipped_key(ratchet_key, message);
        }

        let mut chain_key = chain.chain_key.clone();
        let (message_key, skipped) = self.walk_chain(&mut chain_key, ratchet_key, message)?;
        let plaintext = decrypt_with(&message_key, message)?;

        self.receiver_chains[position].chain_key = chain_key;
        self.store_skipped_keys(skipped);
        Ok(plaintext)
    }

    fn decrypt_on_new_chain(
        &mut self,
        ratchet_key: Curve25519PublicKey,
        message: &Message,
    ) -> Result<Vec<u8>, DecryptionError> {
        let Some(sender_chain) = &self.sender_chain else {
            return Err(DecryptionError::MissingSenderChain);
        };

        let (root_key, mut chain_key) = self.root_key.advance(&sender_chain.ratchet_key, &ratchet_key);
        let (message_key, skipped) = self.walk_chain(&mut chain_key, ratchet_key, message)?;
        let plaintext = decrypt_with(&message_key, message)?;

        self.root_key = root_key;
        self.sender_chain = None;
        self.receiver_chains.push_front(ReceiverChain { ratchet_key, chain_key });
        if self.receiver_chains.len() > self.config.max_receiver_chains() {
            self.receiver_chains.truncate(self.config.max_receiver_chains());
            tracing::debug!(session_id = %self.session_id(), "dropped oldest receiver chain");
        }
        self.store_skipped_keys(skipped);

        tracing::debug!(
            session_id = %self.session_id(),
            receiver_chains = self.receiver_chains.len(),
            "advanced receiving ratchet"
        );
        Ok(plaintext)
    }

    fn decrypt_with_skipped_key(
        &mut self,
        ratchet_key: Curve25519PublicKey,
        message: &Message,
    ) -> Result<Vec<u8>, DecryptionError> {
        let index = message.chain_index;
        let Some(position) =
            self.skipped_keys.iter().position(|skipped| skipped.matches(&ratchet_key, index))
        else {
            return Err(DecryptionError::UnknownMessageIndex { index });
        };

        let plaintext = decrypt_with(&self.skipped_keys[position].message_key, message)?;
        self.skipped_keys.remove(position);
        Ok(plaintext)
    }

    /// Advance `chain_key` to the message index, returning the message key
    /// and every key walked past.
    fn walk_chain(
        &self,
        chain_key: &mut ChainKey,
        ratchet_key: Curve25519PublicKey,
        message: &Message,
    ) -> Result<(MessageKey, Vec<SkippedMessageKey>), DecryptionError> {
        let target = message.chain_index;
        let gap = target - chain_key.index();
        if gap > self.config.max_message_gap() {
            return Err(DecryptionError::MessageSkipTooFar {
                gap,
                max: self.config.max_message_gap(),
            });
        }

        let mut skipped = Vec::new();
        while chain_key.index() < target {
            skipped.push(SkippedMessageKey { ratchet_key, message_key: chain_key.create_message_key() });
            chain_key.advance();
        }

        let message_key = chain_key.create_message_key();
        chain_key.advance();
        Ok((message_key, skipped))
    }

    fn store_skipped_keys(&mut self, skipped: Vec<SkippedMessageKey>) {
        self.skipped_keys.extend(skipped);

        let excess = self.skipped_keys.len().saturating_sub(self.config.max_skipped_message_keys());
        if excess > 0 {
            self.skipped_keys.drain(..excess);
            tracing::debug!(
                session_id = %self.session_id(),
                evicted = excess,
                "evicted oldest skipped message keys"
            );
        }
    }
}

fn decrypt_with(message_key: &MessageKey, message: &Message) -> Result<Vec<u8>, DecryptionError> {
    let keys = message_key.cipher_keys();
    if !keys.verify_mac(&message.mac_input(), &message.mac) {
        return Err(DecryptionError::BadMac);
    }
    Ok(keys.decrypt(&message.ciphertext))
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id())
            .field("received_message", &self.received_message)
            .field(
                "sender_chain_index",
                &self.sender_chain.as_ref().map(|chain| chain.chain_key.index()),
            )
            .field("receiver_chains", &self.receiver_chains.len())
            .field("skipped_keys", &self.skipped_keys.len())
            .finish_non_exhaustive()
    }
}

/// Field order:
///
/// ```text
/// identity_key [32] | base_key [32] | one_time_key [32] | received_message u8
/// root_key [32]
/// has_sender_chain u8 [ratchet_secret [32] | chain_key [32] | index u32]
/// receiver_count u32 (ratchet_key [32] | chain_key [32] | index u32)*
/// skipped_count u32 (ratchet_key [32] | index u32 | message_key [32])*
/// ```
impl Pickle for Session {
    fn encode_fields(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(self.session_keys.identity_key.as_bytes());
        dst.extend_from_slice(self.session_keys.base_key.as_bytes());
        dst.extend_from_slice(self.session_keys.one_time_key.as_bytes());
        put_bool(dst, self.received_message);
        dst.extend_from_slice(self.root_key.as_bytes());

        put_bool(dst, self.sender_chain.is_some());
        if let Some(chain) = &self.sender_chain {
            dst.extend_from_slice(&chain.ratchet_key.secret_key().to_bytes()[..]);
            dst.extend_from_slice(chain.chain_key.as_bytes());
            dst.extend_from_slice(&chain.chain_key.index().to_be_bytes());
        }

        put_count(dst, self.receiver_chains.len());
        for chain in &self.receiver_chains {
            dst.extend_from_slice(chain.ratchet_key.as_bytes());
            dst.extend_from_slice(chain.chain_key.as_bytes());
            dst.extend_from_slice(&chain.chain_key.index().to_be_bytes());
        }

        put_count(dst, self.skipped_keys.len());
        for skipped in &self.skipped_keys {
            dst.extend_from_slice(skipped.ratchet_key.as_bytes());
            dst.extend_from_slice(&skipped.message_key.index().to_be_bytes());
            dst.extend_from_slice(skipped.message_key.key());
        }
    }

    fn decode_fields(reader: &mut Reader<'_>) -> Result<Self, PickleError> {
        let session_keys = SessionKeys {
            identity_key: Curve25519PublicKey::from_bytes(reader.read_array()?),
            base_key: Curve25519PublicKey::from_bytes(reader.read_array()?),
            one_time_key: Curve25519PublicKey::from_bytes(reader.read_array()?),
        };
        let received_message = reader.read_bool()?;
        let root_key = RootKey::new(*Zeroizing::new(reader.read_array::<32>()?));

        let sender_chain = if reader.read_bool()? {
            let secret = Zeroizing::new(reader.read_array::<32>()?);
            let chain = Zeroizing::new(reader.read_array::<32>()?);
            let index = reader.read_u32()?;
            Some(SenderChain {
                ratchet_key: Curve25519Keypair::from_secret_bytes(*secret),
                chain_key: ChainKey::with_index(*chain, index),
            })
        } else {
            None
        };

        let mut receiver_chains = VecDeque::new();
        for _ in 0..reader.read_count(MAX_PICKLED_ENTRIES)? {
            let ratchet_key = Curve25519PublicKey::from_bytes(reader.read_array()?);
            let chain = Zeroizing::new(reader.read_array::<32>()?);
            let index = reader.read_u32()?;
            receiver_chains.push_back(ReceiverChain {
                ratchet_key,
                chain_key: ChainKey::with_index(*chain, index),
            });
        }

        let mut skipped_keys = VecDeque::new();
        for _ in 0..reader.read_count(MAX_PICKLED_ENTRIES)? {
            let ratchet_key = Curve25519PublicKey::from_bytes(reader.read_array()?);
            let index = reader.read_u32()?;
            let key = Zeroizing::new(reader.read_array::<32>()?);
            skipped_keys.push_back(SkippedMessageKey {
                ratchet_key,
                message_key: MessageKey::new(*key, index),
            });
        }

        if sender_chain.is_none() && receiver_chains.is_empty() {
            return Err(PickleError::InvalidState("session has neither sender nor receiver chain"));
        }

        Ok(Self {
            session_keys,
            received_message,
            root_key,
            sender_chain,
            receiver_chains,
            skipped_keys,
            config: RatchetConfig::default(),
        })
    }
}
