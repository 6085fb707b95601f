//! Pairwise ratchet messages.
//!
//! Two shapes travel between the parties of a pairwise session:
//!
//! ```text
//! Message (normal)
//! ┌─────────┬──────────────┬─────────────┬──────────┬────────────┬─────────┐
//! │ version │ ratchet_key  │ chain_index │ ct_len   │ ciphertext │ mac     │
//! │ 1 byte  │ 32 bytes     │ u32 BE      │ u32 BE   │ ct_len     │ 8 bytes │
//! └─────────┴──────────────┴─────────────┴──────────┴────────────┴─────────┘
//!
//! PreKeyMessage (session establishment)
//! ┌─────────┬──────────────┬──────────┬──────────────┬─────────┬─────────┐
//! │ version │ one_time_key │ base_key │ identity_key │ msg_len │ Message │
//! │ 1 byte  │ 32 bytes     │ 32 bytes │ 32 bytes     │ u32 BE  │ msg_len │
//! └─────────┴──────────────┴──────────┴──────────────┴─────────┴─────────┘
//! ```
//!
//! The MAC covers every byte before it. Parsing does not verify it; the
//! session that owns the chain key does.

use bytes::{BufMut, Bytes};

use crate::{
    codec::{Reader, put_length_prefixed},
    errors::Result,
};

/// Version byte of pairwise messages
pub const PAIRWISE_VERSION: u8 = 0x03;

/// Truncated MAC length carried by pairwise messages
pub const MESSAGE_MAC_SIZE: usize = 8;

/// Maximum ciphertext carried by one message (16 MB)
pub const MAX_CIPHERTEXT_SIZE: usize = 16 * 1024 * 1024;

/// Public key length used throughout the pairwise formats
const KEY_SIZE: usize = 32;

/// Maximum encoded normal message carried inside a pre-key message
const MAX_INNER_MESSAGE_SIZE: usize = 1 + KEY_SIZE + 4 + 4 + MAX_CIPHERTEXT_SIZE + MESSAGE_MAC_SIZE;

/// A normal pairwise message.
///
/// # Invariants
///
/// - Canonical: `Message::decode(&m.encode()) == m` and the decoder rejects
///   trailing bytes, so [`Message::mac_input`] reproduces exactly the bytes
///   the sender authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sender's current ratchet public key
    pub ratchet_key: [u8; KEY_SIZE],
    /// Index of the message key in the sender's chain
    pub chain_index: u32,
    /// AES-256-CTR ciphertext
    pub ciphertext: Bytes,
    /// Truncated HMAC-SHA-256 over [`Message::mac_input`]
    pub mac: [u8; MESSAGE_MAC_SIZE],
}

impl Message {
    /// Build a message with an all-zero MAC, to be filled by the sender.
    pub fn new(ratchet_key: [u8; KEY_SIZE], chain_index: u32, ciphertext: impl Into<Bytes>) -> Self {
        Self {
            ratchet_key,
            chain_index,
            ciphertext: ciphertext.into(),
            mac: [0u8; MESSAGE_MAC_SIZE],
        }
    }

    /// The authenticated prefix: everything except the MAC.
    pub fn mac_input(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + KEY_SIZE + 8 + self.ciphertext.len());
        out.put_u8(PAIRWISE_VERSION);
        out.put_slice(&self.ratchet_key);
        out.put_u32(self.chain_index);
        put_length_prefixed(&mut out, &self.ciphertext);
        out
    }

    /// Full wire encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.mac_input();
        out.put_slice(&self.mac);
        out
    }

    /// Parse a message without verifying its MAC.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let message = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(message)
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self> {
        reader.read_version(PAIRWISE_VERSION)?;
        let ratchet_key = reader.read_array()?;
        let chain_index = reader.read_u32()?;
        let ciphertext = Bytes::copy_from_slice(reader.read_length_prefixed(MAX_CIPHERTEXT_SIZE)?);
        let mac = reader.read_array()?;

        Ok(Self { ratchet_key, chain_index, ciphertext, mac })
    }
}

/// A message that also carries the key agreement inputs.
///
/// Sent by the initiator until the first reply arrives, so the responder can
/// establish the session from whichever of these messages reaches it first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreKeyMessage {
    /// Responder's one-time public key the initiator picked
    pub one_time_key: [u8; KEY_SIZE],
    /// Initiator's ephemeral base key
    pub base_key: [u8; KEY_SIZE],
    /// Initiator's long-term Curve25519 identity key
    pub identity_key: [u8; KEY_SIZE],
    /// The embedded normal message
    pub message: Message,
}

impl PreKeyMessage {
    /// Full wire encoding.
    pub fn encode(&self) -> Vec<u8> {
        let inner = self.message.encode();

        let mut out = Vec::with_capacity(1 + 3 * KEY_SIZE + 4 + inner.len());
        out.put_u8(PAIRWISE_VERSION);
        out.put_slice(&self.one_time_key);
        out.put_slice(&self.base_key);
        out.put_slice(&self.identity_key);
        put_length_prefixed(&mut out, &inner);
        out
    }

    /// Parse a pre-key message and its embedded message.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        reader.read_version(PAIRWISE_VERSION)?;
        let one_time_key = reader.read_array()?;
        let base_key = reader.read_array()?;
        let identity_key = reader.read_array()?;
        let message = Message::decode(reader.read_length_prefixed(MAX_INNER_MESSAGE_SIZE)?)?;
        reader.finish()?;

        Ok(Self { one_time_key, base_key, identity_key, message })
    }
}

/// Either kind of pairwise message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OlmMessage {
    /// Normal ratchet message
    Normal(Message),
    /// Session establishment message
    PreKey(PreKeyMessage),
}

/// Discriminant for [`OlmMessage`], carried out of band by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// [`PreKeyMessage`]
    PreKey,
    /// [`Message`]
    Normal,
}

impl MessageType {
    /// Numeric tag (0 = pre-key, 1 = normal).
    pub fn to_u8(self) -> u8 {
        match self {
            Self::PreKey => 0,
            Self::Normal => 1,
        }
    }

    /// Parse a numeric tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::PreKey),
            1 => Some(Self::Normal),
            _ => None,
        }
    }
}

impl OlmMessage {
    /// Which kind of message this is.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Normal(_) => MessageType::Normal,
            Self::PreKey(_) => MessageType::PreKey,
        }
    }

    /// The normal message, embedded or not.
    pub fn message(&self) -> &Message {
        match self {
            Self::Normal(message) => message,
            Self::PreKey(pre_key) => &pre_key.message,
        }
    }

    /// Full wire encoding (without the type tag).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Normal(message) => message.encode(),
            Self::PreKey(pre_key) => pre_key.encode(),
        }
    }

    /// Parse bytes whose type the transport already told us.
    pub fn decode(message_type: MessageType, bytes: &[u8]) -> Result<Self> {
        match message_type {
            MessageType::Normal => Message::decode(bytes).map(Self::Normal),
            MessageType::PreKey => PreKeyMessage::decode(bytes).map(Self::PreKey),
        }
    }
}

impl From<Message> for OlmMessage {
    fn from(message: Message) -> Self {
        Self::Normal(message)
    }
}

impl From<PreKeyMessage> for OlmMessage {
    fn from(message: PreKeyMessage) -> Self {
        Self::PreKey(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolError;

    fn sample_message() -> Message {
        let mut message = Message::new([7u8; 32], 42, b"ciphertext".to_vec());
        message.mac = [9u8; MESSAGE_MAC_SIZE];
        message
    }

    #[test]
    fn message_layout() {
        let wire = sample_message().encode();

        assert_eq!(wire[0], PAIRWISE_VERSION);
        assert_eq!(&wire[1..33], &[7u8; 32]);
        assert_eq!(&wire[33..37], &42u32.to_be_bytes());
        assert_eq!(&wire[37..41], &10u32.to_be_bytes());
        assert_eq!(&wire[41..51], b"ciphertext");
        assert_eq!(&wire[51..], &[9u8; 8]);
    }

    #[test]
    fn message_round_trip() {
        let message = sample_message();
        assert_eq!(Message::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn mac_input_is_prefix_of_encoding() {
        let message = sample_message();
        let wire = message.encode();
        let mac_input = message.mac_input();

        assert_eq!(&wire[..mac_input.len()], mac_input.as_slice());
        assert_eq!(wire.len(), mac_input.len() + MESSAGE_MAC_SIZE);
    }

    #[test]
    fn reject_wrong_version() {
        let mut wire = sample_message().encode();
        wire[0] = 0x02;
        assert_eq!(
            Message::decode(&wire),
            Err(ProtocolError::UnsupportedVersion { expected: 0x03, actual: 0x02 })
        );
    }

    #[test]
    fn reject_truncated_message() {
        let wire = sample_message().encode();
        let result = Message::decode(&wire[..wire.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn reject_trailing_bytes() {
        let mut wire = sample_message().encode();
        wire.push(0);
        assert_eq!(Message::decode(&wire), Err(ProtocolError::TrailingBytes { count: 1 }));
    }

    #[test]
    fn reject_oversized_ciphertext_length() {
        let mut wire = sample_message().encode();
        wire[37..41].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(Message::decode(&wire), Err(ProtocolError::LengthTooLarge { .. })));
    }

    #[test]
    fn pre_key_round_trip() {
        let pre_key = PreKeyMessage {
            one_time_key: [1u8; 32],
            base_key: [2u8; 32],
            identity_key: [3u8; 32],
            message: sample_message(),
        };

        let wire = pre_key.encode();
        assert_eq!(&wire[1..33], &[1u8; 32]);
        assert_eq!(PreKeyMessage::decode(&wire).unwrap(), pre_key);
    }

    #[test]
    fn pre_key_rejects_inner_trailing_bytes() {
        let mut inner = sample_message().encode();
        inner.push(0xff);

        let mut wire = vec![PAIRWISE_VERSION];
        wire.extend_from_slice(&[0u8; 96]);
        put_length_prefixed(&mut wire, &inner);

        assert_eq!(PreKeyMessage::decode(&wire), Err(ProtocolError::TrailingBytes { count: 1 }));
    }

    #[test]
    fn olm_message_dispatch() {
        let message = OlmMessage::from(sample_message());
        assert_eq!(message.message_type(), MessageType::Normal);

        let decoded = OlmMessage::decode(MessageType::Normal, &message.encode()).unwrap();
        assert_eq!(decoded, message);
        assert!(OlmMessage::decode(MessageType::PreKey, &message.encode()).is_err());
    }

    #[test]
    fn message_type_tags() {
        for message_type in [MessageType::PreKey, MessageType::Normal] {
            assert_eq!(MessageType::from_u8(message_type.to_u8()), Some(message_type));
        }
        assert_eq!(MessageType::from_u8(2), None);
    }
}
