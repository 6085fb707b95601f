//! Fuzz target for pairwise message decoding
//!
//! Feeds arbitrary bytes to every pairwise decoder, under both message
//! types. The first byte doubles as a transport type tag.
//!
//! # Invariants
//!
//! - Decoders NEVER panic
//! - Any accepted input re-encodes to exactly the same bytes

#![no_main]

use libfuzzer_sys::fuzz_target;
use quire_proto::{Message, MessageType, OlmMessage, PreKeyMessage};

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = Message::decode(data) {
        assert_eq!(message.encode(), data, "normal message encoding is not canonical");
    }

    if let Ok(pre_key) = PreKeyMessage::decode(data) {
        assert_eq!(pre_key.encode(), data, "pre-key message encoding is not canonical");
    }

    for message_type in [MessageType::Normal, MessageType::PreKey] {
        if let Ok(message) = OlmMessage::decode(message_type, data) {
            assert_eq!(message.message_type(), message_type);
            assert_eq!(message.encode(), data);
        }
    }

    if let Some((&tag, rest)) = data.split_first() {
        match MessageType::from_u8(tag) {
            Some(message_type) => {
                assert_eq!(message_type.to_u8(), tag);
                if let Ok(message) = OlmMessage::decode(message_type, rest) {
                    assert_eq!(message.encode(), rest);
                }
            }
            None => assert!(tag > 1, "tag {tag} should name a message type"),
        }
    }
});
