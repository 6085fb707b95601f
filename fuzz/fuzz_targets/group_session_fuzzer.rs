//! Fuzz target for group session delivery and tampering
//!
//! # Strategy
//!
//! - Arbitrary session randomness and plaintexts
//! - Recipient joins at an arbitrary point via signed or exported checkpoint
//! - Messages delivered in arbitrary order, repeated, or corrupted
//!
//! # Invariants
//!
//! - Genuine messages at or after the join point always decrypt to what
//!   was sent
//! - Messages before the join point are always `UnknownMessageIndex`
//! - Corrupted messages NEVER decrypt
//! - A failed decrypt never changes the first known index

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quire_core::{
    GROUP_SESSION_RANDOM_LENGTH, GroupDecryptionError, InboundGroupSession, OutboundGroupSession,
};

#[derive(Debug, Arbitrary)]
struct Scenario {
    random: [u8; GROUP_SESSION_RANDOM_LENGTH],
    plaintexts: Vec<Vec<u8>>,
    join_at: u8,
    via_export: bool,
    deliveries: Vec<Delivery>,
}

#[derive(Debug, Arbitrary)]
enum Delivery {
    Genuine { index: u8 },
    Corrupted { index: u8, byte: u16, bit: u8 },
}

fuzz_target!(|scenario: Scenario| {
    let mut outbound = OutboundGroupSession::from_random(&scenario.random);
    let plaintexts: Vec<_> = scenario.plaintexts.into_iter().take(32).collect();
    if plaintexts.is_empty() {
        return;
    }

    let join_at = usize::from(scenario.join_at) % plaintexts.len();
    let mut messages = Vec::with_capacity(plaintexts.len());
    let mut session_key = None;
    for (i, plaintext) in plaintexts.iter().enumerate() {
        if i == join_at {
            session_key = Some(outbound.session_key());
        }
        let Ok(message) = outbound.encrypt(plaintext) else {
            panic!("small plaintext at a low index rejected");
        };
        messages.push(message);
    }
    let Some(session_key) = session_key else {
        return;
    };

    let Ok(signed) = InboundGroupSession::new(&session_key) else {
        panic!("freshly signed session key rejected");
    };
    let mut inbound = if scenario.via_export {
        let exported = signed.export_at_first_known_index();
        let Ok(imported) = InboundGroupSession::import(&exported) else {
            panic!("export of a valid session rejected");
        };
        imported
    } else {
        signed
    };

    for delivery in scenario.deliveries.into_iter().take(64) {
        match delivery {
            Delivery::Genuine { index } => {
                let index = usize::from(index) % messages.len();
                let result = inbound.decrypt(&messages[index]);

                if index < join_at {
                    assert!(matches!(result, Err(GroupDecryptionError::UnknownMessageIndex { .. })));
                } else {
                    let Ok(decrypted) = result else {
                        panic!("genuine message {index} failed: {result:?}");
                    };
                    assert_eq!(decrypted.plaintext, plaintexts[index]);
                    assert_eq!(decrypted.message_index as usize, index);
                    assert!(inbound.is_verified());
                }
            },
            Delivery::Corrupted { index, byte, bit } => {
                let index = usize::from(index) % messages.len();
                let mut encoded = messages[index].encode();
                let position = usize::from(byte) % encoded.len();
                encoded[position] ^= 1 << (bit % 8);

                if let Ok(corrupted) = quire_proto::GroupMessage::decode(&encoded) {
                    assert!(inbound.decrypt(&corrupted).is_err(), "corrupted message decrypted");
                }
            },
        }

        assert_eq!(inbound.first_known_index() as usize, join_at);
    }
});
