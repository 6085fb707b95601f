//! Property-based tests for pairwise double-ratchet sessions
//!
//! These tests verify:
//!
//! 1. **Symmetry**: both ends derive the same session id and keys
//! 2. **Re-keying**: conversations survive any number of DH ratchet steps
//! 3. **Reordering**: messages within the skip bound decrypt in any order
//! 4. **Single use**: no message decrypts twice

use std::cell::RefCell;

use proptest::prelude::*;
use quire_core::{Account, DecryptionError, Environment, Session};
use quire_proto::{MessageType, OlmMessage};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

struct TestEnv(RefCell<ChaCha20Rng>);

impl TestEnv {
    fn new(seed: u64) -> Self {
        Self(RefCell::new(ChaCha20Rng::seed_from_u64(seed)))
    }
}

impl Environment for TestEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.0.borrow_mut().fill_bytes(buffer);
    }
}

/// Alice starts a session to Bob, and Bob accepts Alice's first message.
fn establish(env: &TestEnv) -> (Session, Session) {
    let alice_account = Account::new(env);
    let mut bob_account = Account::new(env);

    bob_account.generate_one_time_keys(env, 1);
    let Some(one_time_key) = bob_account.one_time_keys().into_values().next() else {
        unreachable!("one key was generated");
    };
    bob_account.mark_keys_as_published();

    let mut alice = alice_account.create_outbound_session(
        env,
        bob_account.identity_keys().curve25519,
        one_time_key,
    );

    let OlmMessage::PreKey(pre_key) = alice.encrypt(env, b"hello").unwrap() else {
        unreachable!("first message is a pre-key message");
    };
    let result = bob_account
        .create_inbound_session(Some(&alice_account.identity_keys().curve25519), &pre_key)
        .unwrap();
    assert_eq!(result.plaintext, b"hello");
    assert_eq!(bob_account.remove_one_time_key(&one_time_key), None);

    (alice, result.session)
}

#[test]
fn established_sessions_are_symmetric() {
    let env = TestEnv::new(1);
    let (mut alice, mut bob) = establish(&env);

    assert_eq!(alice.session_id(), bob.session_id());
    assert_eq!(alice.session_keys(), bob.session_keys());

    let reply = bob.encrypt(&env, b"hi alice").unwrap();
    assert_eq!(reply.message_type(), MessageType::Normal);
    assert_eq!(alice.decrypt(&reply).unwrap(), b"hi alice");

    let next = alice.encrypt(&env, b"hi again").unwrap();
    assert_eq!(next.message_type(), MessageType::Normal);
    assert_eq!(bob.decrypt(&next).unwrap(), b"hi again");
}

#[test]
fn replayed_pre_key_message_matches_existing_session() {
    let env = TestEnv::new(2);
    let alice_account = Account::new(&env);
    let mut bob_account = Account::new(&env);
    bob_account.generate_one_time_keys(&env, 2);
    let Some(one_time_key) = bob_account.one_time_keys().into_values().next() else {
        unreachable!("keys were generated");
    };

    let mut alice = alice_account.create_outbound_session(
        &env,
        bob_account.identity_keys().curve25519,
        one_time_key,
    );
    let OlmMessage::PreKey(first) = alice.encrypt(&env, b"one").unwrap() else {
        unreachable!("first message is a pre-key message");
    };
    let OlmMessage::PreKey(second) = alice.encrypt(&env, b"two").unwrap() else {
        unreachable!("no reply yet");
    };

    let mut bob = bob_account.create_inbound_session(None, &first).unwrap().session;
    assert!(bob.matches_inbound_session(&second));
    assert!(bob.matches_inbound_session_from(&alice_account.identity_keys().curve25519, &second));
    assert_eq!(bob.decrypt(&OlmMessage::PreKey(second.clone())).unwrap(), b"two");

    assert!(bob_account.create_inbound_session(None, &second).is_err());
}

proptest! {
    /// INVARIANT: Any pattern of turns keeps both sides decrypting, and
    /// every change of speaker rotates the ratchet key.
    #[test]
    fn conversation_survives_rekeying(
        seed in any::<u64>(),
        turns in prop::collection::vec((any::<bool>(), 1usize..4), 1..12),
    ) {
        let env = TestEnv::new(seed);
        let (mut alice, mut bob) = establish(&env);

        for (round, (alice_speaks, burst)) in turns.into_iter().enumerate() {
            let (sender, receiver) = if alice_speaks {
                (&mut alice, &mut bob)
            } else {
                (&mut bob, &mut alice)
            };

            for i in 0..burst {
                let plaintext = format!("{round}:{i}").into_bytes();
                let message = sender.encrypt(&env, &plaintext).unwrap();
                prop_assert_eq!(receiver.decrypt(&message).unwrap(), plaintext);
            }
        }

        prop_assert_eq!(alice.session_id(), bob.session_id());
    }

    /// INVARIANT: Messages within the skip bound decrypt in any order, once.
    #[test]
    fn any_delivery_order_decrypts_once(
        seed in any::<u64>(),
        order in Just((0u8..12).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let env = TestEnv::new(seed);
        let (mut alice, mut bob) = establish(&env);

        let reply = bob.encrypt(&env, b"ack").unwrap();
        prop_assert_eq!(alice.decrypt(&reply).unwrap(), b"ack".to_vec());

        let messages: Vec<_> = (0u8..12).map(|i| alice.encrypt(&env, &[i]).unwrap()).collect();

        for i in order {
            let message = &messages[usize::from(i)];
            prop_assert_eq!(bob.decrypt(message).unwrap(), vec![i]);
            prop_assert!(
                matches!(bob.decrypt(message), Err(DecryptionError::UnknownMessageIndex { .. })),
                "replay of message {} must fail",
                i
            );
        }
    }

    /// INVARIANT: A failed decrypt of a corrupted message never changes
    /// the session; the genuine message still decrypts afterwards.
    #[test]
    fn corrupted_message_does_not_advance_session(
        seed in any::<u64>(),
        flip in 0usize..64,
    ) {
        let env = TestEnv::new(seed);
        let (mut alice, mut bob) = establish(&env);
        bob.decrypt(&alice.encrypt(&env, b"warmup").unwrap()).unwrap();

        let message = alice.encrypt(&env, b"genuine").unwrap();
        let OlmMessage::PreKey(mut corrupted) = message.clone() else {
            unreachable!("alice has not received a reply");
        };
        let mut ciphertext = corrupted.message.ciphertext.to_vec();
        let position = flip % ciphertext.len();
        ciphertext[position] ^= 0x80;
        corrupted.message.ciphertext = ciphertext.into();

        prop_assert_eq!(
            bob.decrypt(&OlmMessage::PreKey(corrupted)),
            Err(DecryptionError::BadMac)
        );
        prop_assert_eq!(bob.decrypt(&message).unwrap(), b"genuine".to_vec());
    }
}
