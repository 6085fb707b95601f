//! Root key and per-direction chains of a pairwise session.

use quire_crypto::{
    ChainKey, Curve25519Keypair, Curve25519PublicKey, MessageKey, hkdf_expand,
};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// HKDF info for the asymmetric ratchet step
const RATCHET_INFO: &[u8] = b"OLM_RATCHET";

/// Top-level secret, replaced on every DH ratchet step.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct RootKey {
    key: [u8; 32],
}

impl RootKey {
    pub(crate) fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// `HKDF(salt = root, ikm = DH(ours, theirs), "OLM_RATCHET")` split into
    /// the next root key and a fresh chain key.
    pub(crate) fn advance(
        &self,
        our_ratchet_key: &Curve25519Keypair,
        their_ratchet_key: &Curve25519PublicKey,
    ) -> (RootKey, ChainKey) {
        let shared = our_ratchet_key.diffie_hellman(their_ratchet_key);
        let okm = Zeroizing::new(hkdf_expand::<64>(Some(&self.key), &shared[..], RATCHET_INFO));
        split_root_and_chain(&okm)
    }
}

/// Split 64 bytes of key material into a root key and a chain key at index 0.
pub(crate) fn split_root_and_chain(okm: &[u8; 64]) -> (RootKey, ChainKey) {
    let mut root = [0u8; 32];
    let mut chain = [0u8; 32];
    root.copy_from_slice(&okm[..32]);
    chain.copy_from_slice(&okm[32..]);

    let keys = (RootKey::new(root), ChainKey::new(chain));
    root.zeroize();
    chain.zeroize();
    keys
}

/// Our current ratchet key pair and the chain we encrypt with.
#[derive(Clone)]
pub(crate) struct SenderChain {
    pub(crate) ratchet_key: Curve25519Keypair,
    pub(crate) chain_key: ChainKey,
}

/// A peer ratchet key and the chain we decrypt its messages with.
#[derive(Clone)]
pub(crate) struct ReceiverChain {
    pub(crate) ratchet_key: Curve25519PublicKey,
    pub(crate) chain_key: ChainKey,
}

/// A message key derived while walking past a message that has not arrived.
#[derive(Clone)]
pub(crate) struct SkippedMessageKey {
    pub(crate) ratchet_key: Curve25519PublicKey,
    pub(crate) message_key: MessageKey,
}

impl SkippedMessageKey {
    pub(crate) fn matches(&self, ratchet_key: &Curve25519PublicKey, index: u32) -> bool {
        self.ratchet_key == *ratchet_key && self.message_key.index() == index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratchet_step_agrees_on_both_sides() {
        let root = RootKey::new([1u8; 32]);
        let alice = Curve25519Keypair::from_secret_bytes([2u8; 32]);
        let bob = Curve25519Keypair::from_secret_bytes([3u8; 32]);

        let (alice_root, alice_chain) = root.advance(&alice, &bob.public_key());
        let (bob_root, bob_chain) = root.advance(&bob, &alice.public_key());

        assert_eq!(alice_root.as_bytes(), bob_root.as_bytes());
        assert_eq!(alice_chain.as_bytes(), bob_chain.as_bytes());
        assert_eq!(alice_chain.index(), 0);
    }

    #[test]
    fn ratchet_step_replaces_root() {
        let root = RootKey::new([1u8; 32]);
        let ours = Curve25519Keypair::from_secret_bytes([2u8; 32]);
        let theirs = Curve25519Keypair::from_secret_bytes([3u8; 32]).public_key();

        let (next_root, chain) = root.advance(&ours, &theirs);
        assert_ne!(next_root.as_bytes(), root.as_bytes());
        assert_ne!(next_root.as_bytes(), chain.as_bytes());
    }

    #[test]
    fn skipped_key_matches_ratchet_and_index() {
        let ratchet_key = Curve25519PublicKey::from_bytes([4u8; 32]);
        let skipped = SkippedMessageKey {
            ratchet_key,
            message_key: MessageKey::new([5u8; 32], 7),
        };

        assert!(skipped.matches(&ratchet_key, 7));
        assert!(!skipped.matches(&ratchet_key, 8));
        assert!(!skipped.matches(&Curve25519PublicKey::from_bytes([6u8; 32]), 7));
    }
}
