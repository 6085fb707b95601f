//! Triple Diffie-Hellman key agreement that seeds a pairwise session.
//!
//! ```text
//! initiator (A)                              responder (B)
//! DH(identity_A, one_time_B)     ==          DH(one_time_B, identity_A)
//! DH(base_A,     identity_B)     ==          DH(identity_B, base_A)
//! DH(base_A,     one_time_B)     ==          DH(one_time_B, base_A)
//!
//! HKDF(salt = none, ikm = DH1 | DH2 | DH3, info = "OLM_ROOT")
//!     -> root key [32] | chain key [32]
//! ```
//!
//! The initiator encrypts on the chain key, the responder decrypts with it.

use quire_crypto::{ChainKey, Curve25519Keypair, Curve25519PublicKey, hkdf_expand};
use zeroize::Zeroizing;

use super::chains::{RootKey, split_root_and_chain};

/// HKDF info for the initial root derivation
const ROOT_INFO: &[u8] = b"OLM_ROOT";

/// Initiator side: our identity and fresh base key against the responder's
/// identity and one-time key.
pub(crate) fn outbound(
    identity_key: &Curve25519Keypair,
    base_key: &Curve25519Keypair,
    their_identity_key: &Curve25519PublicKey,
    their_one_time_key: &Curve25519PublicKey,
) -> (RootKey, ChainKey) {
    let dh1 = identity_key.diffie_hellman(their_one_time_key);
    let dh2 = base_key.diffie_hellman(their_identity_key);
    let dh3 = base_key.diffie_hellman(their_one_time_key);
    expand(&dh1, &dh2, &dh3)
}

/// Responder side: our identity and consumed one-time key against the
/// initiator's identity and base key.
pub(crate) fn inbound(
    identity_key: &Curve25519Keypair,
    one_time_key: &Curve25519Keypair,
    their_identity_key: &Curve25519PublicKey,
    their_base_key: &Curve25519PublicKey,
) -> (RootKey, ChainKey) {
    let dh1 = one_time_key.diffie_hellman(their_identity_key);
    let dh2 = identity_key.diffie_hellman(their_base_key);
    let dh3 = one_time_key.diffie_hellman(their_base_key);
    expand(&dh1, &dh2, &dh3)
}

fn expand(dh1: &[u8; 32], dh2: &[u8; 32], dh3: &[u8; 32]) -> (RootKey, ChainKey) {
    let mut secret = Zeroizing::new([0u8; 96]);
    secret[..32].copy_from_slice(dh1);
    secret[32..64].copy_from_slice(dh2);
    secret[64..].copy_from_slice(dh3);

    let okm = Zeroizing::new(hkdf_expand::<64>(None, &secret[..], ROOT_INFO));
    split_root_and_chain(&okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_derive_the_same_keys() {
        let alice_identity = Curve25519Keypair::from_secret_bytes([1u8; 32]);
        let alice_base = Curve25519Keypair::from_secret_bytes([2u8; 32]);
        let bob_identity = Curve25519Keypair::from_secret_bytes([3u8; 32]);
        let bob_one_time = Curve25519Keypair::from_secret_bytes([4u8; 32]);

        let (alice_root, alice_chain) = outbound(
            &alice_identity,
            &alice_base,
            &bob_identity.public_key(),
            &bob_one_time.public_key(),
        );
        let (bob_root, bob_chain) = inbound(
            &bob_identity,
            &bob_one_time,
            &alice_identity.public_key(),
            &alice_base.public_key(),
        );

        assert_eq!(alice_root.as_bytes(), bob_root.as_bytes());
        assert_eq!(alice_chain.as_bytes(), bob_chain.as_bytes());
    }

    #[test]
    fn different_one_time_keys_diverge() {
        let identity = Curve25519Keypair::from_secret_bytes([1u8; 32]);
        let base = Curve25519Keypair::from_secret_bytes([2u8; 32]);
        let their_identity = Curve25519Keypair::from_secret_bytes([3u8; 32]).public_key();

        let (root_a, _) = outbound(
            &identity,
            &base,
            &their_identity,
            &Curve25519Keypair::from_secret_bytes([4u8; 32]).public_key(),
        );
        let (root_b, _) = outbound(
            &identity,
            &base,
            &their_identity,
            &Curve25519Keypair::from_secret_bytes([5u8; 32]).public_key(),
        );

        assert_ne!(root_a.as_bytes(), root_b.as_bytes());
    }
}
