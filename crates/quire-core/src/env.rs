//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from the system's entropy source. Production code
//! uses [`SystemEnv`]; tests plug in a seeded generator so that key material,
//! and therefore every ciphertext, is reproducible.

use quire_crypto::{Curve25519Keypair, Ed25519Keypair};
use zeroize::Zeroizing;

/// Source of randomness for key generation.
///
/// Only the stateful entities in this crate draw randomness, and only when
/// creating keys: account identity and one-time keys, pairwise base and
/// ratchet keys, group ratchet seeds and signing keys. Decryption never does.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `random_bytes()` fills the entire buffer; there is no partial result
pub trait Environment {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random fixed-size array.
    ///
    /// Convenience for the 32-byte secrets and the group ratchet seed.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }
}

/// Production environment backed by the OS RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. Key generation without working entropy would
/// produce predictable secrets, so there is nothing sensible to continue
/// with.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

/// Fresh Curve25519 key pair from the environment's entropy.
pub(crate) fn generate_curve25519(env: &impl Environment) -> Curve25519Keypair {
    let secret = Zeroizing::new(env.random_array::<32>());
    Curve25519Keypair::from_secret_bytes(*secret)
}

/// Fresh Ed25519 key pair from the environment's entropy.
pub(crate) fn generate_ed25519(env: &impl Environment) -> Ed25519Keypair {
    let seed = Zeroizing::new(env.random_array::<32>());
    Ed25519Keypair::from_seed(&seed)
}


#[cfg(test)]
mod tests {
    use super::{testing::SeededEnv, *};

    #[test]
    fn system_env_random_bytes_are_random() {
        let env = SystemEnv::new();

        let bytes1: [u8; 32] = env.random_array();
        let bytes2: [u8; 32] = env.random_array();

        // Extremely unlikely to be equal if random
        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[test]
    fn system_env_random_bytes_fills_buffer() {
        let env = SystemEnv::new();

        let mut bytes = [0u8; 64];
        env.random_bytes(&mut bytes);

        let non_zero_count = bytes.iter().filter(|&&b| b != 0).count();
        assert!(non_zero_count > 32, "Most bytes should be non-zero");
    }

    #[test]
    fn seeded_env_is_reproducible() {
        let a = SeededEnv::new(7);
        let b = SeededEnv::new(7);

        assert_eq!(a.random_array::<48>(), b.random_array::<48>());
        assert_ne!(a.random_array::<32>(), SeededEnv::new(8).random_array::<32>());
    }
}
