//! Quire Cryptographic Primitives
//!
//! Cryptographic building blocks for quire. Pure functions with deterministic
//! outputs. Callers provide random bytes (key seeds, ratchet seeds) so every
//! operation can be replayed in tests.
//!
//! # Key Lifecycle
//!
//! Two independent ratchet families are built from the same primitives.
//!
//! ```text
//! Pairwise                                  Group
//!
//! 3x Curve25519 DH                          160 random bytes
//!        │                                         │
//!        ▼ HKDF "OLM_ROOT"                         ▼ HKDF "MEGOLM_RATCHET"
//! Root Key ──DH ratchet──▶ Root Key'        HashRatchet R0..R3 (index i)
//!        │                                         │
//!        ▼                                         ▼ advance / advance_to
//! ChainKey ──HMAC 0x02──▶ ChainKey'         HashRatchet (index j > i)
//!        │                                         │
//!        ▼ HMAC 0x01                               ▼ HKDF "MEGOLM_KEYS"
//! MessageKey ──HKDF "OLM_KEYS"──▶ CipherKeys (AES-256-CTR key, HMAC key, IV)
//! ```
//!
//! # Security
//!
//! Forward Secrecy:
//! - Chain keys are overwritten and zeroized after deriving the next one
//! - Hash ratchet parts are only ever rehashed forward
//! - Message keys are zeroized on drop
//!
//! Authenticity:
//! - Ciphertexts carry an HMAC-SHA-256 tag (possibly truncated)
//! - Tags are compared in constant time
//! - Group messages additionally carry an Ed25519 signature
//!
//! # Concurrency
//!
//! Nothing in this crate holds global state. Every type is a plain value;
//! callers that share one across threads must serialize access themselves.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chain;
pub mod cipher;
pub mod curve25519;
pub mod ed25519;
pub mod error;
pub mod hash_ratchet;
pub mod kdf;

pub use chain::{ChainKey, MessageKey};
pub use cipher::{CipherKeys, MAC_SIZE, TRUNCATED_MAC_SIZE};
pub use curve25519::{Curve25519Keypair, Curve25519PublicKey, Curve25519SecretKey};
pub use ed25519::{Ed25519Keypair, Ed25519PublicKey, Ed25519Signature, verify_signature};
pub use error::CryptoError;
pub use hash_ratchet::{HashRatchet, RATCHET_LENGTH, RATCHET_PART_LENGTH, RATCHET_PARTS};
pub use kdf::{hkdf_expand, hmac_sha256, sha256};
