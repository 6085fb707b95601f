//! Quire Ratchet Sessions
//!
//! Stateful entities built on `quire-crypto` and `quire-proto`:
//!
//! - [`Account`]: long-term identity and signing keys plus a pool of
//!   one-time keys; the factory for pairwise sessions
//! - [`Session`]: pairwise double ratchet
//! - [`OutboundGroupSession`] / [`InboundGroupSession`]: one-to-many hash
//!   ratchet with signed messages
//!
//! Every entity persists through [`Pickle`], an authenticated encrypted
//! blob keyed by a caller-supplied secret.
//!
//! # Randomness
//!
//! Operations that need fresh key material take an [`Environment`]. Use
//! [`SystemEnv`] in production; tests substitute a seeded implementation so
//! runs are reproducible.
//!
//! # Failure Atomicity
//!
//! Every fallible operation either succeeds or leaves its entity untouched.
//! There are no retries and no partial updates.
//!
//! # Concurrency
//!
//! All entities are plain, single-owner values with no interior locking.
//! Callers sharing one across threads must serialize access to it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod account;
pub mod config;
pub mod env;
pub mod error;
pub mod group;
pub mod pickle;
pub mod session;

pub use account::{Account, IdentityKeys, InboundCreationResult, KeyId};
pub use config::RatchetConfig;
pub use env::{Environment, SystemEnv};
pub use error::{
    DecryptionError, EncryptionError, GroupDecryptionError, PickleError, SessionCreationError,
    SessionKeyError,
};
pub use group::{
    DecryptedGroupMessage, GROUP_SESSION_RANDOM_LENGTH, InboundGroupSession, OutboundGroupSession,
};
pub use pickle::Pickle;
pub use session::{Session, SessionId, SessionKeys};
