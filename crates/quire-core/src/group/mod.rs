//! Group (one-to-many) ratchet sessions.
//!
//! The sender holds an [`OutboundGroupSession`]: a [`HashRatchet`] plus an
//! Ed25519 signing key. Recipients hold an [`InboundGroupSession`] built
//! from a signed [`SessionKey`] checkpoint, which lets them decrypt the
//! message at the checkpoint's index and every later one, but none before.
//!
//! ```text
//! Outbound                                    Inbound
//! ratchet @ i ──session_key()──▶ SessionKey ──▶ new() (verified)
//!     │                                           │
//!     ▼ encrypt                                   ▼ decrypt(@ j >= i)
//! GroupMessage @ i, i+1, ... ────────────────▶ plaintext
//! ```
//!
//! The session id of both halves is the sender's Ed25519 public key. It is
//! fixed at creation and identical in every checkpoint and export.
//!
//! [`HashRatchet`]: quire_crypto::HashRatchet
//! [`SessionKey`]: quire_proto::SessionKey

mod inbound;
mod outbound;

pub use inbound::{DecryptedGroupMessage, InboundGroupSession};
pub use outbound::{GROUP_SESSION_RANDOM_LENGTH, OutboundGroupSession};
