//! Quire wire formats
//!
//! Byte-level encodings for everything a ratchet session sends or hands to
//! another party:
//!
//! - [`Message`] / [`PreKeyMessage`]: pairwise double-ratchet traffic
//! - [`GroupMessage`]: signed group traffic
//! - [`SessionKey`], [`ExportedSessionKey`], [`GroupSessionBackup`]: group
//!   ratchet checkpoints
//!
//! All integers are big-endian and fixed width. Decoders are total: any byte
//! string yields either a value or a [`ProtocolError`], never a panic. This
//! crate performs no cryptography; MACs and signatures are carried as opaque
//! bytes and checked by `quire-core`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod errors;
pub mod group;
pub mod message;

pub use errors::{ProtocolError, Result};
pub use group::{
    EXPORTED_SESSION_KEY_VERSION, ExportedSessionKey, GROUP_BACKUP_VERSION, GROUP_MAC_SIZE,
    GROUP_MESSAGE_VERSION, GROUP_RATCHET_SIZE, GroupMessage, GroupSessionBackup,
    SESSION_KEY_VERSION, SIGNATURE_SIZE, SessionKey,
};
pub use message::{
    MAX_CIPHERTEXT_SIZE, MESSAGE_MAC_SIZE, Message, MessageType, OlmMessage, PAIRWISE_VERSION,
    PreKeyMessage,
};
