//! Error types for ratchet sessions and persistence.
//!
//! One enum per operation family, so callers can match on exactly the
//! failures an operation can produce. Every variant is safe to log: none
//! carries key material.
//!
//! All cryptographic and integrity failures are final for the input that
//! caused them. No operation mutates session state before it has succeeded,
//! so a failed call leaves the session exactly as it was.

use quire_crypto::CryptoError;
use quire_proto::{MAX_CIPHERTEXT_SIZE, ProtocolError};
use thiserror::Error;

/// Errors from restoring a pickled entity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PickleError {
    /// The pickle MAC did not verify (wrong key or tampered blob)
    #[error("pickle MAC mismatch")]
    BadMac,

    /// Pickle format version is not supported
    #[error("unsupported pickle version: {0}")]
    UnsupportedVersion(u8),

    /// Decrypted fields did not decode
    #[error("malformed pickle: {0}")]
    Malformed(#[from] ProtocolError),

    /// A stored key is invalid
    #[error("invalid key in pickle: {0}")]
    InvalidKey(#[from] CryptoError),

    /// Fields decoded but describe an impossible state
    #[error("inconsistent pickled state: {0}")]
    InvalidState(&'static str),
}

impl PickleError {
    /// Returns true if the blob failed authentication.
    ///
    /// Decoding errors after a valid MAC mean the blob was produced by an
    /// incompatible writer, not that it was tampered with.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::BadMac)
    }
}

/// Errors from decrypting a pairwise message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    /// Message MAC did not verify
    #[error("message MAC mismatch")]
    BadMac,

    /// Message key for this index was already used or evicted
    #[error("unknown message index {index}")]
    UnknownMessageIndex {
        /// Chain index the message claimed
        index: u32,
    },

    /// Reaching the message index would skip too many keys
    #[error("message index skips {gap} keys, maximum is {max}")]
    MessageSkipTooFar {
        /// Number of keys that would be skipped
        gap: u32,
        /// Configured maximum
        max: u32,
    },

    /// A new ratchet key arrived before we ever sent a message
    #[error("cannot ratchet without a sender chain")]
    MissingSenderChain,

    /// Message bytes did not decode
    #[error("malformed message: {0}")]
    Malformed(#[from] ProtocolError),
}

impl DecryptionError {
    /// Returns true if the message failed authentication.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::BadMac)
    }

    /// Returns true if the message can never be decrypted by this session,
    /// no matter what arrives afterwards.
    ///
    /// `MissingSenderChain` is the exception: it clears once we send a
    /// message of our own.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MissingSenderChain)
    }
}

/// Errors from encrypting a pairwise or group message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    /// Ciphertext would exceed what the wire format can carry
    #[error("plaintext of {size} bytes exceeds maximum of {max}")]
    PlaintextTooLarge {
        /// Plaintext length
        size: usize,
        /// Largest plaintext a message can carry
        max: usize,
    },

    /// The chain or ratchet has reached the last representable index
    #[error("message index space exhausted")]
    IndexExhausted,
}

impl EncryptionError {
    /// Reject plaintexts whose ciphertext the peer's decoder would refuse.
    ///
    /// AES-CTR preserves length, so the bound applies to the plaintext.
    pub(crate) fn check_size(plaintext: &[u8]) -> Result<(), Self> {
        if plaintext.len() > MAX_CIPHERTEXT_SIZE {
            return Err(Self::PlaintextTooLarge { size: plaintext.len(), max: MAX_CIPHERTEXT_SIZE });
        }
        Ok(())
    }
}

/// Errors from establishing an inbound pairwise session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionCreationError {
    /// The pre-key message names a one-time key we do not hold
    #[error("one-time key not found")]
    MissingOneTimeKey,

    /// The pre-key message came from a different identity than expected
    #[error("identity key does not match the expected sender")]
    MismatchedIdentityKey,

    /// The embedded message did not decrypt
    #[error("initial message failed to decrypt: {0}")]
    Decryption(#[from] DecryptionError),
}

/// Errors from decrypting a group message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupDecryptionError {
    /// Ed25519 signature did not verify
    #[error("group message signature mismatch")]
    BadSignature,

    /// Message MAC did not verify
    #[error("group message MAC mismatch")]
    BadMac,

    /// Message index is below the first index this session can reach
    #[error("unknown message index {requested}, first known is {first_known}")]
    UnknownMessageIndex {
        /// Lowest index the session can decrypt
        first_known: u32,
        /// Index the message claimed
        requested: u32,
    },

    /// Message bytes did not decode
    #[error("malformed group message: {0}")]
    Malformed(#[from] ProtocolError),
}

impl GroupDecryptionError {
    /// Returns true if the message failed authentication.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::BadSignature | Self::BadMac)
    }
}

/// Errors from creating an inbound group session from a checkpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionKeyError {
    /// Checkpoint signature did not verify
    #[error("session key signature mismatch")]
    BadSignature,

    /// Checkpoint carries an invalid signing key
    #[error("invalid signing key: {0}")]
    InvalidKey(#[from] CryptoError),

    /// Checkpoint bytes did not decode
    #[error("malformed session key: {0}")]
    Malformed(#[from] ProtocolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_failures() {
        assert!(PickleError::BadMac.is_integrity_failure());
        assert!(!PickleError::UnsupportedVersion(2).is_integrity_failure());

        assert!(DecryptionError::BadMac.is_integrity_failure());
        assert!(!DecryptionError::UnknownMessageIndex { index: 1 }.is_integrity_failure());

        assert!(GroupDecryptionError::BadSignature.is_integrity_failure());
        assert!(GroupDecryptionError::BadMac.is_integrity_failure());
        assert!(
            !GroupDecryptionError::UnknownMessageIndex { first_known: 3, requested: 1 }
                .is_integrity_failure()
        );
    }

    #[test]
    fn missing_sender_chain_is_not_fatal() {
        assert!(!DecryptionError::MissingSenderChain.is_fatal());
        assert!(DecryptionError::BadMac.is_fatal());
        assert!(DecryptionError::MessageSkipTooFar { gap: 3000, max: 2000 }.is_fatal());
    }

    #[test]
    fn protocol_errors_convert() {
        let err: DecryptionError = ProtocolError::TrailingBytes { count: 1 }.into();
        assert!(matches!(err, DecryptionError::Malformed(_)));

        let err: SessionCreationError = DecryptionError::BadMac.into();
        assert_eq!(err, SessionCreationError::Decryption(DecryptionError::BadMac));
    }

    #[test]
    fn plaintext_size_limit_is_inclusive() {
        assert_eq!(EncryptionError::check_size(&[]), Ok(()));
        assert_eq!(
            EncryptionError::check_size(&vec![0u8; MAX_CIPHERTEXT_SIZE + 1]),
            Err(EncryptionError::PlaintextTooLarge {
                size: MAX_CIPHERTEXT_SIZE + 1,
                max: MAX_CIPHERTEXT_SIZE,
            })
        );
        assert_eq!(EncryptionError::check_size(&vec![0u8; MAX_CIPHERTEXT_SIZE]), Ok(()));
    }

    #[test]
    fn display_is_informative() {
        let err = GroupDecryptionError::UnknownMessageIndex { first_known: 5, requested: 2 };
        assert_eq!(err.to_string(), "unknown message index 2, first known is 5");
    }
}
