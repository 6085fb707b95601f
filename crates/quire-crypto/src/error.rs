//! Error types for primitive operations

use thiserror::Error;

/// Errors from key parsing and signature verification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Bytes do not encode a valid public key (e.g. not a curve point)
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Ed25519 signature did not verify
    #[error("signature verification failed")]
    BadSignature,

    /// Key material had the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },
}

impl CryptoError {
    /// Returns true if this error means authenticity could not be
    /// established for some input.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::BadSignature)
    }
}
