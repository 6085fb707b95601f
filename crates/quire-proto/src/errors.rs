//! Error types for wire format parsing.

use thiserror::Error;

/// Result alias for wire format operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from decoding untrusted bytes.
///
/// None of these carry secret material, so they are safe to log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Version byte is not the one this format expects
    #[error("unsupported version: expected {expected:#04x}, got {actual:#04x}")]
    UnsupportedVersion {
        /// Version this decoder understands
        expected: u8,
        /// Version found on the wire
        actual: u8,
    },

    /// Input ended before a field was complete
    #[error("truncated input: needed {expected} bytes, {actual} remaining")]
    Truncated {
        /// Bytes needed by the next field
        expected: usize,
        /// Bytes left in the input
        actual: usize,
    },

    /// Bytes remained after the last field
    #[error("{count} trailing bytes after message")]
    TrailingBytes {
        /// Number of unread bytes
        count: usize,
    },

    /// A length prefix exceeds the format limit
    #[error("length {length} exceeds maximum {max}")]
    LengthTooLarge {
        /// Declared length
        length: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// A boolean field held something other than 0 or 1
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBoolean(u8),
}

impl ProtocolError {
    /// Returns true if the input was cut short rather than malformed.
    ///
    /// Truncation is the one failure a caller buffering a stream may want to
    /// treat differently; everything else means the bytes are garbage.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}
