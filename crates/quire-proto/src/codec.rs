//! Fixed-width big-endian field codec.
//!
//! Every format in this crate, and the pickle layer above it, is a flat
//! sequence of fixed-width integers, fixed-size byte arrays and `u32`
//! length-prefixed byte strings. [`Reader`] consumes such a sequence from an
//! untrusted slice without panicking; writing goes straight through
//! [`bytes::BufMut`].
//!
//! # Security
//!
//! - Bounds First: every read checks the remaining length before touching
//!   the input, so truncated data yields [`ProtocolError::Truncated`].
//! - Bounded Lengths: length prefixes are checked against a caller-supplied
//!   maximum before any allocation.
//! - Canonical Input: [`Reader::finish`] rejects trailing bytes, so a value
//!   has exactly one encoding. MAC and signature checks rely on this when
//!   they re-encode a parsed message.

use bytes::{Buf, BufMut};

use crate::errors::{ProtocolError, Result};

/// Cursor over untrusted bytes.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Read and check a version byte.
    pub fn read_version(&mut self, expected: u8) -> Result<()> {
        let actual = self.read_u8()?;
        if actual != expected {
            return Err(ProtocolError::UnsupportedVersion { expected, actual });
        }
        Ok(())
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    /// Read a big-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    /// Read a big-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    /// Read a strict boolean (0 or 1).
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::InvalidBoolean(other)),
        }
    }

    /// Read a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Borrow the next `len` bytes.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Borrow a `u32` length-prefixed byte string of at most `max` bytes.
    pub fn read_length_prefixed(&mut self, max: usize) -> Result<&'a [u8]> {
        let length = self.read_u32()? as usize;
        if length > max {
            return Err(ProtocolError::LengthTooLarge { length, max });
        }
        self.read_slice(length)
    }

    /// Read a `u32` element count of at most `max`.
    pub fn read_count(&mut self, max: usize) -> Result<usize> {
        let count = self.read_u32()? as usize;
        if count > max {
            return Err(ProtocolError::LengthTooLarge { length: count, max });
        }
        Ok(count)
    }

    /// Fail unless every byte was consumed.
    pub fn finish(self) -> Result<()> {
        match self.buf.len() {
            0 => Ok(()),
            count => Err(ProtocolError::TrailingBytes { count }),
        }
    }

    fn ensure(&self, expected: usize) -> Result<()> {
        if self.buf.len() < expected {
            return Err(ProtocolError::Truncated { expected, actual: self.buf.len() });
        }
        Ok(())
    }
}

/// Write a `u32` length prefix followed by `data`.
///
/// # Panics
///
/// Panics if `data` is longer than `u32::MAX`. Every caller bounds its data
/// far below that.
pub fn put_length_prefixed(dst: &mut impl BufMut, data: &[u8]) {
    put_count(dst, data.len());
    dst.put_slice(data);
}

/// Write a `u32` element count.
pub fn put_count(dst: &mut impl BufMut, count: usize) {
    let Ok(count) = u32::try_from(count) else {
        unreachable!("invariant: encoded lengths are bounded well below u32::MAX");
    };
    dst.put_u32(count);
}

/// Write a boolean as a single 0/1 byte.
pub fn put_bool(dst: &mut impl BufMut, value: bool) {
    dst.put_u8(u8::from(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_fields() {
        let bytes = [0x01, 0x00, 0x00, 0x01, 0x00, 0, 0, 0, 0, 0, 0, 0, 0x2a, 0xaa, 0xbb];
        let mut reader = Reader::new(&bytes);

        assert_eq!(reader.read_u8().unwrap(), 1);
        assert_eq!(reader.read_u32().unwrap(), 0x0000_0100);
        assert_eq!(reader.read_u64().unwrap(), 0x2a);
        assert_eq!(reader.read_array::<2>().unwrap(), [0xaa, 0xbb]);
        reader.finish().unwrap();
    }

    #[test]
    fn truncated_read_reports_lengths() {
        let mut reader = Reader::new(&[0, 0]);
        assert_eq!(reader.read_u32(), Err(ProtocolError::Truncated { expected: 4, actual: 2 }));
    }

    #[test]
    fn failed_read_consumes_nothing() {
        let mut reader = Reader::new(&[0, 0, 7]);
        assert!(reader.read_u32().is_err());
        assert_eq!(reader.remaining(), 3);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut reader = Reader::new(&[1, 2, 3]);
        reader.read_u8().unwrap();
        assert_eq!(reader.finish(), Err(ProtocolError::TrailingBytes { count: 2 }));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut reader = Reader::new(&[0x02]);
        assert_eq!(
            reader.read_version(0x03),
            Err(ProtocolError::UnsupportedVersion { expected: 0x03, actual: 0x02 })
        );
    }

    #[test]
    fn rejects_non_canonical_bool() {
        let mut reader = Reader::new(&[0, 1, 2]);
        assert!(!reader.read_bool().unwrap());
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_bool(), Err(ProtocolError::InvalidBoolean(2)));
    }

    #[test]
    fn length_prefixed_round_trip() {
        let mut wire = Vec::new();
        put_length_prefixed(&mut wire, b"hello");

        let mut reader = Reader::new(&wire);
        assert_eq!(reader.read_length_prefixed(16).unwrap(), b"hello");
        reader.finish().unwrap();
    }

    #[test]
    fn length_prefix_over_limit_is_rejected_before_reading() {
        let mut wire = Vec::new();
        wire.put_u32(1_000_000);

        let mut reader = Reader::new(&wire);
        assert_eq!(
            reader.read_length_prefixed(1024),
            Err(ProtocolError::LengthTooLarge { length: 1_000_000, max: 1024 })
        );
    }

    #[test]
    fn count_over_limit_is_rejected() {
        let mut wire = Vec::new();
        put_count(&mut wire, 9);

        let mut reader = Reader::new(&wire);
        assert_eq!(reader.read_count(8), Err(ProtocolError::LengthTooLarge { length: 9, max: 8 }));
    }
}
