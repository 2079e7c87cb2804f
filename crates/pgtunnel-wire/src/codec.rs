//! Write-only encoder for tunnel responses.

use bytes::{BufMut, Bytes, BytesMut};

/// Blocks shorter than this carry a single length byte.
pub const SHORT_BLOCK_LIMIT: usize = 254;
/// Prefix for blocks of [`SHORT_BLOCK_LIMIT`] bytes or more.
pub const BLOCK_LONG_MARKER: u8 = 0xFE;
/// Encodes SQL NULL. Never followed by a payload.
pub const NULL_MARKER: u8 = 0xFF;

/// Accumulates one response body.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn long(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    pub fn short(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    /// Appends `count` zero bytes of padding.
    pub fn dummy(&mut self, count: usize) -> &mut Self {
        self.buf.put_bytes(0, count);
        self
    }

    pub fn byte(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    /// Appends a length-prefixed block.
    pub fn block(&mut self, value: impl AsRef<[u8]>) -> &mut Self {
        let value = value.as_ref();
        let len = value.len();
        if len < SHORT_BLOCK_LIMIT {
            self.buf.put_u8(len as u8);
        } else {
            // Result sets are materialized in memory, so a single cell never
            // approaches 4 GiB in practice.
            debug_assert!(u32::try_from(len).is_ok());
            self.buf.put_u8(BLOCK_LONG_MARKER);
            self.buf.put_u32(len as u32);
        }
        self.buf.put_slice(value);
        self
    }

    pub fn null(&mut self) -> &mut Self {
        self.buf.put_u8(NULL_MARKER);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut w = WireWriter::new();
        w.long(1111).short(201);
        assert_eq!(w.as_slice(), &[0, 0, 0x04, 0x57, 0, 0xC9]);
    }

    #[test]
    fn dummy_writes_zeroes() {
        let mut w = WireWriter::new();
        w.dummy(6);
        assert_eq!(w.as_slice(), &[0; 6]);
    }

    #[test]
    fn short_block_has_single_length_byte() {
        let mut w = WireWriter::new();
        w.block("abc");
        assert_eq!(w.as_slice(), b"\x03abc");
    }

    #[test]
    fn block_at_limit_uses_long_form() {
        let value = vec![b'x'; SHORT_BLOCK_LIMIT];
        let mut w = WireWriter::new();
        w.block(&value);
        let out = w.as_slice();
        assert_eq!(out[0], BLOCK_LONG_MARKER);
        assert_eq!(&out[1..5], &254u32.to_be_bytes());
        assert_eq!(&out[5..], value.as_slice());
    }

    #[test]
    fn null_is_distinct_from_empty_block() {
        let mut null = WireWriter::new();
        null.null();
        let mut empty = WireWriter::new();
        empty.block("");
        assert_eq!(null.as_slice(), &[NULL_MARKER]);
        assert_eq!(empty.as_slice(), &[0]);
        assert_ne!(null.as_slice(), empty.as_slice());
    }
}
