//! Decoder for the tunnel stream.
//!
//! The tunnel never reads this format; the reader lets tests and debugging
//! tools walk a response the way the client does.

use thiserror::Error;

use crate::codec::{BLOCK_LONG_MARKER, NULL_MARKER};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadError {
    #[error("unexpected end of stream: wanted {wanted} bytes at offset {offset}")]
    Truncated { offset: usize, wanted: usize },
    #[error("expected a block at offset {0}, found NULL")]
    UnexpectedNull(usize),
}

pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, wanted: usize) -> Result<&'a [u8], ReadError> {
        if self.remaining() < wanted {
            return Err(ReadError::Truncated {
                offset: self.pos,
                wanted,
            });
        }
        let out = &self.buf[self.pos..self.pos + wanted];
        self.pos += wanted;
        Ok(out)
    }

    pub fn byte(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    pub fn long(&mut self) -> Result<u32, ReadError> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn short(&mut self) -> Result<u16, ReadError> {
        let raw = self.take(2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    pub fn skip(&mut self, count: usize) -> Result<(), ReadError> {
        self.take(count).map(|_| ())
    }

    /// Reads a cell: `None` for the NULL marker, otherwise the block payload.
    pub fn cell(&mut self) -> Result<Option<&'a [u8]>, ReadError> {
        let lead = self.byte()?;
        let len = match lead {
            NULL_MARKER => return Ok(None),
            BLOCK_LONG_MARKER => self.long()? as usize,
            short => short as usize,
        };
        self.take(len).map(Some)
    }

    pub fn block(&mut self) -> Result<&'a [u8], ReadError> {
        let offset = self.pos;
        self.cell()?.ok_or(ReadError::UnexpectedNull(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireWriter;
    use proptest::prelude::*;

    fn encode_block(value: &[u8]) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.block(value);
        w.as_slice().to_vec()
    }

    #[test]
    fn block_round_trips_at_boundary_lengths() {
        for len in [0usize, 1, 253, 254, 255, 100_000] {
            let value: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let encoded = encode_block(&value);
            let mut reader = WireReader::new(&encoded);
            assert_eq!(reader.block().expect("block"), value.as_slice(), "len {len}");
            assert!(reader.is_empty(), "len {len}");
        }
    }

    #[test]
    fn null_reads_back_as_none() {
        let mut w = WireWriter::new();
        w.null().block("");
        let bytes = w.finish();
        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.cell().expect("null"), None);
        assert_eq!(reader.cell().expect("empty"), Some(&b""[..]));
    }

    #[test]
    fn block_rejects_null() {
        let mut reader = WireReader::new(&[NULL_MARKER]);
        assert_eq!(reader.block(), Err(ReadError::UnexpectedNull(0)));
    }

    #[test]
    fn truncated_long_block_is_reported() {
        let mut reader = WireReader::new(&[BLOCK_LONG_MARKER, 0, 0, 1, 0, b'x']);
        assert!(matches!(
            reader.block(),
            Err(ReadError::Truncated { offset: 5, wanted: 256 })
        ));
    }

    proptest! {
        #[test]
        fn arbitrary_blocks_round_trip(value in proptest::collection::vec(any::<u8>(), 0..1024)) {
            let encoded = encode_block(&value);
            let mut reader = WireReader::new(&encoded);
            prop_assert_eq!(reader.block().unwrap(), value.as_slice());
            prop_assert!(reader.is_empty());
        }
    }
}
