mod builder;
mod iterator;

pub use builder::BlockBuilder;
use bytes::{Buf, BufMut, Bytes, BytesMut};
pub use iterator::BlockIterator;

use crate::error::LsmError;

/// Two bytes hold `num_offsets`/`data_len`/each offset.
pub(crate) const COUNT_SIZE: usize = std::mem::size_of::<u16>();
pub(crate) const OFFSET_SIZE: usize = std::mem::size_of::<u16>();
pub(crate) const DATA_LEN_SIZE: usize = std::mem::size_of::<u16>();

/// The smallest unit of read and caching in the LSM tree: a sorted run of
/// key-value entries plus an offset index into them.
///
/// On-disk layout (big-endian throughout):
///
/// ```text
/// | num_offsets (u16) | offset_0 .. offset_{N-1} (u16 each) | data_len (u16) | data |
/// ```
///
/// where `data` is the concatenation of `key_len(u16) | key | value_len(u16) | value`
/// entries in ascending-key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    data: Vec<u8>,
    offsets: Vec<u16>,
}

impl Block {
    /// Serialize to the layout above. Panics (via `debug_assert!`) if the
    /// block was built large enough to overflow a 16-bit length field —
    /// that's a `BlockBuilder` bug, since `add` is supposed to prevent it.
    pub fn encode(&self) -> Bytes {
        debug_assert!(self.offsets.len() < u16::MAX as usize);
        debug_assert!(self.data.len() < u16::MAX as usize);

        let mut buf = BytesMut::with_capacity(
            COUNT_SIZE + self.offsets.len() * OFFSET_SIZE + DATA_LEN_SIZE + self.data.len(),
        );
        buf.put_u16(self.offsets.len() as u16);
        for offset in &self.offsets {
            buf.put_u16(*offset);
        }
        buf.put_u16(self.data.len() as u16);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Parse a block from its encoded bytes. The input may be released or
    /// reused once this returns — every field here is copied out of it.
    pub fn decode(data: &[u8]) -> Result<Self, LsmError> {
        let mut buf = data;
        if buf.remaining() < COUNT_SIZE {
            return Err(LsmError::MalformedBlock);
        }
        let num_offsets = buf.get_u16() as usize;

        if buf.remaining() < num_offsets * OFFSET_SIZE + DATA_LEN_SIZE {
            return Err(LsmError::MalformedBlock);
        }
        let mut offsets = Vec::with_capacity(num_offsets);
        for _ in 0..num_offsets {
            offsets.push(buf.get_u16());
        }

        let data_len = buf.get_u16() as usize;
        if buf.remaining() != data_len {
            return Err(LsmError::MalformedBlock);
        }

        Ok(Self {
            data: buf.to_vec(),
            offsets,
        })
    }

    /// Decode the entry starting at byte offset `pos` within `data`.
    fn entry_at(&self, pos: usize) -> (&[u8], &[u8]) {
        let mut rest: &[u8] = &self.data[pos..];
        let key_len = rest.get_u16() as usize;
        let key = &rest[..key_len];
        let mut rest: &[u8] = &rest[key_len..];
        let value_len = rest.get_u16() as usize;
        let value = &rest[..value_len];
        (key, value)
    }

    fn key_at(&self, pos: usize) -> &[u8] {
        self.entry_at(pos).0
    }
}
