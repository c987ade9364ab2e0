use bytes::BufMut;

use super::{Block, COUNT_SIZE, DATA_LEN_SIZE, OFFSET_SIZE};

/// Incrementally builds a [`Block`] by appending entries in ascending-key
/// order.
pub struct BlockBuilder {
    block_size: usize,
    data: Vec<u8>,
    offsets: Vec<u16>,
}

impl BlockBuilder {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            data: Vec::new(),
            offsets: Vec::new(),
        }
    }

    fn encoded_size(&self) -> usize {
        COUNT_SIZE + self.offsets.len() * OFFSET_SIZE + DATA_LEN_SIZE + self.data.len()
    }

    /// Appends `key`/`value`. Returns `false` without mutating the builder
    /// when doing so would push the encoded block past `block_size` and the
    /// builder already holds an entry. A builder with no entries yet always
    /// accepts its first pair, however large, so a single oversized entry
    /// still gets a block of its own rather than being silently dropped.
    #[must_use]
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> bool {
        assert!(!key.is_empty(), "block entries must have a non-empty key");

        let entry_len = 2 + key.len() + 2 + value.len();
        let projected = self.encoded_size() + entry_len + OFFSET_SIZE;

        if !self.is_empty() && projected > self.block_size {
            return false;
        }

        self.offsets.push(self.data.len() as u16);
        self.data.put_u16(key.len() as u16);
        self.data.put_slice(key);
        self.data.put_u16(value.len() as u16);
        self.data.put_slice(value);

        true
    }

    /// True if no key-value pair has been added yet.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn build(self) -> Block {
        Block {
            data: self.data,
            offsets: self.offsets,
        }
    }

    /// Current encoded size, used by the SST builder to decide when to
    /// finish the block in progress.
    pub fn size(&self) -> usize {
        self.encoded_size()
    }
}
