use std::sync::Arc;

use bytes::Bytes;

use super::Block;

/// Iterates the entries of a single block in key order.
pub struct BlockIterator {
    block: Arc<Block>,
    key: Bytes,
    value: Bytes,
    idx: usize,
}

impl BlockIterator {
    fn new(block: Arc<Block>) -> Self {
        Self {
            block,
            key: Bytes::new(),
            value: Bytes::new(),
            idx: 0,
        }
    }

    /// Creates a block iterator and seeks to the first entry.
    pub fn create_and_seek_to_first(block: Arc<Block>) -> Self {
        let mut iter = Self::new(block);
        iter.seek_to_first();
        iter
    }

    /// Creates a block iterator and seeks to the first key >= `key`.
    pub fn create_and_seek_to_key(block: Arc<Block>, key: &[u8]) -> Self {
        let mut iter = Self::new(block);
        iter.seek_to_key(key);
        iter
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// An empty key means the iterator has run past the last entry.
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty()
    }

    pub fn seek_to_first(&mut self) {
        self.seek_to(0);
    }

    pub fn next(&mut self) {
        self.seek_to(self.idx + 1);
    }

    fn seek_to(&mut self, idx: usize) {
        if idx >= self.block.offsets.len() {
            self.idx = idx;
            self.key.clear();
            self.value.clear();
            return;
        }
        self.idx = idx;
        let pos = self.block.offsets[idx] as usize;
        let (key, value) = self.block.entry_at(pos);
        self.key = Bytes::copy_from_slice(key);
        self.value = Bytes::copy_from_slice(value);
    }

    /// Seeks to the first key >= `key` (lower bound). Assumes entries were
    /// added to the block in ascending-key order.
    pub fn seek_to_key(&mut self, key: &[u8]) {
        let mut lo = 0usize;
        let mut hi = self.block.offsets.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let pos = self.block.offsets[mid] as usize;
            if self.block.key_at(pos) < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        self.seek_to(lo);
    }
}
