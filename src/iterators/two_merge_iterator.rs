use anyhow::Result;
use bytes::Bytes;

use super::StorageIterator;

/// Merges two iterators of possibly different concrete types. On a shared
/// key, only `A`'s entry is emitted (the skip-B invariant: `B` is advanced
/// past any key equal to `A`'s current key before state is exposed).
pub struct TwoMergeIterator<A: StorageIterator, B: StorageIterator> {
    a: A,
    b: B,
    key: Bytes,
    value: Bytes,
}

impl<A: StorageIterator, B: StorageIterator> TwoMergeIterator<A, B> {
    pub fn create(a: A, b: B) -> Result<Self> {
        let mut this = Self {
            a,
            b,
            key: Bytes::new(),
            value: Bytes::new(),
        };
        this.skip_b()?;
        this.load_current();
        Ok(this)
    }

    fn choose_a(&self) -> bool {
        self.a.is_valid() && (!self.b.is_valid() || self.a.key() < self.b.key())
    }

    /// Advances `b` past any entry whose key equals `a`'s current key.
    fn skip_b(&mut self) -> Result<()> {
        while self.a.is_valid() && self.b.is_valid() && self.a.key() == self.b.key() {
            self.b.next()?;
        }
        Ok(())
    }

    fn load_current(&mut self) {
        if self.choose_a() {
            self.key = Bytes::copy_from_slice(self.a.key());
            self.value = Bytes::copy_from_slice(self.a.value());
        } else if self.b.is_valid() {
            self.key = Bytes::copy_from_slice(self.b.key());
            self.value = Bytes::copy_from_slice(self.b.value());
        } else {
            self.key = Bytes::new();
            self.value = Bytes::new();
        }
    }
}

impl<A: StorageIterator, B: StorageIterator> StorageIterator for TwoMergeIterator<A, B> {
    fn key(&self) -> &[u8] {
        &self.key
    }

    fn value(&self) -> &[u8] {
        &self.value
    }

    fn is_valid(&self) -> bool {
        self.a.is_valid() || self.b.is_valid()
    }

    fn next(&mut self) -> Result<()> {
        if self.choose_a() {
            self.a.next()?;
        } else if self.b.is_valid() {
            self.b.next()?;
        }
        self.skip_b()?;
        self.load_current();
        Ok(())
    }
}
