use anyhow::Result;

use crate::iterators::merge_iterator::MergeIterator;
use crate::iterators::two_merge_iterator::TwoMergeIterator;
use crate::iterators::StorageIterator;
use crate::mem_table::MemTableIterator;
use crate::table::SsTableIterator;

type LsmIteratorInner =
    TwoMergeIterator<MergeIterator<MemTableIterator>, MergeIterator<SsTableIterator>>;

/// The iterator returned by `Storage::scan`. Skips tombstones (zero-length
/// values): `Scan` only ever surfaces live entries to the caller.
pub struct LsmIterator {
    iter: LsmIteratorInner,
}

impl LsmIterator {
    pub fn new(mut iter: LsmIteratorInner) -> Result<Self> {
        Self::skip_tombstones(&mut iter)?;
        Ok(Self { iter })
    }

    fn skip_tombstones(iter: &mut LsmIteratorInner) -> Result<()> {
        while iter.is_valid() && iter.value().is_empty() {
            iter.next()?;
        }
        Ok(())
    }
}

impl StorageIterator for LsmIterator {
    fn is_valid(&self) -> bool {
        self.iter.is_valid()
    }

    fn key(&self) -> &[u8] {
        self.iter.key()
    }

    fn value(&self) -> &[u8] {
        self.iter.value()
    }

    fn next(&mut self) -> Result<()> {
        self.iter.next()?;
        Self::skip_tombstones(&mut self.iter)
    }
}

/// Wraps an iterator so that calling `next` once it's invalid is a no-op
/// instead of undefined behavior.
pub struct FusedIterator<I: StorageIterator> {
    iter: I,
}

impl<I: StorageIterator> FusedIterator<I> {
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<I: StorageIterator> StorageIterator for FusedIterator<I> {
    fn is_valid(&self) -> bool {
        self.iter.is_valid()
    }

    fn key(&self) -> &[u8] {
        self.iter.key()
    }

    fn value(&self) -> &[u8] {
        self.iter.value()
    }

    fn next(&mut self) -> Result<()> {
        if !self.iter.is_valid() {
            return Ok(());
        }
        self.iter.next()
    }
}
