use std::ops::Bound;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;

use super::SsTable;
use crate::block::BlockIterator;
use crate::iterators::StorageIterator;

/// Walks an SST's entries in key order via its block iterators.
pub struct SsTableIterator {
    table: Arc<SsTable>,
    blk_idx: usize,
    iter: BlockIterator,
    upper: Bound<Bytes>,
}

impl SsTableIterator {
    fn first_block(table: &Arc<SsTable>) -> Result<(usize, BlockIterator)> {
        let block = table.read_block_cached(0)?;
        Ok((0, BlockIterator::create_and_seek_to_first(block)))
    }

    /// Creates an iterator seeked to the first entry in the first block.
    pub fn create_and_seek_to_first(table: Arc<SsTable>) -> Result<Self> {
        let (blk_idx, iter) = Self::first_block(&table)?;
        Ok(Self {
            table,
            blk_idx,
            iter,
            upper: Bound::Unbounded,
        })
    }

    pub fn seek_to_first(&mut self) -> Result<()> {
        let (blk_idx, iter) = Self::first_block(&self.table)?;
        self.blk_idx = blk_idx;
        self.iter = iter;
        Ok(())
    }

    fn locate_key(table: &Arc<SsTable>, key: &[u8]) -> Result<(usize, BlockIterator)> {
        let mut blk_idx = table.find_block_idx(key);
        let block = table.read_block_cached(blk_idx)?;
        let mut iter = BlockIterator::create_and_seek_to_key(block, key);

        if !iter.is_valid() {
            blk_idx += 1;
            if blk_idx < table.num_of_blocks() {
                let block = table.read_block_cached(blk_idx)?;
                iter = BlockIterator::create_and_seek_to_first(block);
            }
        }

        Ok((blk_idx, iter))
    }

    /// Creates an iterator seeked to the first key >= `key`.
    pub fn create_and_seek_to_key(table: Arc<SsTable>, key: &[u8]) -> Result<Self> {
        let (blk_idx, iter) = Self::locate_key(&table, key)?;
        Ok(Self {
            table,
            blk_idx,
            iter,
            upper: Bound::Unbounded,
        })
    }

    pub fn seek_to_key(&mut self, key: &[u8]) -> Result<()> {
        let (blk_idx, iter) = Self::locate_key(&self.table, key)?;
        self.blk_idx = blk_idx;
        self.iter = iter;
        Ok(())
    }

    /// Creates an iterator bounded to `[lower, upper)`/`[lower, upper]`.
    pub fn by_range(table: Arc<SsTable>, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> Result<Self> {
        let mut this = match lower {
            Bound::Included(lo) => Self::create_and_seek_to_key(table, lo)?,
            Bound::Excluded(lo) => {
                let mut this = Self::create_and_seek_to_key(table, lo)?;
                if this.iter.is_valid() && this.iter.key().as_ref() == lo {
                    this.next()?;
                }
                this
            }
            Bound::Unbounded => Self::create_and_seek_to_first(table)?,
        };
        this.upper = upper.map(Bytes::copy_from_slice);
        Ok(this)
    }

    fn in_upper_bound(&self) -> bool {
        match &self.upper {
            Bound::Included(hi) => self.iter.key().as_ref() <= hi.as_ref(),
            Bound::Excluded(hi) => self.iter.key().as_ref() < hi.as_ref(),
            Bound::Unbounded => true,
        }
    }
}

impl StorageIterator for SsTableIterator {
    fn key(&self) -> &[u8] {
        self.iter.key().as_ref()
    }

    fn value(&self) -> &[u8] {
        self.iter.value().as_ref()
    }

    fn is_valid(&self) -> bool {
        self.iter.is_valid() && self.in_upper_bound()
    }

    fn next(&mut self) -> Result<()> {
        self.iter.next();

        if !self.iter.is_valid() {
            self.blk_idx += 1;
            if self.blk_idx < self.table.num_of_blocks() {
                let block = self.table.read_block_cached(self.blk_idx)?;
                self.iter = BlockIterator::create_and_seek_to_first(block);
            }
        }

        Ok(())
    }
}
