use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use bytes::{BufMut, Bytes};

use super::{BlockMeta, FileObject, SsTable};
use crate::block::BlockBuilder;
use crate::lsm_storage::BlockCache;

/// Rolls entries through a sequence of block builders, producing a complete
/// SST file.
pub struct SsTableBuilder {
    builder: BlockBuilder,
    first_key: Vec<u8>,
    blocks: Vec<Bytes>,
    data_size: usize,
    meta: Vec<BlockMeta>,
    block_size: usize,
}

impl SsTableBuilder {
    /// Creates a builder targeting `block_size` per block.
    pub fn new(block_size: usize) -> Self {
        Self {
            builder: BlockBuilder::new(block_size),
            first_key: Vec::new(),
            blocks: Vec::new(),
            data_size: 0,
            meta: Vec::new(),
            block_size,
        }
    }

    /// Adds a key-value pair, splitting into a new block when the current
    /// one is full.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        if self.first_key.is_empty() {
            self.first_key = key.to_vec();
        }

        if self.builder.add(key, value) {
            return;
        }

        self.finish_block();
        self.first_key = key.to_vec();
        assert!(
            self.builder.add(key, value),
            "a fresh block must accept its first entry"
        );
    }

    fn finish_block(&mut self) {
        let builder = std::mem::replace(&mut self.builder, BlockBuilder::new(self.block_size));
        let encoded = builder.build().encode();

        self.meta.push(BlockMeta {
            offset: self.data_size,
            first_key: Bytes::copy_from_slice(&self.first_key),
        });
        self.data_size += encoded.len();
        self.blocks.push(encoded);
    }

    /// Estimated encoded size. Dominated by data blocks, so meta/footer
    /// overhead is not accounted for.
    pub fn estimated_size(&self) -> usize {
        self.data_size + self.builder.size()
    }

    /// Finishes any pending block, writes the file, and returns the
    /// resulting `SsTable`. Fails if `path` already exists.
    pub fn build(
        mut self,
        id: usize,
        block_cache: Option<Arc<BlockCache>>,
        path: impl AsRef<Path>,
    ) -> Result<SsTable> {
        if !self.builder.is_empty() {
            self.finish_block();
        }

        let mut buf = Vec::with_capacity(self.data_size + self.meta.len() * 32 + 4);
        for block in &self.blocks {
            buf.extend_from_slice(block);
        }
        let meta_offset = buf.len() as u32;
        BlockMeta::encode_block_meta(&self.meta, &mut buf);
        buf.put_u32(meta_offset);

        let file = FileObject::create(path.as_ref(), buf)?;
        Ok(SsTable {
            file,
            id,
            block_metas: self.meta,
            block_meta_offset: meta_offset as usize,
            block_cache,
        })
    }

    #[cfg(test)]
    pub(crate) fn build_for_test(self, path: impl AsRef<Path>) -> Result<SsTable> {
        self.build(0, None, path)
    }
}
