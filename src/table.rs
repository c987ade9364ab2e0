mod builder;
mod iterator;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
pub use builder::SsTableBuilder;
use bytes::{Buf, BufMut, Bytes};
pub use iterator::SsTableIterator;

use crate::block::Block;
use crate::error::LsmError;
use crate::lsm_storage::BlockCache;

const META_OFFSET_SIZE: usize = std::mem::size_of::<u32>();

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockMeta {
    /// Byte offset of this block's start within the SST file.
    pub offset: usize,
    /// Copy of the block's smallest key, for the sparse index.
    pub first_key: Bytes,
}

impl BlockMeta {
    /// `u32 offset | u16 first_key_len | first_key_bytes`, repeated with no
    /// framing count: the section ends where the caller's buffer ends.
    pub fn encode_block_meta(block_meta: &[BlockMeta], buf: &mut Vec<u8>) {
        for meta in block_meta {
            buf.put_u32(meta.offset as u32);
            buf.put_u16(meta.first_key.len() as u16);
            buf.extend_from_slice(&meta.first_key);
        }
    }

    /// Decodes until `buf` is exhausted. A truncated trailing record is
    /// `MalformedBlockMeta`, not silently dropped.
    pub fn decode_block_meta(mut buf: impl Buf) -> Result<Vec<BlockMeta>, LsmError> {
        let mut metas = Vec::new();
        while buf.has_remaining() {
            if buf.remaining() < META_OFFSET_SIZE + 2 {
                return Err(LsmError::MalformedBlockMeta);
            }
            let offset = buf.get_u32() as usize;
            let key_len = buf.get_u16() as usize;
            if buf.remaining() < key_len {
                return Err(LsmError::MalformedBlockMeta);
            }
            let first_key = buf.copy_to_bytes(key_len);
            metas.push(Self { offset, first_key });
        }
        Ok(metas)
    }
}

/// An SST's backing bytes. Loaded fully into memory on open/create; `pread`
/// in the spec sense is just a slice of this buffer.
pub struct FileObject(Bytes);

impl FileObject {
    fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>, LsmError> {
        let start = offset as usize;
        let end = start.saturating_add(len as usize);
        if end > self.0.len() {
            return Err(LsmError::MalformedBlockMeta);
        }
        Ok(self.0[start..end].to_vec())
    }

    pub fn size(&self) -> u64 {
        self.0.len() as u64
    }

    /// Creates `path` with exclusive-create semantics (fails if it already
    /// exists), writes `data`, and fsyncs.
    pub fn create(path: &Path, data: Vec<u8>) -> Result<Self> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| LsmError::FileCreate {
                path: path.display().to_string(),
                source,
            })?;
        file.write_all(&data).map_err(|source| LsmError::FileWrite {
            path: path.display().to_string(),
            source,
        })?;
        file.sync_all().map_err(|source| LsmError::FileSync {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Self(Bytes::from(data)))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|source| LsmError::FileOpen {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self(Bytes::from(data)))
    }
}

/// -------------------------------------------------------------------------------------------------------
/// |              Data Block             |             Meta Block              |          Extra          |
/// -------------------------------------------------------------------------------------------------------
/// | Data Block #1 | ... | Data Block #N | Meta Block #1 | ... | Meta Block #N | Meta Block Offset (u32) |
/// -------------------------------------------------------------------------------------------------------
pub struct SsTable {
    file: FileObject,
    id: usize,
    block_metas: Vec<BlockMeta>,
    block_meta_offset: usize,
    block_cache: Option<Arc<BlockCache>>,
}

impl SsTable {
    #[cfg(test)]
    pub(crate) fn open_for_test(file: FileObject) -> Result<Self> {
        Self::open(0, None, file)
    }

    /// Opens an SSTable from its backing bytes: read the footer to find
    /// `meta_offset`, then decode the meta section.
    pub fn open(id: usize, block_cache: Option<Arc<BlockCache>>, file: FileObject) -> Result<Self> {
        let size = file.size();
        if size < META_OFFSET_SIZE as u64 {
            return Err(LsmError::MalformedBlockMeta.into());
        }
        let footer = file.read(size - META_OFFSET_SIZE as u64, META_OFFSET_SIZE as u64)?;
        let meta_offset = u32::from_be_bytes(footer.as_slice().try_into().unwrap()) as usize;

        let meta_len = size - META_OFFSET_SIZE as u64 - meta_offset as u64;
        let meta_buf = file.read(meta_offset as u64, meta_len)?;
        let block_metas = BlockMeta::decode_block_meta(meta_buf.as_slice())?;

        Ok(Self {
            file,
            id,
            block_metas,
            block_meta_offset: meta_offset,
            block_cache,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Reads and decodes block `block_idx` directly from the file, bypassing
    /// the cache.
    pub fn read_block(&self, block_idx: usize) -> Result<Arc<Block>> {
        let lo = self.block_metas[block_idx].offset as u64;
        let hi = match self.block_metas.get(block_idx + 1) {
            Some(meta) => meta.offset as u64,
            None => self.block_meta_offset as u64,
        };

        let data = self.file.read(lo, hi - lo).map_err(|_| LsmError::ReadBlock {
            sst_id: self.id as u32,
            block_idx: block_idx as u32,
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read"),
        })?;
        Ok(Arc::new(Block::decode(&data)?))
    }

    /// Reads block `block_idx` through the shared cache. Concurrent misses
    /// may both decode; the last insert wins, which is fine since decoded
    /// blocks are value-equal.
    pub fn read_block_cached(&self, block_idx: usize) -> Result<Arc<Block>> {
        match &self.block_cache {
            Some(cache) => {
                let key = (self.id, block_idx);
                if let Some(block) = cache.get(&key) {
                    return Ok(block);
                }
                let block = self.read_block(block_idx)?;
                cache.insert(key, block.clone());
                Ok(block)
            }
            None => self.read_block(block_idx),
        }
    }

    /// Largest index `i` with `metas[i].first_key <= key`, saturating to 0
    /// when `key` is smaller than every first key and to `len - 1` when it's
    /// larger than all of them.
    pub fn find_block_idx(&self, key: &[u8]) -> usize {
        match self
            .block_metas
            .binary_search_by(|meta| meta.first_key.as_ref().cmp(key))
        {
            Ok(idx) => idx,
            Err(0) => 0,
            Err(idx) => idx - 1,
        }
    }

    pub fn num_of_blocks(&self) -> usize {
        self.block_metas.len()
    }

    /// Releases the file handle. The table must not be used afterward.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests;
