use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Result;
use arc_swap::ArcSwap;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::block::Block;
use crate::iterators::merge_iterator::MergeIterator;
use crate::iterators::two_merge_iterator::TwoMergeIterator;
use crate::iterators::StorageIterator;
use crate::lsm_iterator::{FusedIterator, LsmIterator};
use crate::mem_table::MemTable;
use crate::options::StorageOptions;
use crate::table::{SsTable, SsTableBuilder, SsTableIterator};

/// Process-wide cache of decoded blocks, shared across every open SST.
pub type BlockCache = moka::sync::Cache<(usize, usize), Arc<Block>>;

/// The coordinator tuple: active memtable, sealed-but-unflushed memtables
/// (oldest first), and L0 SSTs (newest first).
#[derive(Clone)]
struct StorageState {
    memtable: Arc<MemTable>,
    imm_memtables: Vec<Arc<MemTable>>,
    l0_sstables: Vec<Arc<SsTable>>,
    next_sst_id: usize,
}

impl StorageState {
    fn create() -> Self {
        Self {
            memtable: Arc::new(MemTable::create()),
            imm_memtables: Vec::new(),
            l0_sstables: Vec::new(),
            next_sst_id: 0,
        }
    }
}

/// An embedded, LSM-tree organized key-value store.
///
/// Reads take a lock-free snapshot of the coordinator state; writes go
/// straight to the active memtable's own internal map. A background thread
/// periodically rotates the memtable, flushes sealed memtables to L0, and
/// compacts the oldest L0 pair.
pub struct Storage {
    state: Arc<ArcSwap<StorageState>>,
    write_lock: Arc<Mutex<()>>,
    dir: PathBuf,
    cache: Arc<BlockCache>,
    shutdown: flume::Sender<()>,
    background: Option<JoinHandle<()>>,
}

impl Storage {
    /// Opens (creating if absent) a storage directory with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, StorageOptions::default())
    }

    pub fn open_with_options(path: impl AsRef<Path>, options: StorageOptions) -> Result<Self> {
        let dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!(?options, dir = %dir.display(), "opening storage");

        let state = Arc::new(ArcSwap::from_pointee(StorageState::create()));
        let cache = Arc::new(BlockCache::new(1 << 20));
        let write_lock = Arc::new(Mutex::new(()));
        let (shutdown_tx, shutdown_rx) = flume::bounded(0);

        let background = std::thread::spawn({
            let state = state.clone();
            let write_lock = write_lock.clone();
            let dir = dir.clone();
            let cache = cache.clone();
            move || run_background_loop(state, write_lock, dir, cache, options, shutdown_rx)
        });

        Ok(Self {
            state,
            write_lock,
            dir,
            cache,
            shutdown: shutdown_tx,
            background: Some(background),
        })
    }

    fn snapshot(&self) -> Arc<StorageState> {
        self.state.load_full()
    }

    /// Records `key => value` in the active memtable.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        assert!(!key.is_empty(), "key cannot be empty");
        assert!(!value.is_empty(), "value cannot be empty");
        self.snapshot()
            .memtable
            .put(Bytes::copy_from_slice(key), Bytes::copy_from_slice(value));
        Ok(())
    }

    /// Equivalent to `put(key, b"")`: records a tombstone.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        assert!(!key.is_empty(), "key cannot be empty");
        self.snapshot().memtable.put(Bytes::copy_from_slice(key), Bytes::new());
        Ok(())
    }

    /// Looks up `key` across the active memtable, immutable memtables
    /// (newest first), then L0 SSTs (newest first). A tombstone (zero-length
    /// value) is surfaced as "not found".
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        Ok(self.get_raw(key)?.filter(|v| !v.is_empty()))
    }

    fn get_raw(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let snapshot = self.snapshot();

        if let Some(v) = snapshot.memtable.get(key) {
            return Ok(Some(v));
        }

        for memtable in snapshot.imm_memtables.iter().rev() {
            if let Some(v) = memtable.get(key) {
                return Ok(Some(v));
            }
        }

        for sst in &snapshot.l0_sstables {
            let iter = SsTableIterator::create_and_seek_to_key(sst.clone(), key)?;
            if iter.is_valid() && iter.key() == key {
                return Ok(Some(Bytes::copy_from_slice(iter.value())));
            }
        }

        Ok(None)
    }

    /// Merges `{active, imm newest->oldest, L0 newest->oldest}` bounded to
    /// `[lower, upper]`, surfacing the highest-priority value per key and
    /// filtering tombstones.
    pub fn scan(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> Result<FusedIterator<LsmIterator>> {
        let snapshot = self.snapshot();

        let mut mem_iters = vec![Box::new(snapshot.memtable.scan(lower, upper))];
        mem_iters.extend(
            snapshot
                .imm_memtables
                .iter()
                .rev()
                .map(|m| Box::new(m.scan(lower, upper))),
        );

        let sst_iters = snapshot
            .l0_sstables
            .iter()
            .map(|sst| SsTableIterator::by_range(sst.clone(), lower, upper).map(Box::new))
            .collect::<Result<Vec<_>>>()?;

        let merged = TwoMergeIterator::create(
            MergeIterator::create(mem_iters),
            MergeIterator::create(sst_iters),
        )?;

        Ok(FusedIterator::new(LsmIterator::new(merged)?))
    }

    /// Signals the background loop to stop and waits for it to exit.
    pub fn close(mut self) {
        self.shutdown_background();
    }

    fn shutdown_background(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.background.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        self.shutdown_background();
    }
}

fn run_background_loop(
    state: Arc<ArcSwap<StorageState>>,
    write_lock: Arc<Mutex<()>>,
    dir: PathBuf,
    cache: Arc<BlockCache>,
    options: StorageOptions,
    shutdown: flume::Receiver<()>,
) {
    loop {
        match shutdown.recv_timeout(options.loop_tick) {
            Ok(()) => {
                tracing::debug!("background loop received shutdown signal");
                return;
            }
            Err(flume::RecvTimeoutError::Disconnected) => return,
            Err(flume::RecvTimeoutError::Timeout) => {}
        }

        rotate_if_needed(&state, &write_lock, &options);

        if let Err(err) = flush_oldest_immutable(&state, &write_lock, &dir, &cache, &options) {
            tracing::warn!(error = %err, "flush failed, will retry next tick");
        }

        if let Err(err) = compact_l0(&state, &write_lock, &dir, &cache, &options) {
            tracing::warn!(error = %err, "compaction failed, will retry next tick");
        }
    }
}

/// Phase 1: seal the active memtable onto the immutable list once it
/// crosses either threshold.
fn rotate_if_needed(state: &Arc<ArcSwap<StorageState>>, write_lock: &Mutex<()>, options: &StorageOptions) {
    let snapshot = state.load_full();
    if snapshot.memtable.len() <= options.memtable_rotate_key_threshold
        && snapshot.memtable.size() <= options.memtable_rotate_byte_threshold
    {
        return;
    }

    let _guard = write_lock.lock();
    let mut next = (*state.load_full()).clone();
    let sealed = std::mem::replace(&mut next.memtable, Arc::new(MemTable::create()));
    let (keys, bytes) = (sealed.len(), sealed.size());
    next.imm_memtables.push(sealed);
    state.store(Arc::new(next));
    tracing::info!(keys, bytes, "rotated memtable");
}

/// Phase 2: flush the oldest sealed memtable to a new L0 SST. The SST is
/// built before the write lock is taken; the lock only guards the pointer
/// swap.
fn flush_oldest_immutable(
    state: &Arc<ArcSwap<StorageState>>,
    write_lock: &Mutex<()>,
    dir: &Path,
    cache: &Arc<BlockCache>,
    options: &StorageOptions,
) -> Result<()> {
    let (memtable, sst_id) = {
        let snapshot = state.load_full();
        match snapshot.imm_memtables.first() {
            Some(m) => (m.clone(), snapshot.next_sst_id),
            None => return Ok(()),
        }
    };

    let builder = memtable.to_sst(options.block_size);
    let path = dir.join(format!("{sst_id}.sst"));
    let sstable = Arc::new(builder.build(sst_id, Some(cache.clone()), &path)?);

    let _guard = write_lock.lock();
    let mut next = (*state.load_full()).clone();
    if next.imm_memtables.is_empty() {
        return Ok(());
    }
    next.imm_memtables.remove(0);
    next.l0_sstables.insert(0, sstable);
    next.next_sst_id += 1;
    state.store(Arc::new(next));
    tracing::info!(sst_id, "flushed memtable to L0");

    Ok(())
}

/// Phase 3: compact the two oldest (tail-most) L0 SSTs into one, guarded by
/// a compare-and-swap on their ids so a racing flush can't be clobbered.
fn compact_l0(
    state: &Arc<ArcSwap<StorageState>>,
    write_lock: &Mutex<()>,
    dir: &Path,
    cache: &Arc<BlockCache>,
    options: &StorageOptions,
) -> Result<()> {
    let snapshot = state.load_full();
    let len = snapshot.l0_sstables.len();
    if len < options.l0_compact_threshold || len < 2 {
        return Ok(());
    }

    // Tail-most pair: `newer` is closer to the head (higher priority),
    // `older` is the list's last (oldest) entry.
    let newer = snapshot.l0_sstables[len - 2].clone();
    let older = snapshot.l0_sstables[len - 1].clone();
    let expected_ids = (newer.id(), older.id());

    let sst_id = snapshot.next_sst_id;
    let path = dir.join(format!("{sst_id}.sst"));

    let a = SsTableIterator::create_and_seek_to_first(newer)?;
    let b = SsTableIterator::create_and_seek_to_first(older)?;
    let mut merged = TwoMergeIterator::create(a, b)?;

    let mut builder = SsTableBuilder::new(options.block_size);
    while merged.is_valid() {
        builder.add(merged.key(), merged.value());
        merged.next()?;
    }
    let new_sst = Arc::new(builder.build(sst_id, Some(cache.clone()), &path)?);

    let _guard = write_lock.lock();
    let mut next = (*state.load_full()).clone();
    let len = next.l0_sstables.len();
    let cas_ok = len >= 2
        && next.l0_sstables[len - 2].id() == expected_ids.0
        && next.l0_sstables[len - 1].id() == expected_ids.1;

    if !cas_ok {
        drop(new_sst);
        let _ = std::fs::remove_file(&path);
        tracing::warn!("compaction CAS mismatch, discarding built sst");
        return Ok(());
    }

    next.l0_sstables.truncate(len - 2);
    next.l0_sstables.push(new_sst);
    next.next_sst_id += 1;
    state.store(Arc::new(next));

    let _ = std::fs::remove_file(dir.join(format!("{}.sst", expected_ids.0)));
    let _ = std::fs::remove_file(dir.join(format!("{}.sst", expected_ids.1)));
    tracing::info!(new_sst_id = sst_id, "compacted two L0 SSTs");

    Ok(())
}
