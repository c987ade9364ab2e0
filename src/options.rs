use std::time::Duration;

/// Tunable knobs for a [`crate::lsm_storage::Storage`] instance.
///
/// Mirrors the configuration surface spelled out for the storage
/// coordinator: block size, the two memtable-rotation thresholds, the
/// background loop's tick period, and the L0 compaction trigger.
#[derive(Clone, Debug)]
pub struct StorageOptions {
    /// Target uncompressed block size in bytes. Must be `<= 65_535`.
    pub block_size: usize,
    /// Rotate the active memtable once it holds more than this many keys.
    pub memtable_rotate_key_threshold: usize,
    /// Rotate the active memtable once its estimated byte size exceeds this.
    pub memtable_rotate_byte_threshold: usize,
    /// Period of the background rotate/flush/compact loop.
    pub loop_tick: Duration,
    /// Compact the two oldest L0 SSTs once L0 holds at least this many.
    pub l0_compact_threshold: usize,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            block_size: 4096,
            memtable_rotate_key_threshold: 1000,
            memtable_rotate_byte_threshold: 40_960,
            loop_tick: Duration::from_secs(5),
            l0_compact_threshold: 2,
        }
    }
}
