use std::ops::Bound;
use std::time::Duration;

use tempfile::tempdir;

use crate::iterators::StorageIterator;
use crate::lsm_storage::Storage;
use crate::options::StorageOptions;

/// Initializes a `tracing` subscriber driven by `RUST_LOG`, once per test
/// binary, so background-loop logs are visible when debugging a failure.
/// Safe to call from every test; failures to init (e.g. already set) are
/// ignored.
pub(crate) fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

fn fast_options() -> StorageOptions {
    StorageOptions {
        block_size: 4096,
        memtable_rotate_key_threshold: 1000,
        memtable_rotate_byte_threshold: 1 << 20,
        loop_tick: Duration::from_millis(10),
        l0_compact_threshold: 2,
    }
}

#[test]
fn test_fresh_storage_put_then_get() {
    let dir = tempdir().unwrap();
    let storage = Storage::open(dir.path()).unwrap();
    storage.put(b"k", b"v").unwrap();
    assert_eq!(storage.get(b"k").unwrap().as_deref(), Some(&b"v"[..]));
}

#[test]
fn test_rotation_preserves_latest_value_per_key() {
    init_tracing();
    let dir = tempdir().unwrap();
    let storage = Storage::open_with_options(dir.path(), fast_options()).unwrap();

    for i in 0..1001u32 {
        storage.put(format!("key{i:05}").as_bytes(), b"initial").unwrap();
    }
    for i in 0..1001u32 {
        storage
            .put(format!("key{i:05}").as_bytes(), format!("updated{i}").as_bytes())
            .unwrap();
    }

    std::thread::sleep(Duration::from_millis(200));

    for i in 0..1001u32 {
        let got = storage.get(format!("key{i:05}").as_bytes()).unwrap();
        assert_eq!(got.as_deref(), Some(format!("updated{i}").as_bytes()));
    }
}

#[test]
fn test_scan_merges_memtable_and_flushed_ssts() {
    init_tracing();
    let dir = tempdir().unwrap();
    let storage = Storage::open_with_options(dir.path(), fast_options()).unwrap();

    for i in 0..2000u32 {
        storage.put(format!("k{i:05}").as_bytes(), b"v").unwrap();
    }
    std::thread::sleep(Duration::from_millis(200));

    storage.put(b"k00000", b"overwritten").unwrap();
    storage.delete(b"k00001").unwrap();

    let mut iter = storage
        .scan(Bound::Included(b"k00000"), Bound::Included(b"k00005"))
        .unwrap();

    assert!(iter.is_valid());
    assert_eq!(iter.key(), b"k00000");
    assert_eq!(iter.value(), b"overwritten");
    iter.next().unwrap();

    assert_eq!(iter.key(), b"k00002");
    iter.next().unwrap();
    assert_eq!(iter.key(), b"k00003");
    iter.next().unwrap();
    assert_eq!(iter.key(), b"k00004");
    iter.next().unwrap();
    assert_eq!(iter.key(), b"k00005");
    iter.next().unwrap();
    assert!(!iter.is_valid());
}

#[test]
fn test_close_is_graceful() {
    let dir = tempdir().unwrap();
    let storage = Storage::open_with_options(dir.path(), fast_options()).unwrap();
    storage.put(b"k", b"v").unwrap();
    storage.close();
}
