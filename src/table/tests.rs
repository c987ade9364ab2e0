use tempfile::tempdir;

use super::builder::SsTableBuilder;
use super::{FileObject, SsTable};
use crate::iterators::StorageIterator;

fn key_of(idx: usize) -> Vec<u8> {
    format!("key_{:08}", idx).into_bytes()
}

fn value_of(idx: usize) -> Vec<u8> {
    format!("value_{:08}", idx).into_bytes()
}

fn build_sst(path: &std::path::Path, count: usize, block_size: usize) -> SsTable {
    let mut builder = SsTableBuilder::new(block_size);
    for idx in 0..count {
        builder.add(&key_of(idx), &value_of(idx));
    }
    builder.build_for_test(path).unwrap()
}

#[test]
fn test_sst_build_single_key() {
    let dir = tempdir().unwrap();
    let sst = build_sst(&dir.path().join("1.sst"), 1, 4096);
    assert_eq!(sst.num_of_blocks(), 1);
}

#[test]
fn test_sst_iterate_in_order() {
    let dir = tempdir().unwrap();
    let sst = std::sync::Arc::new(build_sst(&dir.path().join("1.sst"), 1000, 4096));
    assert!(sst.num_of_blocks() > 1, "1000 entries should span multiple blocks");

    let mut iter = super::iterator::SsTableIterator::create_and_seek_to_first(sst).unwrap();
    for i in 0..1000 {
        assert!(iter.is_valid());
        assert_eq!(iter.key(), &key_of(i)[..]);
        assert_eq!(iter.value(), &value_of(i)[..]);
        iter.next().unwrap();
    }
    assert!(!iter.is_valid());
}

#[test]
fn test_sst_seek_to_key() {
    let dir = tempdir().unwrap();
    let sst = std::sync::Arc::new(build_sst(&dir.path().join("1.sst"), 1000, 4096));

    let mut iter =
        super::iterator::SsTableIterator::create_and_seek_to_key(sst.clone(), &key_of(500))
            .unwrap();
    assert!(iter.is_valid());
    assert_eq!(iter.key(), &key_of(500)[..]);

    // A key between two entries lands on the next one.
    let between = format!("key_{:08}_x", 500).into_bytes();
    iter.seek_to_key(&between).unwrap();
    assert!(iter.is_valid());
    assert_eq!(iter.key(), &key_of(501)[..]);

    // Past the last key, the iterator is invalid.
    iter.seek_to_key(b"zzzzzzzzzz").unwrap();
    assert!(!iter.is_valid());
}

#[test]
fn test_sst_reopen_preserves_meta() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("1.sst");
    let built = build_sst(&path, 1000, 4096);
    let metas_before = built.num_of_blocks();
    built.close();

    let reopened = SsTable::open(0, None, FileObject::open(&path).unwrap()).unwrap();
    assert_eq!(reopened.num_of_blocks(), metas_before);

    let mut iter = super::iterator::SsTableIterator::create_and_seek_to_first(
        std::sync::Arc::new(reopened),
    )
    .unwrap();
    assert_eq!(iter.key(), &key_of(0)[..]);
    let _ = iter.next();
}

#[test]
fn test_sst_create_fails_if_exists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("1.sst");
    build_sst(&path, 10, 4096);
    let builder = SsTableBuilder::new(4096);
    assert!(builder.build_for_test(&path).is_err());
}
