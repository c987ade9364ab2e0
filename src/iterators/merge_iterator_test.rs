use bytes::Bytes;

use super::{MockIterator, StorageIterator};
use crate::iterators::merge_iterator::MergeIterator;

fn b(x: &[u8]) -> Bytes {
    Bytes::copy_from_slice(x)
}

fn entries(pairs: &[(&[u8], &[u8])]) -> Vec<(Bytes, Bytes)> {
    pairs.iter().map(|(k, v)| (b(k), b(v))).collect()
}

fn collect(mut iter: impl StorageIterator) -> Vec<(Bytes, Bytes)> {
    let mut out = Vec::new();
    while iter.is_valid() {
        out.push((b(iter.key()), b(iter.value())));
        iter.next().unwrap();
    }
    out
}

#[test]
fn test_merge_three_sources_priority_order() {
    let a = MockIterator::new(entries(&[(b"a", b"1.1"), (b"b", b"2.1"), (b"c", b"3.1")]));
    let bb = MockIterator::new(entries(&[
        (b"a", b"1.2"),
        (b"b", b"2.2"),
        (b"c", b"3.2"),
        (b"d", b"4.2"),
    ]));
    let c = MockIterator::new(entries(&[(b"b", b"2.3"), (b"c", b"3.3"), (b"d", b"4.3")]));

    let merged = MergeIterator::create(vec![Box::new(a), Box::new(bb), Box::new(c)]);
    let got = collect(merged);
    assert_eq!(
        got,
        entries(&[(b"a", b"1.1"), (b"b", b"2.1"), (b"c", b"3.1"), (b"d", b"4.2")])
    );
}

#[test]
fn test_merge_three_sources_reverse_priority_order() {
    let a = MockIterator::new(entries(&[(b"a", b"1.1"), (b"b", b"2.1"), (b"c", b"3.1")]));
    let bb = MockIterator::new(entries(&[
        (b"a", b"1.2"),
        (b"b", b"2.2"),
        (b"c", b"3.2"),
        (b"d", b"4.2"),
    ]));
    let c = MockIterator::new(entries(&[(b"b", b"2.3"), (b"c", b"3.3"), (b"d", b"4.3")]));

    let merged = MergeIterator::create(vec![Box::new(c), Box::new(bb), Box::new(a)]);
    let got = collect(merged);
    assert_eq!(
        got,
        entries(&[(b"a", b"1.2"), (b"b", b"2.3"), (b"c", b"3.3"), (b"d", b"4.3")])
    );
}

#[test]
fn test_merge_empty_sources_are_invalid() {
    let empty: MockIterator = MockIterator::new(vec![]);
    let merged = MergeIterator::create(vec![Box::new(empty)]);
    assert!(!merged.is_valid());
}

#[test]
fn test_merge_no_sources_is_invalid() {
    let merged: MergeIterator<MockIterator> = MergeIterator::create(vec![]);
    assert!(!merged.is_valid());
}
