use bytes::Bytes;

use super::{MockIterator, StorageIterator};
use crate::iterators::two_merge_iterator::TwoMergeIterator;

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
fn test_two_merge_a_wins_ties() {
    let a = MockIterator::new(entries(&[
        (b"a", b"1.1"),
        (b"b", b"1.2"),
        (b"c", b"1.3"),
        (b"f", b"1.5"),
    ]));
    let bb = MockIterator::new(entries(&[
        (b"a", b"1.2"),
        (b"b", b"2.3"),
        (b"c", b"3.3"),
        (b"d", b"4.3"),
    ]));

    let merged = TwoMergeIterator::create(a, bb).unwrap();
    let got = collect(merged);
    assert_eq!(
        got,
        entries(&[
            (b"a", b"1.1"),
            (b"b", b"1.2"),
            (b"c", b"1.3"),
            (b"d", b"4.3"),
            (b"f", b"1.5"),
        ])
    );
}

#[test]
fn test_two_merge_b_only_when_a_exhausted() {
    let a = MockIterator::new(entries(&[(b"a", b"1")]));
    let bb = MockIterator::new(entries(&[(b"a", b"2"), (b"b", b"3"), (b"c", b"4")]));

    let merged = TwoMergeIterator::create(a, bb).unwrap();
    let got = collect(merged);
    assert_eq!(got, entries(&[(b"a", b"1"), (b"b", b"3"), (b"c", b"4")]));
}

#[test]
fn test_two_merge_empty_both() {
    let a: MockIterator = MockIterator::new(vec![]);
    let bb: MockIterator = MockIterator::new(vec![]);
    let merged = TwoMergeIterator::create(a, bb).unwrap();
    assert!(!merged.is_valid());
}
