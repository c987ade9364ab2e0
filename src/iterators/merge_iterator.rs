use std::cmp;
use std::collections::BinaryHeap;

use anyhow::Result;

use super::StorageIterator;

/// Wraps a source iterator with its priority (list position); lower `idx` =
/// higher priority. `BinaryHeap` is a max-heap, so ordering is reversed to
/// make it pop the smallest key (ties broken toward the lowest `idx`).
struct IterWrapper<I: StorageIterator> {
    idx: usize,
    inner: Box<I>,
}

impl<I: StorageIterator> PartialEq for IterWrapper<I> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == cmp::Ordering::Equal
    }
}

impl<I: StorageIterator> Eq for IterWrapper<I> {}

impl<I: StorageIterator> PartialOrd for IterWrapper<I> {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<I: StorageIterator> Ord for IterWrapper<I> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        match self.inner.key().cmp(other.inner.key()) {
            cmp::Ordering::Equal => self.idx.cmp(&other.idx),
            ord => ord,
        }
        .reverse()
    }
}

/// Merges multiple iterators of the same type into one ordered stream. When
/// the same key occurs in more than one source, the source with the
/// smallest index (highest priority) wins.
pub struct MergeIterator<I: StorageIterator> {
    iters: BinaryHeap<IterWrapper<I>>,
    current: Option<IterWrapper<I>>,
}

impl<I: StorageIterator> MergeIterator<I> {
    pub fn create(iters: Vec<Box<I>>) -> Self {
        let mut heap: BinaryHeap<IterWrapper<I>> = iters
            .into_iter()
            .enumerate()
            .filter(|(_, iter)| iter.is_valid())
            .map(|(idx, inner)| IterWrapper { idx, inner })
            .collect();
        let current = heap.pop();

        Self {
            iters: heap,
            current,
        }
    }
}

impl<I: StorageIterator> StorageIterator for MergeIterator<I> {
    fn key(&self) -> &[u8] {
        self.current.as_ref().unwrap().inner.key()
    }

    fn value(&self) -> &[u8] {
        self.current.as_ref().unwrap().inner.value()
    }

    fn is_valid(&self) -> bool {
        self.current.as_ref().is_some_and(|x| x.inner.is_valid())
    }

    fn next(&mut self) -> Result<()> {
        use std::collections::binary_heap::PeekMut;

        let current_key = self.current.as_ref().unwrap().inner.key().to_vec();

        // Advance every other source past the key we're about to emit,
        // tombstone-agnostic: a deletion marker is still "the value" here.
        while let Some(mut top) = self.iters.peek_mut() {
            if top.inner.key() != current_key.as_slice() {
                break;
            }
            top.inner.next()?;
            if !top.inner.is_valid() {
                PeekMut::pop(top);
            }
        }

        self.current.as_mut().unwrap().inner.next()?;

        if self.current.as_ref().unwrap().inner.is_valid() {
            let current = self.current.take().unwrap();
            self.iters.push(current);
        } else {
            self.current = None;
        }

        if self.current.is_none() {
            self.current = self.iters.pop();
        }

        Ok(())
    }
}
