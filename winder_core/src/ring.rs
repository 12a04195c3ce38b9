//! Fixed-capacity FIFO used for sample windows and parameter history.

use std::collections::VecDeque;
use std::ops::Range;

/// Pushing into a full buffer evicts the oldest element.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: VecDeque<T>,
    cap: usize,
}

impl<T> RingBuffer<T> {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            buf: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append `v`, returning the evicted element if the buffer was full.
    pub fn push(&mut self, v: T) -> Option<T> {
        let evicted = if self.buf.len() == self.cap {
            self.buf.pop_front()
        } else {
            None
        };
        self.buf.push_back(v);
        evicted
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn latest(&self) -> Option<&T> {
        self.buf.back()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.buf.iter()
    }

    /// Elements in `range`, indexed oldest-first.
    pub fn range(&self, range: Range<usize>) -> impl Iterator<Item = &T> {
        self.buf.range(range)
    }

    /// Contiguous view, oldest first. Rotates storage in place at most once.
    pub fn as_slice(&mut self) -> &[T] {
        self.buf.make_contiguous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let mut r = RingBuffer::with_capacity(3);
        assert_eq!(r.push(1), None);
        r.push(2);
        r.push(3);
        assert_eq!(r.push(4), Some(1));
        assert_eq!(r.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(r.as_slice(), &[2, 3, 4]);
        assert_eq!(r.latest(), Some(&4));
    }

    #[test]
    fn zero_capacity_is_promoted_to_one() {
        let mut r = RingBuffer::with_capacity(0);
        r.push('a');
        r.push('b');
        assert_eq!(r.len(), 1);
        assert_eq!(r.capacity(), 1);
    }

    #[test]
    fn range_is_oldest_first() {
        let mut r = RingBuffer::with_capacity(4);
        for i in 0..6 {
            r.push(i);
        }
        assert_eq!(r.range(1..3).copied().collect::<Vec<_>>(), vec![3, 4]);
    }
}
