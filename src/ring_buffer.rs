//! Fixed-capacity ring buffer with overwrite-oldest eviction
//!
//! Each channel's recent history lives in one [`RingBuffer`]. Appending never
//! blocks and never fails: once the buffer is full the oldest sample is
//! overwritten, which is how the ingestion path sheds load when consumers are
//! slower than the transport.
//!
//! Reads go through [`RingBuffer::copy_latest`], which copies the most recent
//! window into a caller-owned slice without allocating, so a render tick can
//! reuse one scratch buffer forever.
//!
//! Every appended item also gets a sequence number (its position in the
//! stream of everything ever appended). [`RingBuffer::copy_since`] reads by
//! sequence, so a consumer that polls slowly can tell exactly which items it
//! already saw and which were overwritten before it got to them.
//!
//! The buffer itself is not synchronized. The engine wraps each channel's
//! buffer in its own `Mutex` and holds it for a single operation.

use crate::error::{Result, StreamError};

/// Fixed-capacity circular store
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Backing storage, allocated once at full capacity
    storage: Vec<T>,
    /// Index of the next write position
    head: usize,
    /// Number of valid items (<= capacity)
    count: usize,
    /// Items appended over the buffer's lifetime; survives clear and reallocate
    appended: u64,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` items
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(StreamError::InvalidCapacity);
        }
        Ok(Self {
            storage: vec![T::default(); capacity],
            head: 0,
            count: 0,
            appended: 0,
        })
    }

    /// Replace the storage with `capacity` empty slots
    ///
    /// Content is discarded; the sequence count carries on.
    pub fn reallocate(&mut self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(StreamError::InvalidCapacity);
        }
        self.storage = vec![T::default(); capacity];
        self.head = 0;
        self.count = 0;
        Ok(())
    }

    /// Append one item, overwriting the oldest item when full
    #[inline]
    pub fn append(&mut self, item: T) {
        let capacity = self.storage.len();
        self.storage[self.head] = item;
        self.head = (self.head + 1) % capacity;
        if self.count < capacity {
            self.count += 1;
        }
        self.appended += 1;
    }

    /// Append items in order
    pub fn append_slice(&mut self, items: &[T]) {
        let capacity = self.storage.len();
        self.appended += items.len() as u64;

        // Only the last `capacity` items can survive
        let items = if items.len() > capacity {
            &items[items.len() - capacity..]
        } else {
            items
        };

        // Copy in at most two contiguous runs
        let first = items.len().min(capacity - self.head);
        self.storage[self.head..self.head + first].copy_from_slice(&items[..first]);
        let rest = items.len() - first;
        if rest > 0 {
            self.storage[..rest].copy_from_slice(&items[first..]);
        }

        self.head = (self.head + items.len()) % capacity;
        self.count = (self.count + items.len()).min(capacity);
    }

    /// Copy up to `requested` most recent items, oldest first, into `dest`
    ///
    /// Returns the number of items written to `dest[..n]`, which is
    /// `min(requested, len, dest.len())`. Never allocates.
    pub fn copy_latest(&self, dest: &mut [T], requested: usize) -> usize {
        let n = requested.min(self.count).min(dest.len());
        if n == 0 {
            return 0;
        }

        let capacity = self.storage.len();
        let start = (self.head + capacity - n) % capacity;

        if start + n <= capacity {
            dest[..n].copy_from_slice(&self.storage[start..start + n]);
        } else {
            // Window wraps past the physical end of storage
            let tail = capacity - start;
            dest[..tail].copy_from_slice(&self.storage[start..]);
            dest[tail..n].copy_from_slice(&self.storage[..n - tail]);
        }

        n
    }

    /// Copy items by sequence number, starting at `seq`, oldest first
    ///
    /// Returns `(n, next)`: `dest[..n]` holds the items numbered `next - n`
    /// up to `next`. When `seq` was already overwritten (or lies beyond
    /// anything appended, as after a buffer swap) copying starts at the oldest
    /// item held, so `next - n - seq` items were missed.
    pub fn copy_since(&self, seq: u64, dest: &mut [T]) -> (usize, u64) {
        let oldest = self.appended - self.count as u64;
        let start = if seq < oldest || seq > self.appended {
            oldest
        } else {
            seq
        };

        let n = ((self.appended - start) as usize).min(dest.len());
        if n == 0 {
            return (0, start);
        }

        // Items after `start` that must stay uncopied
        let skip_newest = (self.appended - start) as usize - n;
        let capacity = self.storage.len();
        let first = (self.head + capacity - skip_newest - n) % capacity;

        if first + n <= capacity {
            dest[..n].copy_from_slice(&self.storage[first..first + n]);
        } else {
            let tail = capacity - first;
            dest[..tail].copy_from_slice(&self.storage[first..]);
            dest[tail..n].copy_from_slice(&self.storage[..n - tail]);
        }

        (n, start + n as u64)
    }

    /// Copy the whole logical content into a new vector, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = vec![T::default(); self.count];
        let n = self.copy_latest(&mut out, self.count);
        out.truncate(n);
        out
    }
}

impl<T> RingBuffer<T> {
    /// Maximum number of items the buffer can hold
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of items currently held
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the buffer holds no items
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether the next append will evict the oldest item
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.storage.len()
    }

    /// Sequence number the next appended item will get
    #[inline]
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Reset to empty; storage stays allocated and the sequence count carries on
    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }

    /// Most recently appended item
    pub fn latest(&self) -> Option<&T> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.storage.len();
        Some(&self.storage[(self.head + capacity - 1) % capacity])
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> Iter<'_, T> {
        let capacity = self.storage.len();
        Iter {
            buffer: self,
            position: (self.head + capacity - self.count) % capacity,
            remaining: self.count,
        }
    }
}

impl<T: Copy + Default> Extend<T> for RingBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.append(item);
        }
    }
}

/// Oldest-to-newest iterator over a [`RingBuffer`]
pub struct Iter<'a, T> {
    buffer: &'a RingBuffer<T>,
    position: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = &self.buffer.storage[self.position];
        self.position = (self.position + 1) % self.buffer.storage.len();
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a RingBuffer<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            RingBuffer::<f64>::new(0),
            Err(StreamError::InvalidCapacity)
        ));
    }

    #[test]
    fn test_overwrite_oldest() {
        let mut buf = RingBuffer::new(5).unwrap();
        for i in 1..=7 {
            buf.append(i as f64);
        }

        assert_eq!(buf.len(), 5);
        assert!(buf.is_full());
        assert_eq!(buf.to_vec(), vec![3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(buf.latest(), Some(&7.0));
    }

    #[test]
    fn test_copy_latest_wraparound() {
        let mut buf = RingBuffer::new(5).unwrap();
        for i in 1..=7 {
            buf.append(i as f64);
        }

        let mut dest = [0.0; 3];
        assert_eq!(buf.copy_latest(&mut dest, 3), 3);
        assert_eq!(dest, [5.0, 6.0, 7.0]);

        // Window that straddles the physical end of storage
        let mut dest = [0.0; 5];
        assert_eq!(buf.copy_latest(&mut dest, 5), 5);
        assert_eq!(dest, [3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_copy_latest_clamps() {
        let mut buf = RingBuffer::new(8).unwrap();
        buf.append_slice(&[1u32, 2, 3]);

        let mut dest = [0u32; 2];
        assert_eq!(buf.copy_latest(&mut dest, 10), 2);
        assert_eq!(dest, [2, 3]);

        let mut dest = [0u32; 10];
        assert_eq!(buf.copy_latest(&mut dest, 10), 3);
        assert_eq!(&dest[..3], &[1, 2, 3]);

        assert_eq!(buf.copy_latest(&mut dest, 0), 0);
        assert_eq!(buf.copy_latest(&mut [], 4), 0);
    }

    #[test]
    fn test_copy_latest_empty() {
        let buf = RingBuffer::<f64>::new(4).unwrap();
        let mut dest = [9.0; 4];
        assert_eq!(buf.copy_latest(&mut dest, 4), 0);
        assert_eq!(dest, [9.0; 4]);
    }

    #[test]
    fn test_append_slice_larger_than_capacity() {
        let mut buf = RingBuffer::new(4).unwrap();
        buf.append(100);
        let items: Vec<i32> = (0..10).collect();
        buf.append_slice(&items);
        assert_eq!(buf.to_vec(), vec![6, 7, 8, 9]);
    }

    #[test]
    fn test_append_slice_matches_append() {
        let mut a = RingBuffer::new(7).unwrap();
        let mut b = RingBuffer::new(7).unwrap();
        let chunks: [&[i32]; 4] = [&[1, 2, 3], &[4, 5, 6, 7, 8], &[9], &[10, 11, 12, 13, 14, 15, 16, 17]];
        for chunk in chunks {
            a.append_slice(chunk);
            for &x in chunk {
                b.append(x);
            }
            assert_eq!(a.to_vec(), b.to_vec());
        }
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut buf = RingBuffer::new(3).unwrap();
        buf.extend([1, 2, 3, 4]);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 3);
        assert_eq!(buf.latest(), None);

        buf.append(9);
        assert_eq!(buf.to_vec(), vec![9]);
    }

    #[test]
    fn test_iter_oldest_first() {
        let mut buf = RingBuffer::new(3).unwrap();
        buf.extend(1..=5);
        let items: Vec<i32> = buf.iter().copied().collect();
        assert_eq!(items, vec![3, 4, 5]);
        assert_eq!(buf.iter().len(), 3);
    }

    #[test]
    fn test_copy_since_reads_by_sequence() {
        let mut buf = RingBuffer::new(5).unwrap();
        buf.extend(10..13);
        assert_eq!(buf.appended(), 3);

        let mut dest = [0; 5];
        assert_eq!(buf.copy_since(1, &mut dest), (2, 3));
        assert_eq!(&dest[..2], &[11, 12]);

        // Nothing new yet
        assert_eq!(buf.copy_since(3, &mut dest), (0, 3));

        // Window smaller than what is available
        buf.extend(13..16);
        let mut small = [0; 2];
        assert_eq!(buf.copy_since(3, &mut small), (2, 5));
        assert_eq!(small, [13, 14]);
    }

    #[test]
    fn test_copy_since_skips_overwritten() {
        let mut buf = RingBuffer::new(4).unwrap();
        buf.append_slice(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let mut dest = [0; 8];
        let (n, next) = buf.copy_since(2, &mut dest);
        assert_eq!((n, next), (4, 10));
        assert_eq!(next - n as u64 - 2, 4);
        assert_eq!(&dest[..n], &[6, 7, 8, 9]);
    }

    #[test]
    fn test_sequence_survives_clear_and_reallocate() {
        let mut buf = RingBuffer::new(3).unwrap();
        buf.extend(0..5);
        buf.clear();
        assert_eq!(buf.appended(), 5);

        let mut dest = [0; 3];
        assert_eq!(buf.copy_since(4, &mut dest), (0, 5));

        buf.reallocate(6).unwrap();
        assert_eq!(buf.capacity(), 6);
        assert!(buf.is_empty());
        buf.append(42);
        assert_eq!(buf.copy_since(5, &mut dest), (1, 6));
        assert_eq!(dest[0], 42);

        assert!(matches!(buf.reallocate(0), Err(StreamError::InvalidCapacity)));
    }

    #[test]
    fn test_copy_since_future_sequence_restarts_at_oldest() {
        let mut buf = RingBuffer::new(4).unwrap();
        buf.extend(0..3);
        let mut dest = [0; 4];
        assert_eq!(buf.copy_since(100, &mut dest), (3, 3));
        assert_eq!(&dest[..3], &[0, 1, 2]);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_copy_since_matches_history(
            capacity in 1usize..32,
            history in prop::collection::vec(any::<i16>(), 0..120),
            seq in 0u64..130,
            window in 0usize..40,
        ) {
            let mut buf = RingBuffer::new(capacity).unwrap();
            buf.append_slice(&history);

            let mut dest = vec![0; window];
            let (n, next) = buf.copy_since(seq, &mut dest);
            let first = (next - n as u64) as usize;

            prop_assert!(next as usize <= history.len());
            prop_assert_eq!(&dest[..n], &history[first..first + n]);
            if seq as usize <= history.len() && history.len() - (seq as usize) <= capacity {
                prop_assert_eq!(first as u64, seq);
            }
        }

        #[test]
        fn test_copy_latest_is_suffix_of_history(
            capacity in 1usize..64,
            history in prop::collection::vec(-1000i32..1000, 0..200),
            requested in 0usize..80,
        ) {
            let mut buf = RingBuffer::new(capacity).unwrap();
            buf.append_slice(&history);

            let retained = history.len().min(capacity);
            let expected = requested.min(retained);
            let mut dest = vec![0; 80];
            let n = buf.copy_latest(&mut dest, requested);

            prop_assert_eq!(n, expected);
            prop_assert_eq!(&dest[..n], &history[history.len() - n..]);
        }

        #[test]
        fn test_chunked_appends_match_single_appends(
            capacity in 1usize..32,
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..40), 0..10),
        ) {
            let mut chunked = RingBuffer::new(capacity).unwrap();
            let mut single = RingBuffer::new(capacity).unwrap();
            for chunk in &chunks {
                chunked.append_slice(chunk);
                single.extend(chunk.iter().copied());
            }
            prop_assert_eq!(chunked.to_vec(), single.to_vec());
        }
    }
}
