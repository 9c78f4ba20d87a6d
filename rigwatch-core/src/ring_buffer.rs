use parking_lot::RwLock;

use crate::model::HealthResult;
use crate::snapshot::Snapshot;

/// Per-Component fixed-size dual Info/Result ring buffer (spec §3 "Ring
/// Buffer"): two parallel arrays of configured cache size, a monotonically
/// incrementing write index modulo size, and a read/write lock.
///
/// Invariant: if `n` ticks have completed, slot `(n-1) mod size` holds the
/// most recent pair — [`RingBuffer::last_result`]/[`RingBuffer::last_info`]
/// read exactly that slot, never the one currently being overwritten
/// (writers hold the lock exclusively for the whole swap).
pub struct RingBuffer<I> {
    inner: RwLock<Inner<I>>,
}

struct Inner<I> {
    capacity: usize,
    infos: Vec<Option<Snapshot<I>>>,
    results: Vec<Option<HealthResult>>,
    next_index: usize,
    total_writes: u64,
}

impl<I: Clone> RingBuffer<I> {
    /// `capacity` must be >= 1; callers validate this via
    /// [`crate::model::UserConfig::validate`] before construction.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "ring buffer capacity must be at least 1");
        Self {
            inner: RwLock::new(Inner {
                capacity,
                infos: vec![None; capacity],
                results: vec![None; capacity],
                next_index: 0,
                total_writes: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.read().capacity
    }

    pub fn total_writes(&self) -> u64 {
        self.inner.read().total_writes
    }

    /// Writes the (Info, Result) pair for one completed tick, advancing the
    /// index modulo capacity.
    pub fn push(&self, info: Snapshot<I>, result: HealthResult) {
        let mut inner = self.inner.write();
        let idx = inner.next_index;
        inner.infos[idx] = Some(info);
        inner.results[idx] = Some(result);
        inner.next_index = (idx + 1) % inner.capacity;
        inner.total_writes += 1;
    }

    fn last_index(inner: &Inner<I>) -> Option<usize> {
        if inner.total_writes == 0 {
            return None;
        }
        Some((inner.next_index + inner.capacity - 1) % inner.capacity)
    }

    pub fn last_result(&self) -> Option<HealthResult> {
        let inner = self.inner.read();
        Self::last_index(&inner).and_then(|idx| inner.results[idx].clone())
    }

    pub fn last_info(&self) -> Option<Snapshot<I>> {
        let inner = self.inner.read();
        Self::last_index(&inner).and_then(|idx| inner.infos[idx].clone())
    }

    fn ordered_indices(inner: &Inner<I>) -> Vec<usize> {
        let filled = inner.total_writes.min(inner.capacity as u64) as usize;
        if inner.total_writes as usize <= inner.capacity {
            (0..filled).collect()
        } else {
            // Wrapped: oldest entry sits at next_index (about to be overwritten).
            (0..inner.capacity)
                .map(|i| (inner.next_index + i) % inner.capacity)
                .collect()
        }
    }

    /// Oldest-to-newest view of cached Results, length <= min(writes, capacity).
    pub fn cache_results(&self) -> Vec<HealthResult> {
        let inner = self.inner.read();
        Self::ordered_indices(&inner)
            .into_iter()
            .filter_map(|i| inner.results[i].clone())
            .collect()
    }

    /// Oldest-to-newest view of cached Infos, length <= min(writes, capacity).
    pub fn cache_infos(&self) -> Vec<Snapshot<I>> {
        let inner = self.inner.read();
        Self::ordered_indices(&inner)
            .into_iter()
            .filter_map(|i| inner.infos[i].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn result(n: u32) -> HealthResult {
        let base = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        HealthResult::assemble("test", vec![], base + chrono::Duration::seconds(n as i64))
    }

    #[test]
    fn last_result_is_most_recent_after_n_ticks() {
        let rb: RingBuffer<u32> = RingBuffer::new(4);
        for n in 1..=10u32 {
            rb.push(Snapshot::now(n), result(n));
            assert_eq!(rb.last_result().unwrap().timestamp, result(n).timestamp);
        }
    }

    #[test]
    fn cache_results_length_is_min_writes_and_capacity() {
        let rb: RingBuffer<u32> = RingBuffer::new(4);
        for n in 1..=2u32 {
            rb.push(Snapshot::now(n), result(n));
        }
        assert_eq!(rb.cache_results().len(), 2);

        for n in 3..=10u32 {
            rb.push(Snapshot::now(n), result(n));
        }
        assert_eq!(rb.cache_results().len(), 4);
    }

    #[test]
    fn cache_results_is_ordered_oldest_to_newest() {
        let rb: RingBuffer<u32> = RingBuffer::new(3);
        for n in 1..=7u32 {
            rb.push(Snapshot::now(n), result(n));
        }
        let cached = rb.cache_results();
        let timestamps: Vec<_> = cached.iter().map(|r| r.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort();
        assert_eq!(timestamps, sorted);
        assert_eq!(cached.last().unwrap().timestamp, result(7).timestamp);
    }

    #[test]
    fn cache_size_one_always_holds_only_the_latest() {
        let rb: RingBuffer<u32> = RingBuffer::new(1);
        for n in 1..=5u32 {
            rb.push(Snapshot::now(n), result(n));
            let cached = rb.cache_results();
            assert_eq!(cached.len(), 1);
            assert_eq!(cached[0].timestamp, rb.last_result().unwrap().timestamp);
        }
    }

    #[test]
    fn empty_buffer_has_no_last_result() {
        let rb: RingBuffer<u32> = RingBuffer::new(4);
        assert!(rb.last_result().is_none());
        assert!(rb.cache_results().is_empty());
    }
}
