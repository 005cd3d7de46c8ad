use super::PoolStatistics;
use ahash::AHashMap;
use log::trace;
use parking_lot::Mutex;

pub(super) const DEFAULT_MAX_PER_BUCKET: usize = 64;

/// Pool of reusable arrays bucketed by length.
///
/// `get` always hands out an array of exactly the requested length. Returned
/// arrays keep whatever contents they had unless `put` is asked to reset them,
/// so callers must overwrite every element they read.
#[derive(Debug)]
pub struct ArrayPool<T> {
    buckets: Mutex<AHashMap<usize, Vec<Vec<T>>>>,
    max_per_bucket: usize,
    stats: PoolStatistics,
}

impl<T: Clone + Default> ArrayPool<T> {
    #[must_use]
    pub fn new(max_per_bucket: usize) -> Self {
        Self {
            buckets: Mutex::new(AHashMap::new()),
            max_per_bucket,
            stats: PoolStatistics::default(),
        }
    }

    /// Checks out an array of `len` elements
    #[must_use]
    pub fn get(&self, len: usize) -> Vec<T> {
        let reused = self.buckets.lock().get_mut(&len).and_then(Vec::pop);
        if let Some(array) = reused {
            self.stats.hit();
            array
        } else {
            self.stats.miss();
            trace!("Array pool miss for length {len}");
            vec![T::default(); len]
        }
    }

    /// Returns an array to its bucket. With `reset` every element is set back
    /// to its default value first. Arrays beyond the bucket limit are dropped.
    pub fn put(&self, mut array: Vec<T>, reset: bool) {
        self.stats.returned();
        if reset {
            array.fill(T::default());
        }
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(array.len()).or_default();
        if bucket.len() < self.max_per_bucket {
            bucket.push(array);
        } else {
            drop(buckets);
            self.stats.discarded();
        }
    }

    /// Number of idle arrays of the given length
    #[must_use]
    pub fn pooled(&self, len: usize) -> usize {
        self.buckets.lock().get(&len).map_or(0, Vec::len)
    }

    /// Drops every idle array
    pub fn clear(&self) {
        self.buckets.lock().clear();
    }

    #[must_use]
    pub const fn stats(&self) -> &PoolStatistics {
        &self.stats
    }
}

impl<T: Clone + Default> Default for ArrayPool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_BUCKET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{atomic::Ordering, Arc};

    #[test]
    fn reuses_by_length() {
        let pool = ArrayPool::<u32>::new(4);
        let mut a = pool.get(8);
        assert_eq!(a.len(), 8);
        a[3] = 7;
        pool.put(a, false);
        assert_eq!(pool.pooled(8), 1);

        // Different length is a miss
        let b = pool.get(4);
        assert_eq!(pool.stats().allocations(), 2);

        let a = pool.get(8);
        assert_eq!(a[3], 7);
        assert_eq!(pool.stats().allocations(), 2);
        pool.put(a, true);
        pool.put(b, false);
        assert_eq!(pool.get(8)[3], 0);
    }

    #[test]
    fn full_bucket_discards() {
        let pool = ArrayPool::<f32>::new(1);
        let a = pool.get(2);
        let b = pool.get(2);
        pool.put(a, false);
        pool.put(b, false);
        assert_eq!(pool.pooled(2), 1);
        assert_eq!(pool.stats().discards.load(Ordering::Relaxed), 1);
        assert_eq!(pool.stats().outstanding(), 0);
    }

    #[test]
    fn concurrent_checkouts_bound_allocations() {
        const THREADS: u64 = 8;
        let pool = Arc::new(ArrayPool::<u8>::new(64));
        let handles = (0..THREADS)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let array = pool.get(16);
                        assert_eq!(array.len(), 16);
                        pool.put(array, false);
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        // Each thread holds at most one array at a time
        assert!(pool.stats().allocations() <= THREADS);
        assert_eq!(pool.stats().outstanding(), 0);
    }
}
