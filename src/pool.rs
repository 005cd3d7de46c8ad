//! Reusable buffer and object pools.
//!
//! Pools are explicit objects rather than process-wide statics. They are
//! shared through `Arc` by the `Runtime` so worker threads and the tick path
//! can check buffers in and out concurrently. Checkout and return are the
//! only points that take a lock.

mod array;
mod object;

use std::sync::atomic::{AtomicU64, Ordering};

// Re-exports
pub use {
    array::ArrayPool,
    object::{ObjectPool, Reusable},
};

/// Statistics for monitoring pool behaviour
#[derive(Debug, Default)]
pub struct PoolStatistics {
    /// Checkouts satisfied from the pool
    pub hits: AtomicU64,
    /// Checkouts that had to allocate
    pub misses: AtomicU64,
    /// Items handed back to the pool
    pub returns: AtomicU64,
    /// Items dropped because their bucket was full
    pub discards: AtomicU64,
}

impl PoolStatistics {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn returned(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    fn discarded(&self) {
        self.discards.fetch_add(1, Ordering::Relaxed);
    }

    /// Total number of items ever allocated by the pool
    #[must_use]
    pub fn allocations(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of items currently checked out
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        let out = self.hits.load(Ordering::Relaxed)
            + self.misses.load(Ordering::Relaxed);
        out.saturating_sub(self.returns.load(Ordering::Relaxed))
    }

    /// Fraction of checkouts that were reuses
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Bundle of the pools used by the normal engine and crossfades
#[derive(Debug)]
pub struct Pools {
    pub vectors: ArrayPool<nalgebra_glm::Vec3>,
    pub groups: ObjectPool<crate::normals::VertexGroups>,
}

impl Pools {
    #[must_use]
    pub fn new(max_per_bucket: usize) -> Self {
        Self {
            vectors: ArrayPool::new(max_per_bucket),
            groups: ObjectPool::new(max_per_bucket),
        }
    }
}

impl Default for Pools {
    fn default() -> Self {
        Self::new(array::DEFAULT_MAX_PER_BUCKET)
    }
}
