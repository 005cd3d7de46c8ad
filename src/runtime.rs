use crate::{
    clip::FrameCache,
    config::RuntimeConfig,
    playback::{CrossfadeJob, CrossfadeWorkers},
    pool::Pools,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Resources shared by every animator: the generated frame cache, scratch
/// pools and the crossfade workers. Animators keep an `Arc` to it. Workers
/// are stopped and joined when the last reference is dropped.
pub struct Runtime {
    cache: FrameCache,
    pools: Arc<Pools>,
    workers: CrossfadeWorkers,
    threaded: AtomicBool,
    config: RuntimeConfig,
}

impl Runtime {
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let pools = Arc::new(Pools::new(config.max_pooled_per_bucket));
        let workers = CrossfadeWorkers::new(
            pools.clone(),
            config.max_workers,
            config.instances_per_worker,
        );
        Self {
            cache: FrameCache::new(),
            pools,
            workers,
            threaded: AtomicBool::new(config.threaded),
            config,
        }
    }

    #[must_use]
    pub const fn cache(&self) -> &FrameCache {
        &self.cache
    }

    #[must_use]
    pub fn pools(&self) -> &Pools {
        &self.pools
    }

    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// True while crossfade steps are built by the workers. False when no
    /// worker is running, since nothing would pick up queued steps.
    #[must_use]
    pub fn is_threaded(&self) -> bool {
        self.threaded.load(Ordering::Acquire) && self.workers.worker_count() > 0
    }

    /// Sizes the worker pool for the animators currently registered in the
    /// cache. Does nothing when not threaded.
    pub fn ensure_workers(&self) {
        if self.threaded.load(Ordering::Acquire) {
            self.workers.ensure_capacity(self.cache.total_live());
        }
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.worker_count()
    }

    /// Queues a crossfade step for the workers. Without workers the
    /// animator builds the step itself during its tick.
    pub fn enqueue_crossfade(&self, job: CrossfadeJob) {
        if self.is_threaded() {
            self.workers.enqueue(job);
        }
    }

    /// Stops the workers early. Animators build crossfade steps inline
    /// from then on.
    pub fn shutdown(&self) {
        self.threaded.store(false, Ordering::Release);
        self.workers.shutdown();
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
