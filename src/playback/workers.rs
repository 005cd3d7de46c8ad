use super::crossfade::CrossfadeState;
use crate::pool::Pools;
use log::{error, info};
use parking_lot::{Condvar, Mutex};
use std::{
    collections::VecDeque,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

/// Crossfade generation request
pub type CrossfadeJob = Arc<Mutex<CrossfadeState>>;

#[derive(Default)]
struct Shared {
    queue: Mutex<VecDeque<CrossfadeJob>>,
    ready: Condvar,
    shutdown: AtomicBool,
}

/// Background threads that build crossfade frames.
///
/// Work is a queue of crossfade states. A worker locks the state and builds
/// the frame for its current step, which is a no-op if that step already
/// exists, so a state may be queued more than once.
pub struct CrossfadeWorkers {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    pools: Arc<Pools>,
    max_workers: usize,
    instances_per_worker: usize,
}

impl CrossfadeWorkers {
    #[must_use]
    pub fn new(
        pools: Arc<Pools>,
        max_workers: usize,
        instances_per_worker: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            threads: Mutex::new(Vec::new()),
            pools,
            max_workers,
            instances_per_worker: instances_per_worker.max(1),
        }
    }

    /// Starts workers until there is one per `instances_per_worker` live
    /// animators, rounded up and capped at `max_workers`. Never stops any.
    pub fn ensure_capacity(&self, live: usize) {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return;
        }
        let wanted = live
            .div_ceil(self.instances_per_worker)
            .min(self.max_workers);
        let mut threads = self.threads.lock();
        while threads.len() < wanted {
            let shared = self.shared.clone();
            let pools = self.pools.clone();
            let spawned = thread::Builder::new()
                .name(format!("crossfade-{}", threads.len()))
                .spawn(move || worker_loop(&shared, &pools));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    error!("Could not start crossfade worker: {e}");
                    break;
                }
            }
        }
        if threads.len() == wanted && wanted > 0 {
            info!("{} crossfade workers for {} animators", wanted, live);
        }
    }

    pub fn enqueue(&self, job: CrossfadeJob) {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return;
        }
        self.shared.queue.lock().push_back(job);
        self.shared.ready.notify_one();
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.threads.lock().len()
    }

    /// Requests not yet picked up by a worker
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Drops queued work and joins every worker. Later requests are ignored.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.queue.lock().clear();
        self.shared.ready.notify_all();
        let threads = std::mem::take(&mut *self.threads.lock());
        let count = threads.len();
        for handle in threads {
            if handle.join().is_err() {
                error!("Crossfade worker exited with a panic");
            }
        }
        if count > 0 {
            info!("Stopped {count} crossfade workers");
        }
    }
}

impl Drop for CrossfadeWorkers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared, pools: &Pools) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                if let Some(job) = queue.pop_front() {
                    break job;
                }
                shared.ready.wait(&mut queue);
            }
        };
        let result =
            catch_unwind(AssertUnwindSafe(|| job.lock().generate(pools)));
        if result.is_err() {
            error!("Crossfade worker recovered from a panic");
        }
    }
}
