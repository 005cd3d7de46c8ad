use super::PoolStatistics;
use log::trace;
use parking_lot::Mutex;

/// Objects that can be returned to an `ObjectPool` in a reusable state
pub trait Reusable {
    /// Clears contents while keeping allocated capacity
    fn recycle(&mut self);
}

impl<T> Reusable for Vec<T> {
    fn recycle(&mut self) {
        self.clear();
    }
}

/// Pool of reusable objects of a single type
#[derive(Debug)]
pub struct ObjectPool<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
    stats: PoolStatistics,
}

impl<T: Default + Reusable> ObjectPool<T> {
    #[must_use]
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            stats: PoolStatistics::default(),
        }
    }

    /// Creates `count` objects up front so early checkouts do not allocate
    pub fn init(&self, count: usize) {
        let mut idle = self.idle.lock();
        let wanted = count.min(self.max_idle).saturating_sub(idle.len());
        idle.extend(std::iter::repeat_with(T::default).take(wanted));
    }

    /// Checks out an object, creating one when the pool is empty
    #[must_use]
    pub fn get(&self) -> T {
        let reused = self.idle.lock().pop();
        if let Some(object) = reused {
            self.stats.hit();
            object
        } else {
            self.stats.miss();
            trace!("Object pool miss for {}", std::any::type_name::<T>());
            T::default()
        }
    }

    /// Recycles an object and returns it to the pool
    pub fn put(&self, mut object: T) {
        self.stats.returned();
        object.recycle();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(object);
        } else {
            drop(idle);
            self.stats.discarded();
        }
    }

    /// Number of idle objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.idle.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn stats(&self) -> &PoolStatistics {
        &self.stats
    }
}
