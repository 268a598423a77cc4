//! LRU eviction zones
//!
//! A zone is a bounded recency list over cached objects. Objects register
//! at the MRU end on allocation and are promoted on every lookup and lock
//! acquisition. When a zone runs over capacity, `evict_half` sweeps from
//! the LRU end, applying a caller-supplied try-evict predicate until at
//! least half of the entries have been freed or the list is exhausted.

use alloc::collections::VecDeque;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use spin::Mutex;

/// One bounded pool of cached objects with LRU ordering.
///
/// The zone holds weak handles only; ownership stays with the caches. The
/// front of the queue is the MRU end.
pub struct LruZone<T> {
    queue: Mutex<VecDeque<Weak<T>>>,
    capacity: usize,
}

impl<T> LruZone<T> {
    /// Create a zone bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Number of live entries currently tracked.
    pub fn len(&self) -> usize {
        let mut queue = self.queue.lock();
        queue.retain(|w| w.strong_count() > 0);
        queue.len()
    }

    /// Whether the zone currently tracks no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a freshly allocated object at the MRU end.
    pub fn insert(&self, obj: &Arc<T>) {
        let mut queue = self.queue.lock();
        queue.push_front(Arc::downgrade(obj));
    }

    /// Promote an object to the MRU end.
    ///
    /// Objects not currently tracked are (re-)registered.
    pub fn touch(&self, obj: &Arc<T>) {
        let mut queue = self.queue.lock();
        if let Some(pos) = queue.iter().position(|w| w.as_ptr() == Arc::as_ptr(obj)) {
            let _ = queue.remove(pos);
        }
        queue.push_front(Arc::downgrade(obj));
    }

    /// Drop an object from the zone.
    pub fn remove(&self, obj: &Arc<T>) {
        let mut queue = self.queue.lock();
        if let Some(pos) = queue.iter().position(|w| w.as_ptr() == Arc::as_ptr(obj)) {
            let _ = queue.remove(pos);
        }
    }

    /// Whether the zone holds more live entries than its capacity.
    pub fn over_capacity(&self) -> bool {
        self.len() > self.capacity
    }

    /// Sweep from the LRU end until at least half of the entries have been
    /// freed or every entry has been tried. Returns the number freed.
    ///
    /// The predicate must return `true` only when it actually released the
    /// object. The queue lock is not held across predicate calls, so
    /// predicates may re-enter the zone to deregister.
    pub fn evict_half<F: FnMut(&Arc<T>) -> bool>(&self, mut try_evict: F) -> usize {
        let candidates: Vec<Arc<T>> = {
            let mut queue = self.queue.lock();
            queue.retain(|w| w.strong_count() > 0);
            queue.iter().rev().filter_map(|w| w.upgrade()).collect()
        };

        let target = (candidates.len() + 1) / 2;
        let mut freed = 0;

        for obj in candidates {
            if freed >= target {
                break;
            }
            if try_evict(&obj) {
                self.remove(&obj);
                freed += 1;
            }
        }

        freed
    }
}
