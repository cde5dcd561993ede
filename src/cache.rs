//! Bounded pairwise leg cache.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::Coordinate;
use crate::traits::{DistanceCache, Leg};

/// Default number of legs kept before the oldest entries are evicted.
pub const DEFAULT_CACHE_CAPACITY: usize = 100_000;

type PairKey = ((i64, i64), (i64, i64));

#[derive(Debug, Default)]
struct CacheState {
    legs: HashMap<PairKey, Leg>,
    order: VecDeque<PairKey>,
}

/// Thread-safe cache holding at most `capacity` legs.
///
/// Eviction is oldest-insert first. `clear` resets it for long-running callers.
#[derive(Debug)]
pub struct BoundedDistanceCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl Default for BoundedDistanceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl BoundedDistanceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DistanceCache for BoundedDistanceCache {
    fn get(&self, from: Coordinate, to: Coordinate) -> Option<Leg> {
        self.lock().legs.get(&(from.key(), to.key())).copied()
    }

    fn insert(&self, from: Coordinate, to: Coordinate, leg: Leg) {
        if self.capacity == 0 {
            return;
        }

        let key = (from.key(), to.key());
        let mut state = self.lock();
        if state.legs.insert(key, leg).is_some() {
            return;
        }

        state.order.push_back(key);
        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.legs.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.lock().legs.len()
    }

    fn clear(&self) {
        let mut state = self.lock();
        state.legs.clear();
        state.order.clear();
    }
}
