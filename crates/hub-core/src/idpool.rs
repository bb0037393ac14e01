//! Peer id allocation strategies.
//!
//! An `IdPool` hands out the u64 identities the hub assigns to newly
//! connected peers. Two strategies are provided: a purely incremental
//! counter, and a FIFO-recycling pool that reuses ids released by
//! disconnected peers before minting new ones.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Bound on how many released ids a [`ReusableIdPool`] will hold for
/// reuse. Once the backlog hits this size, further released ids are
/// dropped rather than queued, so the queue cannot grow without bound
/// under a connect/disconnect storm.
const MAX_QUEUE_LEN: usize = 1000;

pub trait IdPool: Send + Sync {
    /// Allocate a fresh id. Never returns an id currently held by an
    /// open connection.
    fn acquire(&self) -> u64;

    /// Release an id so a future `acquire` may hand it out again. A pool
    /// that never recycles ids may treat this as a no-op.
    fn release(&self, id: u64);
}

/// Hands out strictly increasing ids starting at 1 and never reuses one,
/// even after release.
#[derive(Debug, Default)]
pub struct IncrementalIdPool {
    next: AtomicU64,
}

impl IncrementalIdPool {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl IdPool for IncrementalIdPool {
    fn acquire(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    fn release(&self, _id: u64) {}
}

/// Recycles released ids in FIFO order before minting new ones, bounding
/// the id space to roughly the peak number of concurrently connected
/// peers.
///
/// The original implementation tracked queue length and push as two
/// separate locked operations, which left a window for the queue to
/// overshoot `MAX_QUEUE_LEN` under concurrent releases. Here both the
/// length check and the push happen under one mutex acquisition, so the
/// bound is exact. `release` also rejects any id above the current
/// high-water mark, a defensive check against a caller releasing an id
/// this pool never handed out.
#[derive(Debug)]
pub struct ReusableIdPool {
    state: Mutex<ReusableState>,
}

#[derive(Debug)]
struct ReusableState {
    last_id: u64,
    released: VecDeque<u64>,
}

impl ReusableIdPool {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ReusableState {
                last_id: 0,
                released: VecDeque::new(),
            }),
        }
    }
}

impl Default for ReusableIdPool {
    fn default() -> Self {
        Self::new()
    }
}

impl IdPool for ReusableIdPool {
    fn acquire(&self) -> u64 {
        let mut state = self.state.lock().expect("idpool mutex poisoned");
        if let Some(id) = state.released.pop_front() {
            return id;
        }
        state.last_id += 1;
        state.last_id
    }

    fn release(&self, id: u64) {
        let mut state = self.state.lock().expect("idpool mutex poisoned");
        if id > state.last_id {
            return;
        }
        if state.released.len() < MAX_QUEUE_LEN {
            state.released.push_back(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_pool_never_repeats() {
        let pool = IncrementalIdPool::new();
        let a = pool.acquire();
        let b = pool.acquire();
        pool.release(a);
        let c = pool.acquire();
        assert_eq!([a, b, c], [1, 2, 3]);
    }

    #[test]
    fn reusable_pool_recycles_in_fifo_order() {
        let pool = ReusableIdPool::new();
        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        assert_eq!([a, b, c], [1, 2, 3]);

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.acquire(), a);
        assert_eq!(pool.acquire(), b);
        assert_eq!(pool.acquire(), 4);
    }

    #[test]
    fn reusable_pool_rejects_release_of_id_above_high_water_mark() {
        let pool = ReusableIdPool::new();
        let a = pool.acquire();
        assert_eq!(a, 1);
        pool.release(9999);
        assert_eq!(pool.acquire(), 2);
    }

    #[test]
    fn reusable_pool_caps_release_queue() {
        let pool = ReusableIdPool::new();
        let ids: Vec<u64> = (0..MAX_QUEUE_LEN + 10).map(|_| pool.acquire()).collect();
        for &id in &ids {
            pool.release(id);
        }
        let state = pool.state.lock().unwrap();
        assert_eq!(state.released.len(), MAX_QUEUE_LEN);
    }
}
