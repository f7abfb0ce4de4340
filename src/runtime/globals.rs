//! Critical sections around global state
//!
//! Rewritten code brackets every access to a global or static variable with
//! [`GlobalsLock::acquire`]/[`GlobalsLock::release`] (via [`GlobalsGuard`] on
//! the Rust side). The lock is re-entrant per thread, and a thread that is
//! about to busy-wait for a callee hands the lock over with
//! [`GlobalsLock::suspend`] so the callee can take it.

use crate::config::GlobalLockStrategy;
use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct Region {
    /// Owning thread and its nesting depth.
    owner: Mutex<Option<(ThreadId, usize)>>,
    released: Condvar,
}

impl Region {
    fn lock_depth(&self, depth: usize) {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        loop {
            match owner.as_mut() {
                None => {
                    *owner = Some((me, depth));
                    return;
                }
                Some((id, held)) if *id == me => {
                    *held += depth;
                    return;
                }
                Some(_) => self.released.wait(&mut owner),
            }
        }
    }

    /// Drop up to `depth` levels held by the current thread; returns the
    /// levels actually dropped.
    fn unlock_depth(&self, depth: Option<usize>) -> usize {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        let Some((id, held)) = owner.as_mut() else {
            return 0;
        };
        if *id != me {
            return 0;
        }
        let dropped = depth.map_or(*held, |d| d.min(*held));
        *held -= dropped;
        if *held == 0 {
            *owner = None;
            self.released.notify_one();
        }
        dropped
    }
}

/// Lock guarding global variables of the rewritten program.
#[derive(Debug)]
pub struct GlobalsLock {
    strategy: GlobalLockStrategy,
    regions: Box<[Region]>,
}

impl GlobalsLock {
    /// `workers` worker slots plus the external slot.
    pub fn new(strategy: GlobalLockStrategy, workers: usize) -> Self {
        let count = match strategy {
            GlobalLockStrategy::Shared => 1,
            GlobalLockStrategy::PerWorker => workers + 1,
        };
        Self {
            strategy,
            regions: (0..count).map(|_| Region::default()).collect(),
        }
    }

    pub fn strategy(&self) -> GlobalLockStrategy {
        self.strategy
    }

    /// Region index used by a slot. `None` is the external slot.
    fn region(&self, worker: Option<usize>) -> &Region {
        let last = self.regions.len() - 1;
        match self.strategy {
            GlobalLockStrategy::Shared => &self.regions[0],
            GlobalLockStrategy::PerWorker => &self.regions[worker.map_or(last, |w| w.min(last))],
        }
    }

    pub fn acquire(&self, worker: Option<usize>) {
        self.region(worker).lock_depth(1);
    }

    /// Release one level. Releasing a lock the thread does not hold is ignored.
    pub fn release(&self, worker: Option<usize>) {
        self.region(worker).unlock_depth(Some(1));
    }

    /// Release every level the current thread holds; pass the result to
    /// [`GlobalsLock::resume`].
    pub fn suspend(&self, worker: Option<usize>) -> usize {
        self.region(worker).unlock_depth(None)
    }

    pub fn resume(&self, worker: Option<usize>, depth: usize) {
        if depth > 0 {
            self.region(worker).lock_depth(depth);
        }
    }

    pub fn guard(&self, worker: Option<usize>) -> GlobalsGuard<'_> {
        self.acquire(worker);
        GlobalsGuard { lock: self, worker }
    }
}

/// Held for the duration of one critical section.
#[must_use = "the globals lock is released when the guard is dropped"]
pub struct GlobalsGuard<'a> {
    lock: &'a GlobalsLock,
    worker: Option<usize>,
}

impl Drop for GlobalsGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(self.worker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_reentrant_on_one_thread() {
        let lock = GlobalsLock::new(GlobalLockStrategy::Shared, 2);
        let _outer = lock.guard(Some(0));
        let _inner = lock.guard(Some(1));
        assert_eq!(lock.suspend(Some(0)), 2);
        lock.resume(Some(0), 2);
    }

    #[test]
    fn test_shared_lock_excludes_other_threads() {
        let lock = Arc::new(GlobalsLock::new(GlobalLockStrategy::Shared, 2));
        let entered = Arc::new(AtomicBool::new(false));

        let guard = lock.guard(None);
        let handle = {
            let lock = Arc::clone(&lock);
            let entered = Arc::clone(&entered);
            std::thread::spawn(move || {
                let _g = lock.guard(Some(0));
                entered.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));
        drop(guard);
        handle.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_per_worker_regions_are_independent() {
        let lock = Arc::new(GlobalsLock::new(GlobalLockStrategy::PerWorker, 2));
        let _guard = lock.guard(Some(0));
        let other = Arc::clone(&lock);
        std::thread::spawn(move || {
            let _g = other.guard(Some(1));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_suspend_lets_another_thread_in() {
        let lock = Arc::new(GlobalsLock::new(GlobalLockStrategy::Shared, 1));
        let _guard = lock.guard(Some(0));
        let depth = lock.suspend(Some(0));
        assert_eq!(depth, 1);

        let other = Arc::clone(&lock);
        std::thread::spawn(move || {
            let _g = other.guard(Some(0));
        })
        .join()
        .unwrap();

        lock.resume(Some(0), depth);
    }
}
