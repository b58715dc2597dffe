//! Reentrant execution lock.
//!
//! The engine's execution context is logically single-threaded. Every engine
//! operation runs under an [`ExecutionLock`], which serializes host threads
//! but lets the owning thread re-acquire without blocking: a script may call a
//! host function that evaluates more script on the same thread.
//!
//! ## Fairness
//!
//! Waiters park on a condition variable and one of them is woken when the
//! owner's depth returns to zero. Wake-up order is not FIFO: whichever waiter
//! observes the lock free first takes it. Same-thread reentry never parks, so
//! a thread cannot deadlock on itself.

use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

/// Owner and recursion depth of an [`ExecutionLock`].
///
/// `depth > 0` exactly when `owner` is `Some`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockState {
    pub owner: Option<ThreadId>,
    pub depth: usize,
}

impl LockState {
    pub fn is_held(&self) -> bool {
        self.depth > 0
    }
}

/// A recursive mutex that tracks owner thread and depth explicitly.
#[derive(Debug, Default)]
pub struct ExecutionLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl ExecutionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock, blocking while another thread owns it.
    ///
    /// Returns the depth after acquisition; `1` means this call took the lock
    /// from free.
    pub fn acquire(&self) -> usize {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.owner == Some(me) {
            state.depth += 1;
            return state.depth;
        }

        while state.owner.is_some() {
            self.released.wait(&mut state);
        }

        state.owner = Some(me);
        state.depth = 1;
        1
    }

    /// Acquire only if that does not require waiting for another thread.
    pub fn try_acquire(&self) -> Option<usize> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        match state.owner {
            Some(owner) if owner == me => {
                state.depth += 1;
                Some(state.depth)
            }
            Some(_) => None,
            None => {
                state.owner = Some(me);
                state.depth = 1;
                Some(1)
            }
        }
    }

    /// Undo one [`acquire`](Self::acquire).
    ///
    /// Returns `true` when this call made the lock available to other threads.
    /// A release by a thread that does not own the lock is ignored, so depth
    /// never underflows and a free lock is never freed twice.
    pub fn release(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.owner != Some(me) {
            warn!(
                holder = ?state.owner,
                caller = ?me,
                "execution lock released without a matching acquire; ignoring"
            );
            return false;
        }

        state.depth -= 1;
        if state.depth > 0 {
            return false;
        }

        state.owner = None;
        drop(state);
        self.released.notify_one();
        true
    }

    /// Acquire and return a guard that releases on drop.
    pub fn lock(&self) -> ExecutionGuard<'_> {
        let depth = self.acquire();
        ExecutionGuard::new(self, depth)
    }

    /// Non-blocking variant of [`lock`](Self::lock).
    pub fn try_lock(&self) -> Option<ExecutionGuard<'_>> {
        self.try_acquire()
            .map(|depth| ExecutionGuard::new(self, depth))
    }

    pub fn state(&self) -> LockState {
        *self.state.lock()
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }
}

/// Scoped acquisition of an [`ExecutionLock`].
///
/// Not `Send`: the release must happen on the acquiring thread.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ExecutionGuard<'a> {
    lock: &'a ExecutionLock,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl<'a> ExecutionGuard<'a> {
    fn new(lock: &'a ExecutionLock, depth: usize) -> Self {
        Self {
            lock,
            depth,
            _not_send: PhantomData,
        }
    }

    /// Depth this guard acquired at. `1` for the outermost guard.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_outermost(&self) -> bool {
        self.depth == 1
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl std::fmt::Debug for ExecutionGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGuard")
            .field("depth", &self.depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    fn held_elsewhere(lock: &Arc<ExecutionLock>) -> bool {
        let lock = lock.clone();
        thread::spawn(move || match lock.try_acquire() {
            Some(_) => {
                lock.release();
                false
            }
            None => true,
        })
        .join()
        .unwrap()
    }

    #[test]
    fn test_new_lock_is_free() {
        let lock = ExecutionLock::new();
        assert_eq!(lock.state(), LockState::default());
        assert!(!lock.state().is_held());
    }

    #[test]
    fn test_reentrant_depth() {
        let lock = ExecutionLock::new();
        assert_eq!(lock.acquire(), 1);
        assert_eq!(lock.acquire(), 2);
        assert_eq!(lock.acquire(), 3);
        assert_eq!(lock.state().owner, Some(thread::current().id()));

        assert!(!lock.release());
        assert!(!lock.release());
        assert!(lock.release());
        assert_eq!(lock.state(), LockState::default());
    }

    #[test]
    fn test_held_exactly_while_depth_positive() {
        let lock = Arc::new(ExecutionLock::new());
        assert!(!held_elsewhere(&lock));

        lock.acquire();
        assert!(held_elsewhere(&lock));
        lock.acquire();
        assert!(held_elsewhere(&lock));
        lock.release();
        assert!(held_elsewhere(&lock));
        lock.release();
        assert!(!held_elsewhere(&lock));
    }

    #[test]
    fn test_excess_release_is_clamped() {
        let lock = Arc::new(ExecutionLock::new());
        assert!(!lock.release());
        assert_eq!(lock.state().depth, 0);

        lock.acquire();
        assert!(lock.release());
        assert!(!lock.release());
        assert!(!lock.release());
        assert_eq!(lock.state(), LockState::default());

        // still usable afterwards
        assert_eq!(lock.acquire(), 1);
        assert!(held_elsewhere(&lock));
        assert!(lock.release());
    }

    #[test]
    fn test_release_from_other_thread_ignored() {
        let lock = Arc::new(ExecutionLock::new());
        lock.acquire();

        let other = lock.clone();
        let released = thread::spawn(move || other.release()).join().unwrap();
        assert!(!released);
        assert_eq!(lock.state().depth, 1);
        assert_eq!(lock.state().owner, Some(thread::current().id()));

        assert!(lock.release());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = ExecutionLock::new();
        {
            let outer = lock.lock();
            assert!(outer.is_outermost());
            let inner = lock.lock();
            assert_eq!(inner.depth(), 2);
        }
        assert!(!lock.state().is_held());
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let lock = Arc::new(ExecutionLock::new());
        let inner = lock.clone();
        let result = thread::spawn(move || {
            let _guard = inner.lock();
            panic!("boom");
        })
        .join();
        assert!(result.is_err());
        assert!(!lock.state().is_held());
    }

    #[test]
    fn test_blocks_other_threads() {
        let lock = Arc::new(ExecutionLock::new());
        let guard = lock.lock();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let lock = lock.clone();
            thread::spawn(move || {
                let _g = lock.lock();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn test_mutual_exclusion_under_contention() {
        let lock = Arc::new(ExecutionLock::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..8 {
            let lock = lock.clone();
            let inside = inside.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    let _outer = lock.lock();
                    let _nested = lock.lock();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!lock.state().is_held());
    }
}
