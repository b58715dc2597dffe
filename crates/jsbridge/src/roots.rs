//! Root table and disposal queue.
//!
//! Every engine value surfaced to the host is registered here after being
//! added to the engine's GC root set. A [`RootId`] names the registration.
//!
//! Host handles can be dropped on any thread at any time, including while
//! another thread is inside the engine. Unrooting needs the execution lock,
//! so a drop only pushes its id onto the [`DisposalQueue`]; the engine drains
//! the queue while it holds the lock and removes the entry from the table at
//! that point. Sending is lock-free and never blocks the dropping thread.
//!
//! ```text
//!   wrap ──► protect ──► RootTable::hold ──► handle
//!                                              │ drop (any thread)
//!                                              ▼
//!                                     DisposalQueue::enqueue
//!                                              │ drain (lock held)
//!                                              ▼
//!                         RootTable::release ──► unprotect
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use dashmap::DashMap;

/// Identifier of one root registration. Never reused; 0 is never issued.
pub type RootId = u64;

/// Registered roots, keyed by [`RootId`].
///
/// `T` is whatever the owner needs to undo the registration later.
pub(crate) struct RootTable<T> {
    stash: DashMap<RootId, T>,
    next_id: AtomicU64,
}

impl<T: Copy> RootTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            stash: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Record a root and return its id.
    pub(crate) fn hold(&self, root: T) -> RootId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.stash.insert(id, root);
        id
    }

    /// Forget a root. `None` if it was already released.
    pub(crate) fn release(&self, id: RootId) -> Option<T> {
        self.stash.remove(&id).map(|(_, root)| root)
    }

    #[cfg(test)]
    pub(crate) fn has(&self, id: RootId) -> bool {
        self.stash.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.stash.len()
    }

    /// Remove every root, returning them for teardown.
    pub(crate) fn take_all(&self) -> Vec<T> {
        let ids: Vec<RootId> = self.stash.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().filter_map(|id| self.release(id)).collect()
    }
}

impl<T> std::fmt::Debug for RootTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootTable")
            .field("count", &self.stash.len())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

/// Multi-producer queue of roots waiting to be released.
#[derive(Debug)]
pub(crate) struct DisposalQueue {
    tx: Sender<RootId>,
    rx: Receiver<RootId>,
}

impl DisposalQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Queue a root for release. Safe from any thread without the lock.
    pub(crate) fn enqueue(&self, id: RootId) {
        // The receiver lives as long as self, so send cannot fail.
        let _ = self.tx.send(id);
    }

    /// Ids queued so far. Call only with the execution lock held.
    pub(crate) fn drain(&self) -> impl Iterator<Item = RootId> + '_ {
        self.rx.try_iter()
    }

    pub(crate) fn pending(&self) -> usize {
        self.rx.len()
    }
}
