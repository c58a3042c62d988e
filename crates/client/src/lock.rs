//! Per-context view of the region lock
//!
//! Every table and row operation takes the region lock for the duration of
//! its boundary calls. [`ContextLock`] lets those operations nest inside an
//! application-level `with_lock`: while a caller holds the lock, further
//! acquisitions by that same caller run straight through.
//!
//! "Caller" is a thread for blocking sections and a task for suspending
//! ones. Other threads and tasks sharing the same `Store` wait like any
//! other context would.
//!
//! A blocking section spins, so calling `with_lock` from a task while
//! another task on the same thread holds the lock never returns.

use anystore_concurrency::LockCoordinator;
use parking_lot::ReentrantMutex;
use std::cell::Cell;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(0);

tokio::task_local! {
    /// Ids of the context locks the current task holds
    static TASK_HOLDS: Vec<u64>;
}

pub(crate) struct ContextLock {
    id: u64,
    coordinator: LockCoordinator,
    /// Owned by the thread inside a blocking section; the flag marks that
    /// it already holds the region lock
    thread: ReentrantMutex<Cell<bool>>,
}

/// Clears the thread's held flag; declared after the guard so it drops first
struct Held<'a>(&'a Cell<bool>);

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl ContextLock {
    pub(crate) fn new(coordinator: LockCoordinator) -> Self {
        Self {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
            coordinator,
            thread: ReentrantMutex::new(Cell::new(false)),
        }
    }

    pub(crate) fn coordinator(&self) -> &LockCoordinator {
        &self.coordinator
    }

    /// Check whether the calling thread or task is inside a critical section
    pub(crate) fn is_held(&self) -> bool {
        self.task_holds() || self.thread_holds()
    }

    fn task_holds(&self) -> bool {
        TASK_HOLDS
            .try_with(|ids| ids.contains(&self.id))
            .unwrap_or(false)
    }

    fn thread_holds(&self) -> bool {
        self.thread.try_lock().map_or(false, |held| held.get())
    }

    /// Run `f` holding the lock, spinning for it if the caller does not
    /// hold it yet
    pub(crate) fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.task_holds() {
            return f();
        }
        let thread = self.thread.lock();
        if thread.get() {
            return f();
        }
        let _guard = self.coordinator.lock();
        thread.set(true);
        let _held = Held(&thread);
        f()
    }

    /// Run the future from `f` holding the lock, suspending while waiting
    pub(crate) async fn run_async<R, F, Fut>(&self, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        if self.is_held() {
            return f().await;
        }
        let _guard = self.coordinator.lock_async().await;
        let mut held = TASK_HOLDS.try_with(Vec::clone).unwrap_or_default();
        held.push(self.id);
        TASK_HOLDS.scope(held, async move { f().await }).await
    }
}
