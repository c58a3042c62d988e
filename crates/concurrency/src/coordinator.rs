//! Cross-context lock coordinator
//!
//! One lock word in the shared region guards every table of every context.
//! [`LockCoordinator`] wraps it with two ways to wait:
//!
//! - [`LockCoordinator::lock`] spins on `try_acquire` with no backoff and
//!   never yields. Use it on contexts that must not suspend.
//! - [`LockCoordinator::lock_async`] registers on the lock word's wait queue
//!   and suspends until a release notifies it, then retries.
//!
//! Both return a [`LockGuard`]; the lock is released when the guard drops,
//! including during unwinding. There is no other way to release it.
//!
//! No fairness between waiters, no timeout.

use anystore_engine::{Exports, SharedMemory};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Gate over the shared region's lock word
#[derive(Clone)]
pub struct LockCoordinator {
    exports: Arc<dyn Exports>,
    memory: SharedMemory,
}

impl LockCoordinator {
    /// Coordinator for the lock of `memory`, driven through `exports`
    pub fn new(exports: Arc<dyn Exports>, memory: SharedMemory) -> Self {
        Self { exports, memory }
    }

    /// Check whether any context holds the lock right now
    pub fn is_locked(&self) -> bool {
        self.memory.load(self.exports.lock_address()) != 0
    }

    /// Take the lock if it is free
    pub fn try_lock(&self) -> Option<LockGuard<'_>> {
        self.exports
            .lock_try_acquire()
            .then(|| LockGuard { coordinator: self })
    }

    /// Take the lock, spinning until it is free
    pub fn lock(&self) -> LockGuard<'_> {
        let mut spins: u64 = 0;
        loop {
            if let Some(guard) = self.try_lock() {
                if spins > 0 {
                    tracing::trace!(target: "anystore::lock", spins, "Lock acquired after spinning");
                }
                return guard;
            }
            spins += 1;
            std::hint::spin_loop();
        }
    }

    /// Take the lock, suspending the task while another context holds it
    pub async fn lock_async(&self) -> LockGuard<'_> {
        let waiter = self.memory.waiter(self.exports.lock_address());
        let mut waits: u64 = 0;
        loop {
            let notified = waiter.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(guard) = self.try_lock() {
                if waits > 0 {
                    tracing::trace!(target: "anystore::lock", waits, "Lock acquired after suspending");
                }
                return guard;
            }
            waits += 1;
            notified.await;
        }
    }

    /// Run `f` while holding the lock
    ///
    /// The lock is released when `f` returns or panics.
    pub fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock();
        f()
    }

    /// Run the future produced by `f` while holding the lock
    ///
    /// Waiting for the lock suspends instead of spinning. The lock is
    /// released when the future completes, panics, or is dropped.
    pub async fn with_lock_async<R, F, Fut>(&self, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let _guard = self.lock_async().await;
        f().await
    }
}

impl fmt::Debug for LockCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockCoordinator")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Proof of holding the lock; releases it on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    coordinator: &'a LockCoordinator,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.exports.lock_release();
    }
}

impl fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LockGuard")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anystore_core::ContextId;
    use anystore_engine::{Imports, Module, NativeModule};
    use parking_lot::Mutex;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::time::{Duration, Instant};

    struct NoopImports(ContextId, Instant);

    impl Imports for NoopImports {
        fn context_id(&self) -> ContextId {
            self.0
        }

        fn now(&self) -> f64 {
            self.1.elapsed().as_secs_f64() * 1000.0
        }

        fn log(&self, _message: &str) {}
    }

    fn coordinator(memory: &SharedMemory, context: u32) -> LockCoordinator {
        let imports = Arc::new(NoopImports(ContextId::new(context), Instant::now()));
        let exports = NativeModule::default().instantiate(memory, imports);
        LockCoordinator::new(exports, memory.clone())
    }

    fn region() -> SharedMemory {
        SharedMemory::new(1, 1).unwrap()
    }

    /// Increment under the lock; the inner `try_lock` fails if two holders overlap
    fn increment(counter: &Mutex<u64>) {
        let mut value = counter
            .try_lock()
            .expect("two contexts inside the critical section");
        *value += 1;
    }

    // ========================================================================
    // Guards
    // ========================================================================

    #[test]
    fn test_try_lock_is_exclusive() {
        let memory = region();
        let a = coordinator(&memory, 0);
        let b = coordinator(&memory, 1);

        let guard = a.try_lock().unwrap();
        assert!(a.is_locked());
        assert!(b.try_lock().is_none());
        drop(guard);
        assert!(!b.is_locked());
        assert!(b.try_lock().is_some());
    }

    #[test]
    fn test_with_lock_returns_value_and_releases() {
        let memory = region();
        let a = coordinator(&memory, 0);
        assert_eq!(a.with_lock(|| 7), 7);
        assert!(!a.is_locked());
    }

    #[test]
    fn test_release_on_panic() {
        let memory = region();
        let a = coordinator(&memory, 0);
        let result = catch_unwind(AssertUnwindSafe(|| {
            a.with_lock(|| panic!("boom"));
        }));
        assert!(result.is_err());
        assert!(!a.is_locked());
    }

    // ========================================================================
    // Blocking acquire
    // ========================================================================

    #[test]
    fn test_spinning_contexts_never_overlap() {
        const CONTEXTS: u32 = 4;
        const N: u64 = 5_000;

        let memory = region();
        let counter = Arc::new(Mutex::new(0u64));
        let handles: Vec<_> = (0..CONTEXTS)
            .map(|context| {
                let lock = coordinator(&memory, context);
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for _ in 0..N {
                        lock.with_lock(|| increment(&counter));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*counter.lock(), N * CONTEXTS as u64);
    }

    // ========================================================================
    // Suspending acquire
    // ========================================================================

    #[tokio::test]
    async fn test_lock_async_waits_for_release() {
        let memory = region();
        let holder = coordinator(&memory, 0);
        let waiter = coordinator(&memory, 1);

        let guard = holder.try_lock().unwrap();
        let task = tokio::spawn(async move {
            let _guard = waiter.lock_async().await;
            Instant::now()
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let released = Instant::now();
        drop(guard);

        let acquired = task.await.unwrap();
        assert!(acquired >= released);
        assert!(!holder.is_locked());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_async_and_spinning_contexts_never_overlap() {
        const TASKS: u32 = 4;
        const N: u64 = 1_000;

        let memory = region();
        let counter = Arc::new(Mutex::new(0u64));

        let spinner = {
            let lock = coordinator(&memory, 0);
            let counter = Arc::clone(&counter);
            std::thread::spawn(move || {
                for _ in 0..N {
                    lock.with_lock(|| increment(&counter));
                }
            })
        };

        let tasks: Vec<_> = (1..=TASKS)
            .map(|context| {
                let lock = coordinator(&memory, context);
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    for _ in 0..N {
                        lock.with_lock_async(|| async { increment(&counter) })
                            .await;
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        spinner.join().unwrap();

        assert_eq!(*counter.lock(), N * (TASKS as u64 + 1));
    }
}
