//! Shared memory region
//!
//! One [`SharedMemory`] is created by the coordinator context and cloned
//! into every context that attaches. Cloning shares the region; nothing is
//! copied.
//!
//! The region holds:
//! - a handful of 32-bit atomic cells at fixed addresses (the lock word and
//!   the context-id counter)
//! - the committed page count, which only grows
//! - the storage heap, a [`Database`] behind a mutex
//! - per-address wait queues used to suspend on a cell until it is notified
//!
//! # Growth
//!
//! The heap reports how many bytes it accounts for. Before a write the
//! engine asks [`SharedMemory::grow_to_fit`] for room; pages are committed
//! in 64 KiB steps up to the maximum fixed at creation, and never released.

use anystore_core::{Error, Result};
use anystore_storage::Database;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Bytes per page
pub const PAGE_SIZE: usize = 64 * 1024;

/// Address of the lock word
pub const LOCK_CELL: u32 = 0;

/// Address of the context-id counter
pub const CONTEXT_COUNTER_CELL: u32 = 1;

const CELL_COUNT: usize = 2;

struct Region {
    cells: [AtomicU32; CELL_COUNT],
    pages: AtomicUsize,
    maximum_pages: usize,
    waiters: DashMap<u32, Arc<Notify>>,
    heap: Mutex<Database>,
}

/// Handle to a shared region; clones refer to the same region
#[derive(Clone)]
pub struct SharedMemory {
    inner: Arc<Region>,
}

impl SharedMemory {
    /// Create a region with `initial_pages` committed, growable to `maximum_pages`
    ///
    /// # Errors
    ///
    /// `Error::Config` if `maximum_pages` is zero or smaller than `initial_pages`.
    pub fn new(initial_pages: usize, maximum_pages: usize) -> Result<Self> {
        if maximum_pages == 0 {
            return Err(Error::Config("maximum_pages must be at least 1".into()));
        }
        if initial_pages > maximum_pages {
            return Err(Error::Config(format!(
                "initial_pages ({}) exceeds maximum_pages ({})",
                initial_pages, maximum_pages
            )));
        }
        Ok(Self {
            inner: Arc::new(Region {
                cells: [AtomicU32::new(0), AtomicU32::new(0)],
                pages: AtomicUsize::new(initial_pages),
                maximum_pages,
                waiters: DashMap::new(),
                heap: Mutex::new(Database::new()),
            }),
        })
    }

    /// Check whether two handles refer to the same region
    pub fn same_region(&self, other: &SharedMemory) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ========================================================================
    // Size
    // ========================================================================

    /// Committed pages
    pub fn pages(&self) -> usize {
        self.inner.pages.load(Ordering::Acquire)
    }

    /// Page limit fixed at creation
    pub fn maximum_pages(&self) -> usize {
        self.inner.maximum_pages
    }

    /// Committed bytes
    pub fn byte_len(&self) -> usize {
        self.pages() * PAGE_SIZE
    }

    /// Largest size the region may reach, in bytes
    pub fn byte_limit(&self) -> usize {
        self.inner.maximum_pages * PAGE_SIZE
    }

    /// Make sure at least `bytes` are committed
    ///
    /// Returns false, and commits nothing, if that would pass the maximum.
    pub fn grow_to_fit(&self, bytes: usize) -> bool {
        let needed = bytes.div_ceil(PAGE_SIZE);
        if needed > self.inner.maximum_pages {
            return false;
        }
        let previous = self.inner.pages.fetch_max(needed, Ordering::AcqRel);
        if needed > previous {
            tracing::debug!(
                target: "anystore::engine",
                from = previous,
                to = needed,
                "Shared memory grown"
            );
        }
        true
    }

    // ========================================================================
    // Atomic cells
    // ========================================================================

    fn cell(&self, address: u32) -> &AtomicU32 {
        match self.inner.cells.get(address as usize) {
            Some(cell) => cell,
            None => panic!("no atomic cell at address {}", address),
        }
    }

    /// Load a cell
    pub fn load(&self, address: u32) -> u32 {
        self.cell(address).load(Ordering::Acquire)
    }

    /// Store into a cell
    pub fn store(&self, address: u32, value: u32) {
        self.cell(address).store(value, Ordering::Release);
    }

    /// Compare-and-swap a cell
    pub fn compare_exchange(&self, address: u32, current: u32, new: u32) -> bool {
        self.cell(address)
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Add to a cell, returning the previous value
    pub fn fetch_add(&self, address: u32, delta: u32) -> u32 {
        self.cell(address).fetch_add(delta, Ordering::AcqRel)
    }

    // ========================================================================
    // Wait / notify
    // ========================================================================

    /// Wait queue for `address`
    ///
    /// Register with `notified()` (and `enable()` it) before re-checking the
    /// cell, or a notification sent in between is lost.
    pub fn waiter(&self, address: u32) -> Arc<Notify> {
        self.inner
            .waiters
            .entry(address)
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Wake every task waiting on `address`
    pub fn notify(&self, address: u32) {
        if let Some(waiter) = self.inner.waiters.get(&address) {
            waiter.notify_waiters();
        }
    }

    // ========================================================================
    // Heap
    // ========================================================================

    /// Lock the storage heap
    pub fn heap(&self) -> MutexGuard<'_, Database> {
        self.inner.heap.lock()
    }

    /// Bytes currently accounted for by the heap
    pub fn used_bytes(&self) -> usize {
        self.heap().used_bytes()
    }
}

impl fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMemory")
            .field("pages", &self.pages())
            .field("maximum_pages", &self.inner.maximum_pages)
            .field("lock", &self.load(LOCK_CELL))
            .finish()
    }
}
