//! Store handle
//!
//! A [`Store`] is one execution context's view of a shared store: an
//! engine instance bound to the shared region, the region lock, and the
//! context's listener callbacks.
//!
//! # Contexts
//!
//! [`Store::create`] makes a new region and becomes its coordinator
//! context. Other contexts join with
//! [`create_context_descriptor`](Store::create_context_descriptor) and
//! [`Store::attach`]. Clones of a `Store` share its context and may be
//! used from several threads or tasks at once; the lock still serializes
//! them, and a notification is delivered to the context once.
//!
//! # Locking
//!
//! Every table and row call takes the region lock for the duration of its
//! boundary calls, spinning if another context holds it. Wrap several calls
//! in [`with_lock`](Store::with_lock) to make them one critical section;
//! calls made inside it do not lock again.
//!
//! ```ignore
//! use anystore::{Schema, Store, StoreOptions, Tag};
//!
//! let store = Store::create(StoreOptions::default())?;
//! let schema = Schema::new().column("count", Tag::I32);
//! let counters = store.create_table(&schema, Some("counters"))?;
//! let row = counters.row(0)?;
//! store.with_lock(|| -> anystore::Result<()> {
//!     let n = row.get_as::<i32, _>("count")?.unwrap_or(0);
//!     row.set("count", n + 1)
//! })?;
//! ```

use crate::bootstrap::{ContextDescriptor, HostImports};
use crate::listener::{dispatch, pop_listeners, Callback, DispatchReport, ListenerRegistry};
use crate::lock::ContextLock;
use crate::marshal::Marshaller;
use crate::options::StoreOptions;
use crate::row::read_row;
use crate::table::{Addressing, Table};
use anystore_concurrency::LockCoordinator;
use anystore_core::{
    ColumnMap, ContextId, Error, ListenerId, Result, Schema, TableId, Value,
};
use anystore_engine::{Module, NativeModule, SharedMemory, CONTEXT_COUNTER_CELL};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Table selector for [`Store::open_table`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRef<'a> {
    /// By name given at creation
    Name(&'a str),
    /// By engine id
    Id(TableId),
}

impl<'a> From<&'a str> for TableRef<'a> {
    fn from(name: &'a str) -> Self {
        TableRef::Name(name)
    }
}

impl From<TableId> for TableRef<'_> {
    fn from(id: TableId) -> Self {
        TableRef::Id(id)
    }
}

impl From<u32> for TableRef<'_> {
    fn from(id: u32) -> Self {
        TableRef::Id(TableId::new(id))
    }
}

struct StoreInner {
    memory: SharedMemory,
    module: Arc<dyn Module>,
    context: ContextId,
    marshaller: Marshaller,
    lock: ContextLock,
    listeners: ListenerRegistry,
    options: StoreOptions,
}

/// One context's handle to a shared store
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a new region with the built-in engine and attach to it as the
    /// coordinator context
    pub fn create(options: StoreOptions) -> Result<Store> {
        let module = Arc::new(NativeModule::new(options.mode));
        Self::create_with_module(options, module)
    }

    /// Create a new region driven by `module`
    pub fn create_with_module(options: StoreOptions, module: Arc<dyn Module>) -> Result<Store> {
        options.validate()?;
        let memory = SharedMemory::new(options.initial_pages, options.maximum_pages)?;
        let context = ContextId::new(memory.fetch_add(CONTEXT_COUNTER_CELL, 1));
        tracing::debug!(
            target: "anystore::context",
            context = %context,
            initial_pages = options.initial_pages,
            maximum_pages = options.maximum_pages,
            "Shared region created"
        );
        Ok(Self::instantiate(memory, module, context, options))
    }

    /// Join the store described by `descriptor` as a new context
    pub fn attach(descriptor: ContextDescriptor) -> Store {
        tracing::debug!(
            target: "anystore::context",
            context = %descriptor.context,
            "Attaching context"
        );
        let ContextDescriptor {
            memory,
            module,
            context,
            options,
        } = descriptor;
        Self::instantiate(memory, module, context, options)
    }

    fn instantiate(
        memory: SharedMemory,
        module: Arc<dyn Module>,
        context: ContextId,
        options: StoreOptions,
    ) -> Store {
        let exports = module.instantiate(&memory, Arc::new(HostImports::new(context)));
        exports.start();
        let lock = ContextLock::new(LockCoordinator::new(Arc::clone(&exports), memory.clone()));
        Store {
            inner: Arc::new(StoreInner {
                marshaller: Marshaller::new(exports, options.transfer),
                memory,
                module,
                context,
                lock,
                listeners: ListenerRegistry::default(),
                options,
            }),
        }
    }

    /// Descriptor for a new context sharing this store
    ///
    /// Each call allocates a new context id.
    pub fn create_context_descriptor(&self) -> ContextDescriptor {
        let context = ContextId::new(self.inner.memory.fetch_add(CONTEXT_COUNTER_CELL, 1));
        tracing::debug!(
            target: "anystore::context",
            parent = %self.inner.context,
            context = %context,
            "Context descriptor created"
        );
        ContextDescriptor {
            memory: self.inner.memory.clone(),
            module: Arc::clone(&self.inner.module),
            context,
            options: self.inner.options.clone(),
        }
    }

    /// Id of this context
    pub fn context_id(&self) -> ContextId {
        self.inner.context
    }

    /// Options the store was created with
    pub fn options(&self) -> &StoreOptions {
        &self.inner.options
    }

    /// The shared region
    pub fn memory(&self) -> &SharedMemory {
        &self.inner.memory
    }

    /// Committed size of the shared region in bytes; never shrinks
    pub fn mem_size(&self) -> usize {
        self.inner.memory.byte_len()
    }

    // ========================================================================
    // Locking
    // ========================================================================

    /// Run `f` as one critical section, spinning for the lock
    ///
    /// The lock is released when `f` returns or panics.
    pub fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.lock.run(f)
    }

    /// Run the future from `f` as one critical section, suspending while
    /// another context holds the lock
    ///
    /// Table and row calls inside the future run without locking again.
    pub async fn with_lock_async<R, F, Fut>(&self, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        self.inner.lock.run_async(f).await
    }

    /// Check whether any context holds the lock right now
    pub fn is_locked(&self) -> bool {
        self.inner.lock.coordinator().is_locked()
    }

    /// Check whether the calling thread or task is inside a critical section
    pub fn holds_lock(&self) -> bool {
        self.inner.lock.is_held()
    }

    /// Apply this context's buffered writes
    ///
    /// In shared mode there is nothing to apply.
    pub fn commit(&self) -> Result<()> {
        let code = self.with_lock(|| {
            let code = self.inner.marshaller.exports().commit();
            self.prune_dropped();
            code
        });
        self.status(code, || "commit".to_string())
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Create an id-addressed table
    ///
    /// Names are unique within the store; reusing one fails with
    /// `DuplicateTable`.
    pub fn create_table(&self, schema: &Schema, name: Option<&str>) -> Result<Table> {
        self.create_in(schema, name, Addressing::Id)
    }

    /// Create a keyed table
    pub fn create_keyed_table(&self, schema: &Schema, name: Option<&str>) -> Result<Table> {
        self.create_in(schema, name, Addressing::Key)
    }

    fn create_in(
        &self,
        schema: &Schema,
        name: Option<&str>,
        addressing: Addressing,
    ) -> Result<Table> {
        let columns = ColumnMap::from_schema(schema)?;
        let m = &self.inner.marshaller;
        let code = self.with_lock(|| {
            m.call(|e, ex| {
                m.push(ex, &Value::from(name));
                e.table_create(ex)
            })
        });
        let label = || name.unwrap_or("<anonymous>").to_string();
        let id = TableId::new(self.allocated(code, label)?);
        Ok(Table::new(self.clone(), id, name, columns, addressing))
    }

    /// Open an existing id-addressed table; `None` if it does not exist
    ///
    /// `schema` is trusted to match the table.
    pub fn open_table<'a>(
        &self,
        table: impl Into<TableRef<'a>>,
        schema: &Schema,
    ) -> Result<Option<Table>> {
        self.open(table.into(), schema, Addressing::Id)
    }

    /// Open an existing keyed table; `None` if it does not exist
    pub fn open_keyed_table<'a>(
        &self,
        table: impl Into<TableRef<'a>>,
        schema: &Schema,
    ) -> Result<Option<Table>> {
        self.open(table.into(), schema, Addressing::Key)
    }

    fn open(
        &self,
        table: TableRef<'_>,
        schema: &Schema,
        addressing: Addressing,
    ) -> Result<Option<Table>> {
        let columns = ColumnMap::from_schema(schema)?;
        let m = &self.inner.marshaller;
        let (id, name) = match table {
            TableRef::Name(name) => {
                let code = self.with_lock(|| {
                    m.call(|e, ex| {
                        m.push(ex, &Value::from(name));
                        e.table_get_id_from_name(ex)
                    })
                });
                match TableId::from_i32(code) {
                    Some(id) => (id, Some(name)),
                    None => return Ok(None),
                }
            }
            TableRef::Id(id) => {
                if !self.with_lock(|| m.exports().table_exists(id.as_u32())) {
                    return Ok(None);
                }
                (id, None)
            }
        };
        Ok(Some(Table::new(self.clone(), id, name, columns, addressing)))
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Deliver pending change notifications to this context's listeners
    ///
    /// Drains the engine's change set and reloads cached rows while holding
    /// the lock, then releases it and runs each callback once. A callback
    /// that panics is logged and counted; the others still run.
    pub fn notify_all(&self) -> DispatchReport {
        let (batch, mut report) = self.with_lock(|| self.drain());
        dispatch(&self.inner.listeners, batch, &mut report);
        self.log_dispatch(&report);
        report
    }

    /// [`notify_all`](Store::notify_all), suspending while waiting for the lock
    pub async fn notify_all_async(&self) -> DispatchReport {
        let (batch, mut report) = self.with_lock_async(|| async { self.drain() }).await;
        dispatch(&self.inner.listeners, batch, &mut report);
        self.log_dispatch(&report);
        report
    }

    /// Number of listeners registered by this context
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn drain(&self) -> (Vec<(TableId, ListenerId, Callback)>, DispatchReport) {
        let m = &self.inner.marshaller;
        let pruned = self.prune_dropped();
        let fired = m.call(|e, ex| {
            let count = e.db_take_notifications(ex);
            pop_listeners(m, ex, count)
        });

        let report = DispatchReport {
            drained: fired.len(),
            pruned,
            ..DispatchReport::default()
        };
        let mut batch = Vec::with_capacity(fired.len());
        for (table, listener) in fired {
            let Some(registration) = self.inner.listeners.get(table, listener) else {
                continue;
            };
            if let Some(snapshot) = &registration.snapshot {
                snapshot.replace(read_row(m, table, &registration.address, snapshot.width()));
            }
            batch.push((table, listener, registration.callback));
        }
        (batch, report)
    }

    fn log_dispatch(&self, report: &DispatchReport) {
        if report.drained > 0 || report.pruned > 0 {
            tracing::debug!(
                target: "anystore::notify",
                context = %self.inner.context,
                drained = report.drained,
                delivered = report.delivered,
                failed = report.failed,
                pruned = report.pruned,
                "Notifications dispatched"
            );
        }
    }

    // ========================================================================
    // Crate internals
    // ========================================================================

    pub(crate) fn marshaller(&self) -> &Marshaller {
        &self.inner.marshaller
    }

    pub(crate) fn registry(&self) -> &ListenerRegistry {
        &self.inner.listeners
    }

    /// Forget registrations whose rows were deleted or cleared, by any
    /// context; call with the lock held
    pub(crate) fn prune_dropped(&self) -> usize {
        let m = &self.inner.marshaller;
        let dropped = m.call(|e, ex| {
            let count = e.db_take_dropped_listeners(ex);
            pop_listeners(m, ex, count)
        });
        self.inner.listeners.prune(&dropped)
    }

    /// Map a status code, labelling table errors with `table`
    pub(crate) fn status(&self, code: i32, table: impl FnOnce() -> String) -> Result<()> {
        Error::check_status(code, table, self.inner.memory.byte_limit())
    }

    /// Decode an export result that is an id on success, a status on failure
    pub(crate) fn allocated(&self, code: i32, table: impl FnOnce() -> String) -> Result<u32> {
        match u32::try_from(code) {
            Ok(id) => Ok(id),
            Err(_) => Err(self
                .status(code, table)
                .err()
                .unwrap_or(Error::Engine { status: code })),
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("context", &self.inner.context)
            .field("memory", &self.inner.memory)
            .field("options", &self.inner.options)
            .finish()
    }
}
