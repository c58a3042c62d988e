//! Listener registrations and dispatch
//!
//! The engine only knows listener ids. The callbacks live here, keyed by
//! `(table, listener)`, together with the row they watch and, for cached
//! rows, the snapshot to reload before the callback runs.
//!
//! A drained id is looked up again right before its callback runs. Removing
//! a registration therefore stops delivery even for an id that was already
//! drained, as long as the removal finishes first.

use crate::marshal::Marshaller;
use crate::row::RowAddress;
use anystore_core::{Exchange, ListenerId, TableId, Value};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub(crate) type Callback = Arc<Mutex<Box<dyn FnMut() + Send>>>;

pub(crate) fn callback(f: impl FnMut() + Send + 'static) -> Callback {
    Arc::new(Mutex::new(Box::new(f)))
}

/// Local copy of a row, one entry per column
#[derive(Debug)]
pub(crate) struct Snapshot {
    width: usize,
    values: RwLock<Vec<Option<Value>>>,
}

impl Snapshot {
    pub(crate) fn new(width: usize, values: Vec<Option<Value>>) -> Self {
        Self {
            width,
            values: RwLock::new(values),
        }
    }

    /// Number of columns the snapshot holds
    pub(crate) fn width(&self) -> usize {
        self.width
    }

    pub(crate) fn get(&self, index: usize) -> Option<Value> {
        self.values.read().get(index).cloned().flatten()
    }

    pub(crate) fn all(&self) -> Vec<Option<Value>> {
        self.values.read().clone()
    }

    pub(crate) fn replace(&self, values: Vec<Option<Value>>) {
        *self.values.write() = values;
    }
}

#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) address: RowAddress,
    pub(crate) callback: Callback,
    pub(crate) snapshot: Option<Arc<Snapshot>>,
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    entries: Mutex<FxHashMap<(TableId, ListenerId), Registration>>,
}

impl ListenerRegistry {
    pub(crate) fn insert(&self, table: TableId, listener: ListenerId, registration: Registration) {
        self.entries.lock().insert((table, listener), registration);
    }

    pub(crate) fn remove(&self, table: TableId, listener: ListenerId) -> bool {
        self.entries.lock().remove(&(table, listener)).is_some()
    }

    pub(crate) fn contains(&self, table: TableId, listener: ListenerId) -> bool {
        self.entries.lock().contains_key(&(table, listener))
    }

    pub(crate) fn get(&self, table: TableId, listener: ListenerId) -> Option<Registration> {
        self.entries.lock().get(&(table, listener)).cloned()
    }

    /// Drop the registrations of listeners the engine no longer has
    pub(crate) fn prune(&self, dropped: &[(TableId, ListenerId)]) -> usize {
        let mut entries = self.entries.lock();
        dropped
            .iter()
            .filter(|key| entries.remove(*key).is_some())
            .count()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Outcome of one `notify_all`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listener ids the engine returned
    pub drained: usize,
    /// Callbacks that ran to completion
    pub delivered: usize,
    /// Callbacks that panicked
    pub failed: usize,
    /// Registrations dropped because another context deleted their row
    pub pruned: usize,
}

/// Pop `count` `(table, listener)` pairs pushed table first
pub(crate) fn pop_listeners(
    m: &Marshaller,
    ex: &mut Exchange,
    count: u32,
) -> Vec<(TableId, ListenerId)> {
    let mut pairs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let listener = m.pop_i32(ex) as u32;
        let table = m.pop_i32(ex) as u32;
        pairs.push((TableId::new(table), ListenerId::new(listener)));
    }
    pairs
}

/// Run the callbacks of a drained batch, isolating panics per listener
pub(crate) fn dispatch(
    registry: &ListenerRegistry,
    batch: Vec<(TableId, ListenerId, Callback)>,
    report: &mut DispatchReport,
) {
    for (table, listener, callback) in batch {
        if !registry.contains(table, listener) {
            continue;
        }
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut f = callback.lock();
            (*f)()
        }));
        match outcome {
            Ok(()) => report.delivered += 1,
            Err(payload) => {
                report.failed += 1;
                tracing::warn!(
                    target: "anystore::notify",
                    table = %table,
                    listener = %listener,
                    error = panic_message(payload.as_ref()),
                    "Listener callback panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
