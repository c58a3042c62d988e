//! Row handles
//!
//! A [`Row`] is a cheap view of one record: the table it belongs to, its
//! key and how the engine addresses it. Rows of id-addressed tables carry
//! the engine-assigned [`RowId`]; rows of keyed tables re-send the key on
//! every access.
//!
//! A row returned by [`Row::cached`] also holds a snapshot of all its
//! columns. Reads through it are local and reflect the state as of the
//! last `notify_all` that reported a change to the row, not the latest
//! write.

use crate::listener::{callback, Callback, Registration, Snapshot};
use crate::marshal::Marshaller;
use crate::table::Table;
use anystore_core::{ColumnRef, Error, FromValue, ListenerId, Result, RowId, TableId, Value};
use std::fmt;
use std::sync::Arc;

/// How the engine finds a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowAddress {
    /// By application key, re-sent on every access
    Key(Value),
    /// By engine-assigned id
    Id(RowId),
}

// ============================================================================
// Boundary calls; callers hold the lock
// ============================================================================

pub(crate) fn read_value(
    m: &Marshaller,
    table: TableId,
    address: &RowAddress,
    column: usize,
) -> Option<Value> {
    m.call(|e, ex| {
        match address {
            RowAddress::Key(key) => {
                m.push(ex, key);
                e.table_get_something(ex, table.as_u32(), column as u32);
            }
            RowAddress::Id(row) => e.row_get(ex, table.as_u32(), row.as_u32(), column as u32),
        }
        m.pop(ex).into_option()
    })
}

/// Read a whole row, padded or truncated to `width` columns
pub(crate) fn read_row(
    m: &Marshaller,
    table: TableId,
    address: &RowAddress,
    width: usize,
) -> Vec<Option<Value>> {
    m.call(|e, ex| {
        match address {
            RowAddress::Key(key) => {
                m.push(ex, key);
                e.table_get_row(ex, table.as_u32());
            }
            RowAddress::Id(row) => e.row_get_all(ex, table.as_u32(), row.as_u32()),
        }
        let count = m.pop_i32(ex).max(0) as usize;
        let mut values: Vec<Option<Value>> =
            (0..count).map(|_| m.pop(ex).into_option()).collect();
        values.reverse();
        values.resize(width, None);
        values
    })
}

pub(crate) fn write_value(
    m: &Marshaller,
    table: TableId,
    address: &RowAddress,
    column: usize,
    value: &Value,
) -> i32 {
    m.call(|e, ex| {
        m.push(ex, value);
        match address {
            RowAddress::Key(key) => {
                m.push(ex, key);
                e.table_insert(ex, table.as_u32(), column as u32)
            }
            RowAddress::Id(row) => e.row_insert(ex, table.as_u32(), row.as_u32(), column as u32),
        }
    })
}

pub(crate) fn delete_row(m: &Marshaller, table: TableId, address: &RowAddress) -> i32 {
    m.call(|e, ex| match address {
        RowAddress::Key(key) => {
            m.push(ex, key);
            e.table_delete_row(ex, table.as_u32())
        }
        RowAddress::Id(row) => e.row_delete(table.as_u32(), row.as_u32()),
    })
}

fn add_listener(m: &Marshaller, table: TableId, address: &RowAddress) -> i32 {
    m.call(|e, ex| match address {
        RowAddress::Key(key) => {
            m.push(ex, key);
            e.table_add_listener(ex, table.as_u32())
        }
        RowAddress::Id(row) => e.row_add_listener(table.as_u32(), row.as_u32()),
    })
}

// ============================================================================
// Row
// ============================================================================

/// Handle to one record of a table
#[derive(Clone)]
pub struct Row {
    table: Table,
    key: Value,
    address: RowAddress,
    cache: Option<Arc<Snapshot>>,
    cache_listener: Option<ListenerId>,
}

impl Row {
    pub(crate) fn new(table: Table, key: Value, address: RowAddress) -> Self {
        Self {
            table,
            key,
            address,
            cache: None,
            cache_listener: None,
        }
    }

    /// Table this row belongs to
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Key the row is stored under
    pub fn key(&self) -> &Value {
        &self.key
    }

    /// How the engine addresses this row
    pub fn address(&self) -> &RowAddress {
        &self.address
    }

    /// Engine row id, for rows of id-addressed tables
    pub fn id(&self) -> Option<RowId> {
        match self.address {
            RowAddress::Id(id) => Some(id),
            RowAddress::Key(_) => None,
        }
    }

    /// Check whether reads come from a local snapshot
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Listener that refreshes this row's snapshot, if cached
    pub fn cache_listener(&self) -> Option<ListenerId> {
        self.cache_listener
    }

    fn marshaller(&self) -> &Marshaller {
        self.table.store().marshaller()
    }

    // ------------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------------

    /// Value of a column; `None` if unset or the row does not exist
    pub fn get<C: ColumnRef>(&self, column: C) -> Result<Option<Value>> {
        let index = self.table.columns().resolve(column)?.index;
        if let Some(cache) = &self.cache {
            return Ok(cache.get(index));
        }
        let table = self.table.id();
        Ok(self
            .table
            .store()
            .with_lock(|| read_value(self.marshaller(), table, &self.address, index)))
    }

    /// Value of a column as a native type
    ///
    /// Fails with `TypeMismatch` if the column is not declared with `T`'s tag.
    ///
    /// ```ignore
    /// let age: Option<i32> = row.get_as("age")?;
    /// ```
    pub fn get_as<T: FromValue, C: ColumnRef>(&self, column: C) -> Result<Option<T>> {
        let col = self.table.columns().resolve(column)?;
        if col.tag != T::TAG {
            return Err(Error::TypeMismatch {
                column: col.name.clone(),
                expected: col.tag,
                actual: T::TAG,
            });
        }
        let index = col.index;
        Ok(self.get(index)?.and_then(T::from_value))
    }

    /// Store a value in a column
    ///
    /// The value's tag is checked against the column before anything is
    /// sent. A cached snapshot is not updated.
    pub fn set<C: ColumnRef>(&self, column: C, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let col = self.table.columns().resolve(column)?;
        col.check(&value)?;
        let index = col.index;
        let table = self.table.id();
        let code = self.table.store().with_lock(|| {
            write_value(self.marshaller(), table, &self.address, index, &value)
        });
        self.table.status(code)
    }

    /// All columns in column order, `None` for unset ones
    pub fn get_row(&self) -> Result<Vec<Option<Value>>> {
        if let Some(cache) = &self.cache {
            return Ok(cache.all());
        }
        let table = self.table.id();
        let width = self.table.columns().len();
        Ok(self
            .table
            .store()
            .with_lock(|| read_row(self.marshaller(), table, &self.address, width)))
    }

    /// Delete the row and every listener rooted at it
    ///
    /// Row ids may be reused by rows created afterwards.
    pub fn delete(&self) -> Result<()> {
        self.table.delete_at(&self.address)
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    /// Call `f` from `notify_all` after this row changes
    ///
    /// However many writes happen between two drains, `f` runs once.
    pub fn add_listener(&self, f: impl FnMut() + Send + 'static) -> Result<ListenerId> {
        self.register(callback(f), None)
    }

    /// Stop delivery to a listener
    ///
    /// Returns false if the listener was not registered. Once this returns,
    /// `notify_all` no longer calls it, even for changes already pending.
    pub fn remove_listener(&self, listener: ListenerId) -> Result<bool> {
        let store = self.table.store();
        let table = self.table.id();
        let local = store.registry().remove(table, listener);
        let remote = store.with_lock(|| {
            self.marshaller()
                .exports()
                .table_remove_listener(table.as_u32(), listener.as_u32())
        });
        Ok(local || remote)
    }

    /// Cached copy of this row, refreshed by `notify_all`
    ///
    /// The snapshot is loaded now. After each drain that reports a change to
    /// the row it is reloaded, then `on_update` runs.
    pub fn cached(&self, on_update: impl FnMut() + Send + 'static) -> Result<Row> {
        let width = self.table.columns().len();
        let snapshot = Arc::new(Snapshot::new(width, Vec::new()));
        let listener = self.register(callback(on_update), Some(Arc::clone(&snapshot)))?;
        Ok(Row {
            cache: Some(snapshot),
            cache_listener: Some(listener),
            ..self.clone()
        })
    }

    fn register(
        &self,
        callback: Callback,
        snapshot: Option<Arc<Snapshot>>,
    ) -> Result<ListenerId> {
        let store = self.table.store();
        let table = self.table.id();
        store.with_lock(|| {
            let code = add_listener(self.marshaller(), table, &self.address);
            let listener = ListenerId::new(store.allocated(code, || self.table.label())?);
            if let Some(snapshot) = &snapshot {
                snapshot.replace(read_row(
                    self.marshaller(),
                    table,
                    &self.address,
                    snapshot.width(),
                ));
            }
            store.registry().insert(
                table,
                listener,
                Registration {
                    address: self.address.clone(),
                    callback,
                    snapshot,
                },
            );
            Ok(listener)
        })
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("table", &self.table.id())
            .field("key", &self.key)
            .field("address", &self.address)
            .field("cached", &self.is_cached())
            .finish()
    }
}
