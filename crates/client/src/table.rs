//! Table handles
//!
//! A [`Table`] pairs an engine table id with the [`ColumnMap`] the caller
//! opened it with. The map is trusted: the engine does not know column
//! names or tags, so opening a table with the wrong schema goes unnoticed
//! until values of the wrong tag come back.

use crate::row::{delete_row, read_value, write_value, Row, RowAddress};
use crate::store::Store;
use anystore_core::{ColumnMap, ColumnRef, Error, Result, RowId, TableId, Value};
use std::fmt;
use std::sync::Arc;

/// How rows of a table are addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Rows get an engine id when created; column access uses the id
    Id,
    /// Every access re-sends the row key
    Key,
}

/// Handle to one table
#[derive(Clone)]
pub struct Table {
    store: Store,
    id: TableId,
    name: Option<Arc<str>>,
    columns: Arc<ColumnMap>,
    addressing: Addressing,
}

impl Table {
    pub(crate) fn new(
        store: Store,
        id: TableId,
        name: Option<&str>,
        columns: ColumnMap,
        addressing: Addressing,
    ) -> Self {
        Self {
            store,
            id,
            name: name.map(Arc::from),
            columns: Arc::new(columns),
            addressing,
        }
    }

    /// Engine table id
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Table name, if known to this handle
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Column layout this handle was opened with
    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Row addressing of this table
    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    /// Store this table belongs to
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn label(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None => self.id.to_string(),
        }
    }

    pub(crate) fn status(&self, code: i32) -> Result<()> {
        self.store.status(code, || self.label())
    }

    // ========================================================================
    // Rows
    // ========================================================================

    /// Handle to the row stored under `key`
    ///
    /// In an id-addressed table the row is allocated if it does not exist
    /// yet. In a keyed table this makes no engine call.
    pub fn row(&self, key: impl Into<Value>) -> Result<Row> {
        let key = key.into();
        match self.addressing {
            Addressing::Key => Ok(Row::new(self.clone(), key.clone(), RowAddress::Key(key))),
            Addressing::Id => {
                let m = self.store.marshaller();
                let code = self.store.with_lock(|| {
                    m.call(|e, ex| {
                        m.push(ex, &key);
                        e.row_create(ex, self.id.as_u32())
                    })
                });
                let row = RowId::new(self.store.allocated(code, || self.label())?);
                Ok(Row::new(self.clone(), key, RowAddress::Id(row)))
            }
        }
    }

    /// Handle to an existing row; `None` if no row is stored under `key`
    pub fn get_row(&self, key: impl Into<Value>) -> Result<Option<Row>> {
        let key = key.into();
        let row = self.lookup(&key);
        Ok(row.map(|row| {
            let address = match self.addressing {
                Addressing::Id => RowAddress::Id(row),
                Addressing::Key => RowAddress::Key(key.clone()),
            };
            Row::new(self.clone(), key, address)
        }))
    }

    fn lookup(&self, key: &Value) -> Option<RowId> {
        let m = self.store.marshaller();
        let code = self.store.with_lock(|| {
            m.call(|e, ex| {
                m.push(ex, key);
                e.row_get_id(ex, self.id.as_u32())
            })
        });
        RowId::from_i32(code)
    }

    // ========================================================================
    // Columns by key
    // ========================================================================

    /// Store `value` in `column` of the row under `key`, creating the row
    pub fn insert<C: ColumnRef>(
        &self,
        key: impl Into<Value>,
        column: C,
        value: impl Into<Value>,
    ) -> Result<()> {
        let (key, value) = (key.into(), value.into());
        let col = self.columns.resolve(column)?;
        col.check(&value)?;
        let index = col.index;
        let code = self.store.with_lock(|| {
            write_value(
                self.store.marshaller(),
                self.id,
                &RowAddress::Key(key),
                index,
                &value,
            )
        });
        self.status(code)
    }

    /// Store a whole row under `key`, one value per column in column order
    pub fn insert_row(
        &self,
        key: impl Into<Value>,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<()> {
        let key = key.into();
        let values: Vec<Value> = values.into_iter().collect();
        self.columns.check_row(&values)?;
        let m = self.store.marshaller();
        let code = self.store.with_lock(|| {
            m.call(|e, ex| {
                m.push_all(ex, &values);
                m.push(ex, &key);
                e.table_insert_row(ex, self.id.as_u32())
            })
        });
        self.status(code)
    }

    /// Value of `column` in the row under `key`; `None` if unset or absent
    pub fn get<C: ColumnRef>(&self, key: impl Into<Value>, column: C) -> Result<Option<Value>> {
        let index = self.columns.resolve(column)?.index;
        let address = RowAddress::Key(key.into());
        Ok(self
            .store
            .with_lock(|| read_value(self.store.marshaller(), self.id, &address, index)))
    }

    /// Rows whose `column` currently equals `value`, in no particular order
    ///
    /// Comparison is tag-aware: `I32(1)` does not match `F64(1.0)`. Floats
    /// compare as IEEE numbers, so `0.0` finds `-0.0` and `NaN` finds
    /// nothing. Searching for `Null` finds rows where the column is unset.
    pub fn where_eq<C: ColumnRef>(&self, column: C, value: impl Into<Value>) -> Result<Vec<Row>> {
        let value = value.into();
        let col = self.columns.resolve(column)?;
        col.check(&value)?;
        let index = col.index;
        let m = self.store.marshaller();
        let matches = self.store.with_lock(|| {
            m.call(|e, ex| {
                m.push(ex, &value);
                let count = e.table_where(ex, self.id.as_u32(), index as u32);
                let mut matches = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let row = m.pop_i32(ex);
                    let key = m.pop(ex);
                    matches.push((RowId::new(row as u32), key));
                }
                matches
            })
        });
        Ok(matches
            .into_iter()
            .map(|(row, key)| {
                let address = match self.addressing {
                    Addressing::Id => RowAddress::Id(row),
                    Addressing::Key => RowAddress::Key(key.clone()),
                };
                Row::new(self.clone(), key, address)
            })
            .collect())
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Delete the row under `key` and every listener rooted at it
    pub fn delete(&self, key: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let address = match self.addressing {
            Addressing::Key => RowAddress::Key(key),
            Addressing::Id => RowAddress::Id(self.lookup(&key).ok_or(Error::RowNotFound)?),
        };
        self.delete_at(&address)
    }

    pub(crate) fn delete_at(&self, address: &RowAddress) -> Result<()> {
        let code = self.store.with_lock(|| {
            let code = delete_row(self.store.marshaller(), self.id, address);
            self.store.prune_dropped();
            code
        });
        self.status(code)
    }

    /// Delete every row, and every listener rooted at them
    pub fn clear(&self) -> Result<()> {
        let code = self.store.with_lock(|| {
            let code = self.store.marshaller().exports().table_clear(self.id.as_u32());
            self.store.prune_dropped();
            code
        });
        self.status(code)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("columns", &self.columns.len())
            .field("addressing", &self.addressing)
            .finish()
    }
}
