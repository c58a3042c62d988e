//! The in-region database
//!
//! Holds every table of one shared region, the per-context notification
//! sets, and, in buffered mode, the per-context queues of operations
//! waiting for `commit`.
//!
//! # Notifications
//!
//! Each context has a set of `(table, listener)` pairs that fired since its
//! last drain. A set, not a list: a listener whose row changes ten times
//! between drains appears once.
//!
//! Deleting a row or clearing a table drops the listeners rooted there.
//! Their owners learn about it from a second per-context set, taken with
//! [`Database::take_dropped`], so a context can forget registrations that
//! another context's delete made stale.

use crate::table::{Table, ROW_OVERHEAD};
use anystore_core::{ContextId, ListenerId, RowId, Status, TableId, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// When writes become visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Writes apply immediately (default)
    #[default]
    Shared,
    /// Writes queue per context and apply on `commit`
    Buffered,
}

/// How an operation addresses its row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowTarget {
    /// By application key; inserts create the row if needed
    Key(Value),
    /// By engine-assigned id; the row must exist
    Id(RowId),
}

/// A mutation, applied immediately or queued for commit
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Store one column value
    Insert {
        /// Target table
        table: TableId,
        /// Target row
        row: RowTarget,
        /// Column index
        column: usize,
        /// Value to store
        value: Value,
    },
    /// Store a whole row under `key`, columns in order
    InsertRow {
        /// Target table
        table: TableId,
        /// Row key
        key: Value,
        /// Column values
        values: Vec<Value>,
    },
    /// Delete a row and the listeners rooted at it
    Delete {
        /// Target table
        table: TableId,
        /// Target row
        row: RowTarget,
    },
    /// Delete every row of a table
    Clear {
        /// Target table
        table: TableId,
    },
}

impl Operation {
    /// Table this operation touches
    pub fn table(&self) -> TableId {
        match self {
            Operation::Insert { table, .. }
            | Operation::InsertRow { table, .. }
            | Operation::Delete { table, .. }
            | Operation::Clear { table } => *table,
        }
    }

    /// Upper bound on the bytes this operation can add to the region
    pub fn growth_bound(&self) -> usize {
        match self {
            Operation::Insert { row, column, value, .. } => {
                let key = match row {
                    RowTarget::Key(key) => ROW_OVERHEAD + key.footprint(),
                    RowTarget::Id(_) => 0,
                };
                key + (column + 1) * Value::Null.footprint() + value.footprint()
            }
            Operation::InsertRow { key, values, .. } => {
                ROW_OVERHEAD + key.footprint() + values.iter().map(Value::footprint).sum::<usize>()
            }
            Operation::Delete { .. } | Operation::Clear { .. } => 0,
        }
    }
}

/// All tables of one region
#[derive(Debug, Default)]
pub struct Database {
    tables: Vec<Table>,
    names: FxHashMap<String, TableId>,
    notifications: FxHashMap<ContextId, BTreeSet<(TableId, ListenerId)>>,
    dropped: FxHashMap<ContextId, BTreeSet<(TableId, ListenerId)>>,
    pending: FxHashMap<ContextId, Vec<Operation>>,
    pending_bytes: usize,
}

impl Database {
    /// Empty database
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Create a table, optionally named
    ///
    /// Names are unique; creating a second table with the same name fails
    /// with [`Status::DuplicateName`].
    pub fn create_table(&mut self, name: Option<String>) -> Result<TableId, Status> {
        let id = TableId::new(self.tables.len() as u32);
        if let Some(name) = &name {
            if self.names.contains_key(name) {
                return Err(Status::DuplicateName);
            }
            self.names.insert(name.clone(), id);
        }
        self.tables.push(Table::new(name));
        Ok(id)
    }

    /// Resolve a table name
    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.names.get(name).copied()
    }

    /// Table by id
    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.as_usize())
    }

    /// Mutable table by id
    pub fn table_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.get_mut(id.as_usize())
    }

    /// Number of tables
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Accounted bytes: live rows plus queued operations
    pub fn used_bytes(&self) -> usize {
        self.tables.iter().map(Table::used_bytes).sum::<usize>() + self.pending_bytes
    }

    // ========================================================================
    // Rows
    // ========================================================================

    /// Look up or allocate the row for `key`
    pub fn create_row(&mut self, table: TableId, key: Value) -> Result<RowId, Status> {
        let table = self.table_mut(table).ok_or(Status::TableNotFound)?;
        Ok(table.create_row(key).0)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Apply `op` now or queue it for `context`, depending on `mode`
    ///
    /// Queued operations are only checked for a valid table; row errors
    /// surface when they are committed.
    pub fn submit(&mut self, context: ContextId, op: Operation, mode: WriteMode) -> Status {
        match mode {
            WriteMode::Shared => self.apply(op),
            WriteMode::Buffered => {
                if self.table(op.table()).is_none() {
                    return Status::TableNotFound;
                }
                self.pending_bytes += op.growth_bound();
                self.pending.entry(context).or_default().push(op);
                Status::Ok
            }
        }
    }

    /// Apply every operation queued by `context`, in submission order
    ///
    /// Returns the first failure, but keeps applying the rest.
    pub fn commit(&mut self, context: ContextId) -> Status {
        let ops = self.pending.remove(&context).unwrap_or_default();
        if !ops.is_empty() {
            tracing::debug!(
                target: "anystore::engine",
                context = %context,
                ops = ops.len(),
                "Applying buffered operations"
            );
        }
        let mut status = Status::Ok;
        for op in ops {
            self.pending_bytes -= op.growth_bound();
            let result = self.apply(op);
            if status.is_ok() {
                status = result;
            }
        }
        status
    }

    /// Number of operations queued by `context`
    pub fn pending_count(&self, context: ContextId) -> usize {
        self.pending.get(&context).map_or(0, Vec::len)
    }

    /// Apply an operation immediately
    pub fn apply(&mut self, op: Operation) -> Status {
        let table_id = op.table();
        let Some(table) = self.tables.get_mut(table_id.as_usize()) else {
            return Status::TableNotFound;
        };
        match op {
            Operation::Insert {
                row, column, value, ..
            } => {
                let row = match row {
                    RowTarget::Key(key) => table.create_row(key).0,
                    RowTarget::Id(id) => id,
                };
                match table.set(row, column, value) {
                    Some(fired) => {
                        self.mark(table_id, fired.iter().copied());
                        Status::Ok
                    }
                    None => Status::RowNotFound,
                }
            }
            Operation::InsertRow { key, values, .. } => {
                let (row, _) = table.create_row(key);
                let mut fired = Vec::new();
                for (column, value) in values.into_iter().enumerate() {
                    if let Some(listeners) = table.set(row, column, value) {
                        fired.extend(listeners);
                    }
                }
                self.mark(table_id, fired);
                Status::Ok
            }
            Operation::Delete { row, .. } => {
                let row = match row {
                    RowTarget::Key(key) => match table.row_id(&key) {
                        Some(id) => id,
                        None => return Status::RowNotFound,
                    },
                    RowTarget::Id(id) => id,
                };
                match table.delete_row(row) {
                    Some(removed) => {
                        self.drop_listeners(table_id, removed);
                        Status::Ok
                    }
                    None => Status::RowNotFound,
                }
            }
            Operation::Clear { .. } => {
                let removed = table.clear();
                self.drop_listeners(table_id, removed);
                Status::Ok
            }
        }
    }

    // ========================================================================
    // Listeners and notifications
    // ========================================================================

    /// Register a listener owned by `owner` on a live row
    pub fn add_listener(
        &mut self,
        table: TableId,
        row: RowId,
        owner: ContextId,
    ) -> Result<ListenerId, Status> {
        let table = self.table_mut(table).ok_or(Status::TableNotFound)?;
        table.add_listener(row, owner).ok_or(Status::RowNotFound)
    }

    /// Remove a listener and any notification still pending for it
    pub fn remove_listener(&mut self, table: TableId, listener: ListenerId) -> bool {
        let removed = self
            .table_mut(table)
            .map(|t| t.remove_listener(listener))
            .unwrap_or(false);
        if removed {
            self.purge(table, &[listener]);
        }
        removed
    }

    /// Take the coalesced set of listeners that fired for `context`
    pub fn take_notifications(&mut self, context: ContextId) -> Vec<(TableId, ListenerId)> {
        self.notifications
            .remove(&context)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default()
    }

    /// Take the listeners owned by `context` that a delete or clear dropped
    /// since the last call
    ///
    /// Explicit removals are not reported; the remover already knows.
    pub fn take_dropped(&mut self, context: ContextId) -> Vec<(TableId, ListenerId)> {
        self.dropped
            .remove(&context)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default()
    }

    fn drop_listeners(
        &mut self,
        table: TableId,
        removed: impl IntoIterator<Item = (ListenerId, ContextId)>,
    ) {
        let mut ids = Vec::new();
        for (listener, owner) in removed {
            self.dropped.entry(owner).or_default().insert((table, listener));
            ids.push(listener);
        }
        self.purge(table, &ids);
    }

    fn mark(&mut self, table: TableId, fired: impl IntoIterator<Item = (ListenerId, ContextId)>) {
        for (listener, owner) in fired {
            self.notifications
                .entry(owner)
                .or_default()
                .insert((table, listener));
        }
    }

    fn purge(&mut self, table: TableId, listeners: &[ListenerId]) {
        if listeners.is_empty() {
            return;
        }
        for pending in self.notifications.values_mut() {
            for listener in listeners {
                pending.remove(&(table, *listener));
            }
        }
    }
}
