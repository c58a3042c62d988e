//! In-process engine
//!
//! [`NativeModule`] implements the export contract directly on top of the
//! storage heap inside a [`SharedMemory`]. Every context instantiates it
//! against the same region, so all of them see one database.
//!
//! The instance trusts its caller: popping an operand that is not there, or
//! finding the wrong kind of host slot, is a protocol bug and panics.

use crate::memory::{SharedMemory, LOCK_CELL};
use crate::module::{Exports, Imports, Module};
use anystore_core::{ContextId, Exchange, RowId, Slot, Status, TableId, Value};
use anystore_storage::{Database, Operation, RowTarget, WriteMode, ROW_OVERHEAD};
use std::sync::Arc;

/// Length of one retry slice of [`Exports::lock_acquire`], in milliseconds
const LOCK_SLICE_MS: f64 = 1.0;

/// The in-process engine
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeModule {
    mode: WriteMode,
}

impl NativeModule {
    /// Engine applying writes in `mode`
    pub fn new(mode: WriteMode) -> Self {
        Self { mode }
    }

    /// Write mode of every instance of this module
    pub fn mode(&self) -> WriteMode {
        self.mode
    }
}

impl Module for NativeModule {
    fn instantiate(&self, memory: &SharedMemory, imports: Arc<dyn Imports>) -> Arc<dyn Exports> {
        Arc::new(NativeInstance {
            memory: memory.clone(),
            imports,
            mode: self.mode,
        })
    }
}

struct NativeInstance {
    memory: SharedMemory,
    imports: Arc<dyn Imports>,
    mode: WriteMode,
}

impl NativeInstance {
    fn context(&self) -> ContextId {
        self.imports.context_id()
    }

    /// Reserve room for `bound` more bytes; false if the region is full
    fn reserve(&self, db: &Database, bound: usize) -> bool {
        let wanted = db.used_bytes() + bound;
        let ok = self.memory.grow_to_fit(wanted);
        if !ok {
            tracing::warn!(
                target: "anystore::engine",
                wanted,
                limit = self.memory.byte_limit(),
                "Write rejected, shared memory exhausted"
            );
        }
        ok
    }

    fn write(&self, op: Operation) -> i32 {
        let mut db = self.memory.heap();
        if db.table(op.table()).is_none() {
            return Status::TableNotFound.code();
        }
        if !self.reserve(&db, op.growth_bound()) {
            return Status::OutOfMemory.code();
        }
        db.submit(self.context(), op, self.mode).code()
    }

    /// Row id for `key`, allocating the row if needed
    fn ensure_row(&self, table: TableId, key: Value) -> Result<RowId, Status> {
        let mut db = self.memory.heap();
        let existing = db.table(table).ok_or(Status::TableNotFound)?.row_id(&key);
        if let Some(row) = existing {
            return Ok(row);
        }
        if !self.reserve(&db, ROW_OVERHEAD + key.footprint()) {
            return Err(Status::OutOfMemory);
        }
        db.create_row(table, key)
    }
}

/// Write a value to the host side of the exchange
fn emit(ex: &mut Exchange, value: Value) {
    match value {
        Value::I32(v) => ex.put_i32(v),
        Value::F64(v) => ex.put_f64(v),
        Value::String(s) => {
            ex.create_string();
            ex.extend_string(s.encode_utf16());
        }
        Value::Blob(b) => {
            ex.create_blob(b.len());
            ex.write_blob(&b);
        }
        Value::Null => ex.push_null(),
    }
}

/// Emit a row's stored values followed by their count
fn emit_row(ex: &mut Exchange, values: Option<&[Value]>) {
    let values = values.unwrap_or_default();
    for value in values {
        emit(ex, value.clone());
    }
    ex.put_i32(values.len() as i32);
}

fn id_or_status(result: Result<u32, Status>) -> i32 {
    match result {
        Ok(id) => id as i32,
        Err(status) => status.code(),
    }
}

impl Exports for NativeInstance {
    fn start(&self) {
        self.imports
            .log(&format!("engine start with context {}", self.context()));
    }

    fn something_push_i32(&self, ex: &mut Exchange, value: i32) {
        ex.push_operand(Value::I32(value));
    }

    fn something_push_f64(&self, ex: &mut Exchange, value: f64) {
        ex.push_operand(Value::F64(value));
    }

    fn something_push_null(&self, ex: &mut Exchange) {
        ex.push_operand(Value::Null);
    }

    fn something_push_string(&self, ex: &mut Exchange) {
        match ex.pop_stack() {
            Slot::Text(units) => ex.push_operand(Value::String(String::from_utf16_lossy(&units))),
            other => panic!(
                "exchange protocol violation: expected a string slot, found {:?}",
                other
            ),
        }
    }

    fn something_push_blob(&self, ex: &mut Exchange) {
        ex.read_blob_length();
        match ex.pop_stack() {
            Slot::Blob { bytes, .. } => ex.push_operand(Value::Blob(bytes)),
            other => panic!(
                "exchange protocol violation: expected a blob slot, found {:?}",
                other
            ),
        }
    }

    fn something_pop_from_stack(&self, ex: &mut Exchange) {
        let value = ex.pop_operand();
        emit(ex, value);
    }

    // ========================================================================
    // Tables
    // ========================================================================

    fn table_create(&self, ex: &mut Exchange) -> i32 {
        let name = match ex.pop_operand() {
            Value::String(name) => Some(name),
            Value::Null => None,
            other => panic!(
                "exchange protocol violation: table name must be a string, found {}",
                other.tag()
            ),
        };
        let result = self.memory.heap().create_table(name.clone());
        if let Ok(id) = result {
            tracing::debug!(
                target: "anystore::engine",
                table = %id,
                name = name.as_deref().unwrap_or("<anonymous>"),
                "Table created"
            );
        }
        id_or_status(result.map(TableId::as_u32))
    }

    fn table_get_id_from_name(&self, ex: &mut Exchange) -> i32 {
        let found = match ex.pop_operand() {
            Value::String(name) => self.memory.heap().table_id(&name),
            _ => None,
        };
        found.map_or(-1, |id| id.as_u32() as i32)
    }

    fn table_exists(&self, table: u32) -> bool {
        self.memory.heap().table(TableId::new(table)).is_some()
    }

    fn table_clear(&self, table: u32) -> i32 {
        self.write(Operation::Clear {
            table: TableId::new(table),
        })
    }

    fn table_insert(&self, ex: &mut Exchange, table: u32, column: u32) -> i32 {
        let key = ex.pop_operand();
        let value = ex.pop_operand();
        self.write(Operation::Insert {
            table: TableId::new(table),
            row: RowTarget::Key(key),
            column: column as usize,
            value,
        })
    }

    fn table_insert_row(&self, ex: &mut Exchange, table: u32) -> i32 {
        let key = ex.pop_operand();
        let values = ex.drain_operands();
        self.write(Operation::InsertRow {
            table: TableId::new(table),
            key,
            values,
        })
    }

    fn table_get_something(&self, ex: &mut Exchange, table: u32, column: u32) {
        let key = ex.pop_operand();
        let value = {
            let db = self.memory.heap();
            db.table(TableId::new(table))
                .and_then(|t| t.row_id(&key).and_then(|row| t.get(row, column as usize)))
                .cloned()
        };
        emit(ex, value.unwrap_or(Value::Null));
    }

    fn table_get_row(&self, ex: &mut Exchange, table: u32) {
        let key = ex.pop_operand();
        let db = self.memory.heap();
        let values = db
            .table(TableId::new(table))
            .and_then(|t| t.row_id(&key).and_then(|row| t.row_values(row)));
        emit_row(ex, values);
    }

    fn table_delete_row(&self, ex: &mut Exchange, table: u32) -> i32 {
        let key = ex.pop_operand();
        self.write(Operation::Delete {
            table: TableId::new(table),
            row: RowTarget::Key(key),
        })
    }

    fn table_where(&self, ex: &mut Exchange, table: u32, column: u32) -> u32 {
        let value = ex.pop_operand();
        let matches = self
            .memory
            .heap()
            .table(TableId::new(table))
            .map(|t| t.where_eq(column as usize, &value))
            .unwrap_or_default();
        let count = matches.len() as u32;
        for (row, key) in matches {
            emit(ex, key);
            ex.put_i32(row.as_u32() as i32);
        }
        count
    }

    // ========================================================================
    // Rows by id
    // ========================================================================

    fn row_create(&self, ex: &mut Exchange, table: u32) -> i32 {
        let key = ex.pop_operand();
        id_or_status(self.ensure_row(TableId::new(table), key).map(RowId::as_u32))
    }

    fn row_get_id(&self, ex: &mut Exchange, table: u32) -> i32 {
        let key = ex.pop_operand();
        self.memory
            .heap()
            .table(TableId::new(table))
            .and_then(|t| t.row_id(&key))
            .map_or(-1, |row| row.as_u32() as i32)
    }

    fn row_insert(&self, ex: &mut Exchange, table: u32, row: u32, column: u32) -> i32 {
        let value = ex.pop_operand();
        self.write(Operation::Insert {
            table: TableId::new(table),
            row: RowTarget::Id(RowId::new(row)),
            column: column as usize,
            value,
        })
    }

    fn row_get(&self, ex: &mut Exchange, table: u32, row: u32, column: u32) {
        let value = self
            .memory
            .heap()
            .table(TableId::new(table))
            .and_then(|t| t.get(RowId::new(row), column as usize))
            .cloned();
        emit(ex, value.unwrap_or(Value::Null));
    }

    fn row_get_all(&self, ex: &mut Exchange, table: u32, row: u32) {
        let db = self.memory.heap();
        let values = db
            .table(TableId::new(table))
            .and_then(|t| t.row_values(RowId::new(row)));
        emit_row(ex, values);
    }

    fn row_delete(&self, table: u32, row: u32) -> i32 {
        self.write(Operation::Delete {
            table: TableId::new(table),
            row: RowTarget::Id(RowId::new(row)),
        })
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    fn row_add_listener(&self, table: u32, row: u32) -> i32 {
        let result =
            self.memory
                .heap()
                .add_listener(TableId::new(table), RowId::new(row), self.context());
        id_or_status(result.map(|id| id.as_u32()))
    }

    fn table_add_listener(&self, ex: &mut Exchange, table: u32) -> i32 {
        let key = ex.pop_operand();
        let table = TableId::new(table);
        let result = self.ensure_row(table, key).and_then(|row| {
            self.memory
                .heap()
                .add_listener(table, row, self.context())
        });
        id_or_status(result.map(|id| id.as_u32()))
    }

    fn table_remove_listener(&self, table: u32, listener: u32) -> bool {
        self.memory
            .heap()
            .remove_listener(TableId::new(table), listener.into())
    }

    fn db_take_notifications(&self, ex: &mut Exchange) -> u32 {
        let fired = self.memory.heap().take_notifications(self.context());
        for (table, listener) in &fired {
            ex.put_i32(table.as_u32() as i32);
            ex.put_i32(listener.as_u32() as i32);
        }
        fired.len() as u32
    }

    fn db_take_dropped_listeners(&self, ex: &mut Exchange) -> u32 {
        let dropped = self.memory.heap().take_dropped(self.context());
        for (table, listener) in &dropped {
            ex.put_i32(table.as_u32() as i32);
            ex.put_i32(listener.as_u32() as i32);
        }
        dropped.len() as u32
    }

    // ========================================================================
    // Lock
    // ========================================================================

    fn lock_try_acquire(&self) -> bool {
        self.memory.compare_exchange(LOCK_CELL, 0, 1)
    }

    fn lock_acquire(&self) {
        while !self.lock_try_acquire() {
            let start = self.imports.now();
            while self.imports.now() - start < LOCK_SLICE_MS {
                std::hint::spin_loop();
            }
        }
    }

    fn lock_release(&self) {
        self.memory.store(LOCK_CELL, 0);
        self.memory.notify(LOCK_CELL);
    }

    fn lock_address(&self) -> u32 {
        LOCK_CELL
    }

    fn commit(&self) -> i32 {
        self.memory.heap().commit(self.context()).code()
    }
}
