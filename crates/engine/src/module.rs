//! Engine boundary contract
//!
//! A compiled engine is a [`Module`]. Instantiating it against a
//! [`SharedMemory`] and a set of [`Imports`] yields the [`Exports`]: a flat
//! surface of functions that take and return primitives. Anything richer
//! travels through the [`Exchange`] passed to the call.
//!
//! # Conventions
//!
//! - Writes pop the key first, then the value(s): callers push value(s),
//!   then the key.
//! - Reads pop the key and push exactly one result; absence is `Null`.
//! - Mutating exports return a [`Status`](anystore_core::Status) code.
//!   Exports that allocate return the new id, or a negative status.
//! - Row and listener ids that may be absent are returned as `i32`, with
//!   `-1` for "absent".
//! - None of the table exports synchronise across contexts. Callers hold
//!   the lock.

use crate::memory::SharedMemory;
use anystore_core::{ContextId, Exchange};
use std::sync::Arc;

/// Services the host provides to an engine instance
pub trait Imports: Send + Sync {
    /// Id of the context this instance runs in
    fn context_id(&self) -> ContextId;

    /// Monotonic clock, in milliseconds
    fn now(&self) -> f64;

    /// Diagnostic sink
    fn log(&self, message: &str);
}

/// A compiled engine, shareable across contexts
pub trait Module: Send + Sync {
    /// Bind a new instance to `memory`
    fn instantiate(&self, memory: &SharedMemory, imports: Arc<dyn Imports>) -> Arc<dyn Exports>;
}

/// Functions exported by an engine instance
pub trait Exports: Send + Sync {
    /// Entry point, called once right after instantiation
    fn start(&self);

    // ------------------------------------------------------------------
    // Operand construction
    // ------------------------------------------------------------------

    /// Push an integer operand
    fn something_push_i32(&self, ex: &mut Exchange, value: i32);

    /// Push a float operand
    fn something_push_f64(&self, ex: &mut Exchange, value: f64);

    /// Push a null operand
    fn something_push_null(&self, ex: &mut Exchange);

    /// Materialise the string on top of the host stack as an operand
    fn something_push_string(&self, ex: &mut Exchange);

    /// Materialise the blob on top of the host stack as an operand
    fn something_push_blob(&self, ex: &mut Exchange);

    /// Move the top operand back to the host stack
    fn something_pop_from_stack(&self, ex: &mut Exchange);

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    /// Pop a name (or `Null`) and create a table; returns its id or a status
    fn table_create(&self, ex: &mut Exchange) -> i32;

    /// Pop a name and resolve it; `-1` if no such table
    fn table_get_id_from_name(&self, ex: &mut Exchange) -> i32;

    /// Check whether a table id is allocated
    fn table_exists(&self, table: u32) -> bool;

    /// Delete every row of a table
    fn table_clear(&self, table: u32) -> i32;

    /// Pop key then value; store the value at `(key, column)`
    fn table_insert(&self, ex: &mut Exchange, table: u32, column: u32) -> i32;

    /// Pop key, then take every remaining operand as the row's columns in order
    fn table_insert_row(&self, ex: &mut Exchange, table: u32) -> i32;

    /// Pop key; push the value at `(key, column)`
    fn table_get_something(&self, ex: &mut Exchange, table: u32, column: u32);

    /// Pop key; push the row's stored values in column order, then their count
    fn table_get_row(&self, ex: &mut Exchange, table: u32);

    /// Pop key; delete the row
    fn table_delete_row(&self, ex: &mut Exchange, table: u32) -> i32;

    /// Pop value; push `(key, row id)` for each row whose `column` equals it
    ///
    /// Returns the number of pairs pushed.
    fn table_where(&self, ex: &mut Exchange, table: u32, column: u32) -> u32;

    // ------------------------------------------------------------------
    // Rows by id
    // ------------------------------------------------------------------

    /// Pop key; look up or allocate its row; returns the row id or a status
    fn row_create(&self, ex: &mut Exchange, table: u32) -> i32;

    /// Pop key; returns its row id, `-1` if absent
    fn row_get_id(&self, ex: &mut Exchange, table: u32) -> i32;

    /// Pop value; store it at `(row, column)`
    fn row_insert(&self, ex: &mut Exchange, table: u32, row: u32, column: u32) -> i32;

    /// Push the value at `(row, column)`
    fn row_get(&self, ex: &mut Exchange, table: u32, row: u32, column: u32);

    /// Push the row's stored values in column order, then their count
    fn row_get_all(&self, ex: &mut Exchange, table: u32, row: u32);

    /// Delete a row and the listeners rooted at it
    fn row_delete(&self, table: u32, row: u32) -> i32;

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Listen to a row by id; returns the listener id or a status
    fn row_add_listener(&self, table: u32, row: u32) -> i32;

    /// Pop key; listen to its row; returns the listener id or a status
    fn table_add_listener(&self, ex: &mut Exchange, table: u32) -> i32;

    /// Remove a listener; false if it was not registered
    fn table_remove_listener(&self, table: u32, listener: u32) -> bool;

    /// Push `(table, listener)` for every listener that fired for this
    /// context since the last call; returns the number of pairs
    fn db_take_notifications(&self, ex: &mut Exchange) -> u32;

    /// Push `(table, listener)` for every listener owned by this context
    /// that a row delete or table clear dropped since the last call;
    /// returns the number of pairs
    fn db_take_dropped_listeners(&self, ex: &mut Exchange) -> u32;

    // ------------------------------------------------------------------
    // Lock
    // ------------------------------------------------------------------

    /// Take the lock if it is free
    fn lock_try_acquire(&self) -> bool;

    /// Take the lock, retrying in 1 ms slices of the imported clock
    fn lock_acquire(&self);

    /// Release the lock and wake waiters on its address
    fn lock_release(&self);

    /// Address of the lock word
    fn lock_address(&self) -> u32;

    // ------------------------------------------------------------------
    // Buffered mode
    // ------------------------------------------------------------------

    /// Apply this context's queued operations
    fn commit(&self) -> i32;
}
