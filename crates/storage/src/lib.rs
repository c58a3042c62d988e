//! In-region storage for AnyStore
//!
//! This crate holds the data structures that live inside the shared region:
//! - [`Table`]: row slab, key index, listener records
//! - [`Database`]: table registry, notification sets, buffered operations
//!
//! Nothing here is thread-safe on its own. The engine wraps the
//! [`Database`] in a mutex and the cross-context lock decides who may call
//! into it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod table;

pub use database::{Database, Operation, RowTarget, WriteMode};
pub use table::{ListenerRecord, RowSlot, Table, ROW_OVERHEAD};
