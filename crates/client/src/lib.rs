//! Client for AnyStore
//!
//! A [`Store`] is one execution context's handle to a shared tabular store.
//! Tables and rows are addressed through [`Table`] and [`Row`] handles;
//! every value crosses into the engine through a [`Marshaller`].
//!
//! - [`Store`]: region creation, context bootstrap, locking, notifications
//! - [`Table`], [`Row`]: typed access to records
//! - [`StoreOptions`]: sizing and transfer settings, loadable from TOML

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bootstrap;
mod listener;
mod lock;
mod marshal;
mod options;
mod row;
mod store;
mod table;

pub use bootstrap::{ContextDescriptor, HostImports};
pub use listener::DispatchReport;
pub use marshal::{Marshaller, TransferMode};
pub use options::{StoreOptions, DEFAULT_INITIAL_PAGES, DEFAULT_MAXIMUM_PAGES};
pub use row::{Row, RowAddress};
pub use store::{Store, TableRef};
pub use table::{Addressing, Table};

pub use anystore_core::{
    Column, ColumnMap, ColumnRef, ContextId, Error, FromValue, ListenerId, Result, RowId, Schema,
    Status, TableId, Tag, Value,
};
pub use anystore_engine::WriteMode;
