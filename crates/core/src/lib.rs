//! Core types for AnyStore
//!
//! This crate defines the vocabulary shared by the engine and the client:
//! - [`Value`] and [`Tag`]: the tagged values that cross the boundary
//! - [`Schema`] and [`ColumnMap`]: table layouts
//! - Identifier newtypes and engine [`Status`] codes
//! - [`Exchange`]: the per-call channel that carries values across
//! - [`Error`]: client-side failures

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod exchange;
pub mod schema;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use exchange::{Exchange, Slot};
pub use schema::{Column, ColumnMap, ColumnRef, Schema};
pub use types::{ContextId, ListenerId, RowId, Status, TableId};
pub use value::{FromValue, Tag, Value};
