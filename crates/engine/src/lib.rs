//! Engine side of AnyStore
//!
//! - [`SharedMemory`]: the region every context attaches to
//! - [`Module`], [`Exports`], [`Imports`]: the primitive-only boundary
//! - [`NativeModule`]: the in-process engine behind that boundary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod module;
pub mod native;

pub use anystore_storage::WriteMode;
pub use memory::{SharedMemory, CONTEXT_COUNTER_CELL, LOCK_CELL, PAGE_SIZE};
pub use module::{Exports, Imports, Module};
pub use native::NativeModule;
