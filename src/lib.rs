//! AnyStore: a tabular store shared by several execution contexts
//!
//! One context creates the store; others attach through a
//! [`ContextDescriptor`] and see the same tables without copying. Access is
//! serialised by a region-wide lock, and row listeners are delivered to the
//! context that registered them when it calls [`Store::notify_all`].
//!
//! ```ignore
//! use anystore::{Schema, Store, StoreOptions, Tag};
//!
//! let store = Store::create(StoreOptions::default())?;
//! let people = store.create_table(
//!     &Schema::new().column("name", Tag::String).column("age", Tag::I32),
//!     Some("people"),
//! )?;
//! people.row("ada")?.set("age", 36)?;
//!
//! let worker = store.create_context_descriptor();
//! std::thread::spawn(move || {
//!     let store = Store::attach(worker);
//!     // ...
//! });
//! ```
//!
//! The member crates are re-exported for lower-level use:
//! [`engine`] for the shared region and module boundary, [`concurrency`]
//! for the lock coordinator.

#![warn(missing_docs)]

pub mod types;

pub use anystore_client::{Error, Marshaller, Result, DEFAULT_INITIAL_PAGES, DEFAULT_MAXIMUM_PAGES};
pub use types::*;

pub use anystore_concurrency as concurrency;
pub use anystore_engine as engine;
