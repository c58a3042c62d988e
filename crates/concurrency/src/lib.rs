//! Cross-context locking for AnyStore
//!
//! A single lock in the shared region protects all tables. See
//! [`LockCoordinator`] for the blocking and suspending ways to take it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;

pub use coordinator::{LockCoordinator, LockGuard};
