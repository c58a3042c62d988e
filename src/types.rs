//! Public types for the AnyStore facade.
//!
//! This module re-exports types from the member crates with a flat public
//! interface.

// ============================================================================
// Values and schemas
// ============================================================================

pub use anystore_core::{FromValue, Tag, Value};
pub use anystore_core::{Column, ColumnMap, ColumnRef, Schema};

// ============================================================================
// Identifiers and status codes
// ============================================================================

pub use anystore_core::{ContextId, ListenerId, RowId, Status, TableId};

// ============================================================================
// Handles
// ============================================================================

pub use anystore_client::{Addressing, Row, RowAddress, Store, Table, TableRef};
pub use anystore_client::{ContextDescriptor, DispatchReport, HostImports};

// ============================================================================
// Configuration
// ============================================================================

pub use anystore_client::{StoreOptions, TransferMode, WriteMode};
