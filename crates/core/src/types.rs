//! Identifier types
//!
//! All identifiers cross the boundary as 32-bit primitives. The newtypes
//! keep table, row, listener and context ids from being mixed up on the
//! client side.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Wrap a raw id
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Raw id as it crosses the boundary
            pub const fn as_u32(self) -> u32 {
                self.0
            }

            /// Raw id as a slab index
            pub const fn as_usize(self) -> usize {
                self.0 as usize
            }

            /// Decode an `i32` boundary result where negative means "absent"
            pub fn from_i32(raw: i32) -> Option<Self> {
                u32::try_from(raw).ok().map(Self)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Engine-assigned table id
    TableId,
    "table#"
);

id_type!(
    /// Engine-assigned row id, reused after the row is deleted
    RowId,
    "row#"
);

id_type!(
    /// Engine-issued listener id, unique within a table and never reused
    ListenerId,
    "listener#"
);

id_type!(
    /// Execution context id; `0` is the coordinator context
    ContextId,
    "ctx#"
);

impl ContextId {
    /// The context that created the shared region
    pub const COORDINATOR: ContextId = ContextId::new(0);
}

/// Result codes returned by mutating engine exports
///
/// Exports only return primitives, so failures travel as negative `i32`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Operation applied (or queued, in buffered mode)
    Ok = 0,
    /// No table with the given id
    TableNotFound = -1,
    /// No live row with the given id or key
    RowNotFound = -2,
    /// The shared region cannot grow enough to hold the write
    OutOfMemory = -3,
    /// A table with this name already exists
    DuplicateName = -4,
}

impl Status {
    /// Boundary representation
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Decode a boundary status; unknown codes yield `None`
    pub fn from_code(code: i32) -> Option<Status> {
        match code {
            0 => Some(Status::Ok),
            -1 => Some(Status::TableNotFound),
            -2 => Some(Status::RowNotFound),
            -3 => Some(Status::OutOfMemory),
            -4 => Some(Status::DuplicateName),
            _ => None,
        }
    }

    /// Check for [`Status::Ok`]
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}
