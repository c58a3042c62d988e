//! Error types
//!
//! Absence (unknown table name, missing row, unset column) is never an
//! error: it is reported as `None`. Errors are reserved for programming
//! mistakes the client can detect locally and for engine refusals.

use crate::types::Status;
use crate::value::Tag;
use thiserror::Error;

/// Result alias used across the client crates
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the client
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Column name not present in the table's column map
    #[error("unknown column '{column}'")]
    UnknownColumn {
        /// The name that was looked up
        column: String,
    },

    /// Column index past the end of the column map
    #[error("column index {index} out of range for {len} columns")]
    ColumnOutOfRange {
        /// Requested index
        index: usize,
        /// Number of columns in the map
        len: usize,
    },

    /// Same column name declared twice in a schema
    #[error("duplicate column '{column}' in schema")]
    DuplicateColumn {
        /// The repeated name
        column: String,
    },

    /// Value tag differs from the tag declared for its column
    #[error("type mismatch on column '{column}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// Column name
        column: String,
        /// Declared tag
        expected: Tag,
        /// Tag of the rejected value
        actual: Tag,
    },

    /// Row data supplied for a different number of columns
    #[error("row has {actual} values but the table has {expected} columns")]
    ArityMismatch {
        /// Number of columns in the map
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// The engine has no table with this id
    #[error("table not found: {table}")]
    TableNotFound {
        /// Table id or name
        table: String,
    },

    /// The addressed row does not exist (mutations only; reads return `None`)
    #[error("row not found")]
    RowNotFound,

    /// A table with this name already exists
    #[error("a table named '{name}' already exists")]
    DuplicateTable {
        /// Table name
        name: String,
    },

    /// The shared region reached its maximum size
    #[error("shared region exhausted (limit {limit} bytes)")]
    OutOfMemory {
        /// Maximum region size in bytes
        limit: usize,
    },

    /// Status code the client does not understand
    #[error("engine returned unknown status {status}")]
    Engine {
        /// Raw status code
        status: i32,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Map an engine status to a result
    ///
    /// # Arguments
    ///
    /// * `code` - raw status returned by an export
    /// * `table` - table label used in `TableNotFound`
    /// * `limit` - region limit used in `OutOfMemory`
    pub fn check_status(code: i32, table: impl FnOnce() -> String, limit: usize) -> Result<()> {
        match Status::from_code(code) {
            Some(Status::Ok) => Ok(()),
            Some(Status::TableNotFound) => Err(Error::TableNotFound { table: table() }),
            Some(Status::RowNotFound) => Err(Error::RowNotFound),
            Some(Status::OutOfMemory) => Err(Error::OutOfMemory { limit }),
            Some(Status::DuplicateName) => Err(Error::DuplicateTable { name: table() }),
            None => Err(Error::Engine { status: code }),
        }
    }
}
