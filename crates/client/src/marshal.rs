//! Value marshalling
//!
//! Turns [`Value`]s into boundary calls and back. Every operation runs on
//! its own [`Exchange`] through [`Marshaller::call`], which checks that the
//! channel is empty again when the operation is done.
//!
//! Push rules:
//! - `i32`/`f64`: one numeric argument
//! - string: build a host string, then ask the engine to materialise it
//! - blob: announce its length, write the bytes, then materialise it
//! - null: one no-payload call
//!
//! Strings and blobs are transferred one UTF-16 unit or byte per call, or
//! in one bulk call, depending on [`TransferMode`].

use anystore_core::{Exchange, Slot, Value};
use anystore_engine::Exports;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How strings and blobs cross the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// One call per UTF-16 unit or byte (default)
    #[default]
    PerUnit,
    /// One call for the whole payload
    Bulk,
}

/// Encoder/decoder bound to one engine instance
#[derive(Clone)]
pub struct Marshaller {
    exports: Arc<dyn Exports>,
    transfer: TransferMode,
}

impl Marshaller {
    /// Marshaller for `exports`
    pub fn new(exports: Arc<dyn Exports>, transfer: TransferMode) -> Self {
        Self { exports, transfer }
    }

    /// The engine instance values are sent to
    pub fn exports(&self) -> &dyn Exports {
        self.exports.as_ref()
    }

    /// Transfer mode in use
    pub fn transfer(&self) -> TransferMode {
        self.transfer
    }

    /// Run one operation on a fresh exchange
    ///
    /// # Panics
    ///
    /// Panics if `f` leaves anything on the exchange.
    pub fn call<R>(&self, f: impl FnOnce(&dyn Exports, &mut Exchange) -> R) -> R {
        let mut ex = Exchange::new();
        let result = f(self.exports.as_ref(), &mut ex);
        ex.finish();
        result
    }

    /// Push one value as an engine operand
    pub fn push(&self, ex: &mut Exchange, value: &Value) {
        let e = self.exports.as_ref();
        match value {
            Value::I32(v) => e.something_push_i32(ex, *v),
            Value::F64(v) => e.something_push_f64(ex, *v),
            Value::String(s) => {
                ex.create_string();
                match self.transfer {
                    TransferMode::PerUnit => {
                        for unit in s.encode_utf16() {
                            ex.push_to_string(unit);
                        }
                    }
                    TransferMode::Bulk => ex.extend_string(s.encode_utf16()),
                }
                e.something_push_string(ex);
            }
            Value::Blob(bytes) => {
                ex.create_blob(bytes.len());
                match self.transfer {
                    TransferMode::PerUnit => {
                        for byte in bytes {
                            ex.push_to_blob(*byte);
                        }
                    }
                    TransferMode::Bulk => ex.write_blob(bytes),
                }
                e.something_push_blob(ex);
            }
            Value::Null => e.something_push_null(ex),
        }
    }

    /// Push several values, in order
    pub fn push_all<'v>(&self, ex: &mut Exchange, values: impl IntoIterator<Item = &'v Value>) {
        for value in values {
            self.push(ex, value);
        }
    }

    /// Pop one result the engine left on the host stack
    ///
    /// In per-unit mode strings and blobs are read back one unit at a time
    /// before their slot is popped.
    pub fn pop(&self, ex: &mut Exchange) -> Value {
        if self.transfer == TransferMode::PerUnit {
            if matches!(ex.top(), Some(Slot::Text(_))) {
                let len = ex.read_string_length();
                let units: Vec<u16> = (0..len).map(|i| ex.read_string(i)).collect();
                ex.pop_stack();
                return Value::String(String::from_utf16_lossy(&units));
            }
            if matches!(ex.top(), Some(Slot::Blob { .. })) {
                let len = ex.read_blob_length();
                let bytes: Vec<u8> = (0..len).map(|i| ex.read_blob_byte(i)).collect();
                ex.pop_stack();
                return Value::Blob(bytes);
            }
        }
        match ex.pop_stack() {
            Slot::I32(v) => Value::I32(v),
            Slot::F64(v) => Value::F64(v),
            Slot::Text(units) => Value::String(String::from_utf16_lossy(&units)),
            Slot::Blob { bytes, .. } => Value::Blob(bytes),
            Slot::Null => Value::Null,
        }
    }

    /// Pop an `i32` the engine left on the host stack
    ///
    /// # Panics
    ///
    /// Panics if the top slot is not an integer.
    pub fn pop_i32(&self, ex: &mut Exchange) -> i32 {
        match ex.pop_stack() {
            Slot::I32(v) => v,
            other => panic!(
                "exchange protocol violation: expected an integer result, found {:?}",
                other
            ),
        }
    }

    /// Push `value` and read it straight back through the engine
    pub fn round_trip(&self, value: &Value) -> Value {
        self.call(|e, ex| {
            self.push(ex, value);
            e.something_pop_from_stack(ex);
            self.pop(ex)
        })
    }
}
