//! Exchange channel
//!
//! Engine exports only take and return numbers, so anything richer crosses
//! through an [`Exchange`]: a per-call buffer with two stacks.
//!
//! - The **host** stack holds client-side slots. The client builds strings
//!   and blobs here, and the engine writes results here (these are the
//!   engine's imports: `put_i32`, `create_string`, `push_to_string`, ...).
//! - The **operand** stack holds values the engine has materialised from
//!   host slots (`something_push_*` exports) and is consumed by table
//!   operations.
//!
//! One `Exchange` is created per operation and must be empty again when
//! the operation ends. Any imbalance is a protocol bug: it panics instead of
//! being reported, because it would corrupt every later call.

use crate::value::Value;

/// One host-side entry
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Integer primitive
    I32(i32),
    /// Float primitive
    F64(f64),
    /// String under construction or being read back, as UTF-16 units
    Text(Vec<u16>),
    /// Blob with the length announced at creation
    Blob {
        /// Length requested by `create_blob`
        declared: usize,
        /// Bytes written so far
        bytes: Vec<u8>,
    },
    /// Null marker
    Null,
}

/// Per-call exchange buffer between client and engine
#[derive(Debug, Default)]
pub struct Exchange {
    host: Vec<Slot>,
    operands: Vec<Value>,
}

impl Exchange {
    /// Empty channel
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Host stack: primitives
    // =========================================================================

    /// Push an integer slot
    pub fn put_i32(&mut self, value: i32) {
        self.host.push(Slot::I32(value));
    }

    /// Push a float slot
    pub fn put_f64(&mut self, value: f64) {
        self.host.push(Slot::F64(value));
    }

    /// Push a null slot
    pub fn push_null(&mut self) {
        self.host.push(Slot::Null);
    }

    // =========================================================================
    // Host stack: strings
    // =========================================================================

    /// Start a new empty string slot
    pub fn create_string(&mut self) {
        self.host.push(Slot::Text(Vec::new()));
    }

    /// Append one UTF-16 unit to the string on top
    pub fn push_to_string(&mut self, unit: u16) {
        self.top_text_mut().push(unit);
    }

    /// Append many UTF-16 units to the string on top
    pub fn extend_string(&mut self, units: impl IntoIterator<Item = u16>) {
        self.top_text_mut().extend(units);
    }

    /// Number of UTF-16 units in the string on top
    pub fn read_string_length(&self) -> usize {
        match self.host.last() {
            Some(Slot::Text(units)) => units.len(),
            other => protocol_violation("read_string_length", other),
        }
    }

    /// One UTF-16 unit of the string on top
    pub fn read_string(&self, index: usize) -> u16 {
        match self.host.last() {
            Some(Slot::Text(units)) => units[index],
            other => protocol_violation("read_string", other),
        }
    }

    // =========================================================================
    // Host stack: blobs
    // =========================================================================

    /// Start a new blob slot of `len` bytes
    pub fn create_blob(&mut self, len: usize) {
        self.host.push(Slot::Blob {
            declared: len,
            bytes: Vec::with_capacity(len),
        });
    }

    /// Append one byte to the blob on top
    pub fn push_to_blob(&mut self, byte: u8) {
        self.append_blob(&[byte]);
    }

    /// Append many bytes to the blob on top
    pub fn write_blob(&mut self, data: &[u8]) {
        self.append_blob(data);
    }

    /// Length of the blob on top
    pub fn read_blob_length(&self) -> usize {
        match self.host.last() {
            Some(Slot::Blob { bytes, declared }) => {
                assert_eq!(
                    bytes.len(),
                    *declared,
                    "exchange protocol violation: blob read before it was fully written"
                );
                bytes.len()
            }
            other => protocol_violation("read_blob_length", other),
        }
    }

    /// One byte of the blob on top
    pub fn read_blob_byte(&self, index: usize) -> u8 {
        match self.host.last() {
            Some(Slot::Blob { bytes, .. }) => bytes[index],
            other => protocol_violation("read_blob_byte", other),
        }
    }

    // =========================================================================
    // Host stack: removal
    // =========================================================================

    /// Remove and return the top host slot
    ///
    /// # Panics
    ///
    /// Panics if the host stack is empty.
    pub fn pop_stack(&mut self) -> Slot {
        match self.host.pop() {
            Some(slot) => slot,
            None => panic!("exchange protocol violation: pop from empty host stack"),
        }
    }

    /// Top host slot, without removing it
    pub fn top(&self) -> Option<&Slot> {
        self.host.last()
    }

    /// Number of host slots
    pub fn host_len(&self) -> usize {
        self.host.len()
    }

    // =========================================================================
    // Operand stack
    // =========================================================================

    /// Push a materialised value
    pub fn push_operand(&mut self, value: Value) {
        self.operands.push(value);
    }

    /// Pop the most recent operand
    ///
    /// # Panics
    ///
    /// Panics if no operand is pending.
    pub fn pop_operand(&mut self) -> Value {
        match self.operands.pop() {
            Some(value) => value,
            None => panic!("exchange protocol violation: pop from empty operand stack"),
        }
    }

    /// Take every pending operand, oldest first
    pub fn drain_operands(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.operands)
    }

    /// Number of pending operands
    pub fn operand_len(&self) -> usize {
        self.operands.len()
    }

    /// Check that nothing is left on either stack
    pub fn is_balanced(&self) -> bool {
        self.host.is_empty() && self.operands.is_empty()
    }

    /// Close the channel at the end of an operation
    ///
    /// # Panics
    ///
    /// Panics if any host slot or operand is left over.
    pub fn finish(self) {
        assert!(
            self.is_balanced(),
            "exchange protocol violation: {} host slot(s) and {} operand(s) left after operation",
            self.host.len(),
            self.operands.len()
        );
    }

    fn top_text_mut(&mut self) -> &mut Vec<u16> {
        match self.host.last_mut() {
            Some(Slot::Text(units)) => units,
            other => protocol_violation("push_to_string", other.as_deref()),
        }
    }

    fn append_blob(&mut self, data: &[u8]) {
        match self.host.last_mut() {
            Some(Slot::Blob { bytes, declared }) => {
                assert!(
                    bytes.len() + data.len() <= *declared,
                    "exchange protocol violation: blob write past declared length {}",
                    declared
                );
                bytes.extend_from_slice(data);
            }
            other => protocol_violation("push_to_blob", other.as_deref()),
        }
    }
}

fn protocol_violation(op: &str, top: Option<&Slot>) -> ! {
    panic!(
        "exchange protocol violation: {} with top slot {:?}",
        op, top
    )
}
