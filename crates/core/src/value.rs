//! Tagged values
//!
//! Every value that crosses the engine boundary carries an explicit [`Tag`].
//! The engine trusts the tag it is given and never infers one, so the
//! client is the only place where tag integrity can be enforced.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Type tag of a [`Value`]
///
/// The discriminants are the wire tags used on the exchange channel and
/// must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Tag {
    /// 32-bit signed integer
    I32 = 0,
    /// 64-bit float
    F64 = 1,
    /// UTF-16 string
    String = 2,
    /// Byte blob
    Blob = 3,
    /// No payload
    Null = 4,
}

impl Tag {
    /// Wire representation of this tag
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire tag
    pub fn from_u8(raw: u8) -> Option<Tag> {
        match raw {
            0 => Some(Tag::I32),
            1 => Some(Tag::F64),
            2 => Some(Tag::String),
            3 => Some(Tag::Blob),
            4 => Some(Tag::Null),
            _ => None,
        }
    }

    /// Lowercase name, as used in schema descriptions
    pub fn name(self) -> &'static str {
        match self {
            Tag::I32 => "i32",
            Tag::F64 => "f64",
            Tag::String => "string",
            Tag::Blob => "blob",
            Tag::Null => "null",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tagged value: the closed set of types the store can hold
///
/// Floats compare by their IEEE total order, so `NaN == NaN` when the bit
/// patterns match and `-0.0 != 0.0`. Values of different tags order by tag.
/// This makes `Value` usable as a key in ordered maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit float
    F64(f64),
    /// Text (transferred as UTF-16 code units)
    String(String),
    /// Raw bytes
    Blob(Vec<u8>),
    /// Explicit null
    Null,
}

impl Value {
    /// The tag this value carries across the boundary
    pub fn tag(&self) -> Tag {
        match self {
            Value::I32(_) => Tag::I32,
            Value::F64(_) => Tag::F64,
            Value::String(_) => Tag::String,
            Value::Blob(_) => Tag::Blob,
            Value::Null => Tag::Null,
        }
    }

    /// Check for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Query equality: IEEE `==` for floats, tag and payload otherwise
    ///
    /// Unlike `==`, which is a total order used for key lookups, `0.0`
    /// matches `-0.0` here and `NaN` matches nothing.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::F64(a), Value::F64(b)) => a == b,
            (a, b) => a == b,
        }
    }

    /// Map `Null` to `None`, anything else to `Some`
    pub fn into_option(self) -> Option<Value> {
        match self {
            Value::Null => None,
            other => Some(other),
        }
    }

    /// Approximate number of bytes this value occupies once stored
    ///
    /// Used by the engine's region accounting; inline payloads count their
    /// width, heap payloads their length.
    pub fn footprint(&self) -> usize {
        1 + match self {
            Value::I32(_) => 4,
            Value::F64(_) => 8,
            Value::String(s) => 4 + s.len(),
            Value::Blob(b) => 4 + b.len(),
            Value::Null => 0,
        }
    }

    /// Integer payload, if this is an `I32`
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Float payload, if this is an `F64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload, if this is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Blob payload, if this is a `Blob`
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::I32(a), Value::I32(b)) => a.cmp(b),
            (Value::F64(a), Value::F64(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            (a, b) => a.tag().cmp(&b.tag()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.tag().as_u8());
        match self {
            Value::I32(v) => v.hash(state),
            Value::F64(v) => v.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Blob(b) => b.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
            Value::Null => f.write_str("null"),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Extract a native Rust value from a [`Value`] of the matching tag
pub trait FromValue: Sized {
    /// Tag a column must declare to hold this type
    const TAG: Tag;

    /// Convert, or `None` if the tag does not match
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for i32 {
    const TAG: Tag = Tag::I32;

    fn from_value(value: Value) -> Option<Self> {
        value.as_i32()
    }
}

impl FromValue for f64 {
    const TAG: Tag = Tag::F64;

    fn from_value(value: Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for String {
    const TAG: Tag = Tag::String;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FromValue for Vec<u8> {
    const TAG: Tag = Tag::Blob;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }
}
