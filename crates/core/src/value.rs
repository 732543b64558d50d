//! Value types stored by state shapes
//!
//! [`Val`] is the dynamically typed payload held by the State and
//! RangedState shapes and returned by field extraction for query layers.
//!
//! ## Type Rules
//!
//! - Different types are never equal: `Long(1) != Double(1.0)`
//! - `Bytes` are not `String`
//! - Doubles compare by bit pattern: `NaN == NaN`, `0.0 != -0.0`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type discriminant of a [`Val`], stored as the first byte of its encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValType {
    /// No value
    Null = 0,
    /// Boolean
    Boolean = 1,
    /// Signed 64-bit integer
    Long = 2,
    /// 64-bit float
    Double = 3,
    /// UTF-8 text
    String = 4,
    /// Raw bytes
    Bytes = 5,
    /// Instant in epoch milliseconds
    Date = 6,
}

impl ValType {
    /// Decode a type tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => ValType::Null,
            1 => ValType::Boolean,
            2 => ValType::Long,
            3 => ValType::Double,
            4 => ValType::String,
            5 => ValType::Bytes,
            6 => ValType::Date,
            _ => return None,
        })
    }

    /// Display name used in field catalogues.
    pub fn name(&self) -> &'static str {
        match self {
            ValType::Null => "null",
            ValType::Boolean => "boolean",
            ValType::Long => "long",
            ValType::Double => "double",
            ValType::String => "string",
            ValType::Bytes => "bytes",
            ValType::Date => "date",
        }
    }
}

/// A dynamically typed state value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Val {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Long(i64),
    /// 64-bit floating point (IEEE-754)
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Instant as milliseconds since the Unix epoch
    Date(i64),
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Null, Val::Null) => true,
            (Val::Boolean(a), Val::Boolean(b)) => a == b,
            (Val::Long(a), Val::Long(b)) => a == b,
            (Val::Double(a), Val::Double(b)) => a.to_bits() == b.to_bits(),
            (Val::String(a), Val::String(b)) => a == b,
            (Val::Bytes(a), Val::Bytes(b)) => a == b,
            (Val::Date(a), Val::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Val {
    /// The type discriminant of this value.
    pub fn val_type(&self) -> ValType {
        match self {
            Val::Null => ValType::Null,
            Val::Boolean(_) => ValType::Boolean,
            Val::Long(_) => ValType::Long,
            Val::Double(_) => ValType::Double,
            Val::String(_) => ValType::String,
            Val::Bytes(_) => ValType::Bytes,
            Val::Date(_) => ValType::Date,
        }
    }

    /// Returns the string if this is a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is a `Long` value.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Val::Long(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Null => write!(f, "null"),
            Val::Boolean(b) => write!(f, "{}", b),
            Val::Long(n) => write!(f, "{}", n),
            Val::Double(d) => write!(f, "{}", d),
            Val::String(s) => write!(f, "{}", s),
            Val::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Val::Date(ms) => write!(f, "{}ms", ms),
        }
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::String(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::String(s)
    }
}

impl From<i64> for Val {
    fn from(n: i64) -> Self {
        Val::Long(n)
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Boolean(b)
    }
}

impl From<f64> for Val {
    fn from(d: f64) -> Self {
        Val::Double(d)
    }
}

impl From<Vec<u8>> for Val {
    fn from(b: Vec<u8>) -> Self {
        Val::Bytes(b)
    }
}
