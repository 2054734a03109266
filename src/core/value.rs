//! Database value types
//!
//! This module defines the dynamic value carried through parameter binding and
//! row materialization, together with the declared parameter types and the
//! coercions applied to them.

use serde::{Deserialize, Serialize};

/// Database value that can hold different types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum DatabaseValue {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// 64-bit floating point
    Double(f64),
    /// String value
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
}

/// Declared type tag of a bound parameter or output column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Null,
    Int,
    Bool,
    #[default]
    Str,
}

/// Native bind-type code for integer parameters
pub const BIND_INT: char = 'i';
/// Native bind-type code for double parameters
pub const BIND_DOUBLE: char = 'd';
/// Native bind-type code for string parameters (the default)
pub const BIND_STR: char = 's';
/// Native bind-type code for blob parameters
pub const BIND_BLOB: char = 'b';

impl ParamType {
    /// Native bind-type code: integers bind as integers, everything else as strings
    pub fn bind_code(self) -> char {
        match self {
            ParamType::Int => BIND_INT,
            _ => BIND_STR,
        }
    }
}

impl DatabaseValue {
    /// Get the value as a boolean under [`is_truthy`](Self::is_truthy); `None` for null
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Null => None,
            other => Some(other.is_truthy()),
        }
    }

    /// Get the value as an i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int(v) => Some(*v),
            DatabaseValue::Double(v) => Some(*v as i64),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get the value as an f64
    pub fn as_double(&self) -> Option<f64> {
        match self {
            DatabaseValue::Double(v) => Some(*v),
            DatabaseValue::Int(v) => Some(*v as f64),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            DatabaseValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Get the value as a string (zero-copy for String values)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the value as bytes (zero-copy)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DatabaseValue::Bytes(b) => Some(b),
            DatabaseValue::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Textual form used when a value is bound or cast as a string.
    ///
    /// Null renders empty, booleans render `1` / empty.
    pub fn to_text(&self) -> String {
        match self {
            DatabaseValue::Null => String::new(),
            DatabaseValue::Bool(true) => "1".to_string(),
            DatabaseValue::Bool(false) => String::new(),
            DatabaseValue::Int(v) => v.to_string(),
            DatabaseValue::Double(v) => v.to_string(),
            DatabaseValue::String(s) => s.clone(),
            DatabaseValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    /// Integer parse that never fails: the leading integer of a string, the
    /// truncated value of a double, `0` when nothing parses.
    pub fn to_int_lossy(&self) -> i64 {
        match self {
            DatabaseValue::Null => 0,
            DatabaseValue::Bool(v) => *v as i64,
            DatabaseValue::Int(v) => *v,
            DatabaseValue::Double(v) => *v as i64,
            DatabaseValue::String(s) => leading_int(s),
            DatabaseValue::Bytes(b) => leading_int(&String::from_utf8_lossy(b)),
        }
    }

    /// Truthiness used for boolean parameters.
    ///
    /// `"false"`, `"f"` (any case), empty and `"0"` strings are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            DatabaseValue::Null => false,
            DatabaseValue::Bool(v) => *v,
            DatabaseValue::Int(v) => *v != 0,
            DatabaseValue::Double(v) => *v != 0.0,
            DatabaseValue::String(s) => {
                !matches!(s.to_lowercase().as_str(), "" | "0" | "false" | "f")
            }
            DatabaseValue::Bytes(b) => !b.is_empty(),
        }
    }

    /// Character-based truncation to at most `max_len` characters.
    ///
    /// Null passes through; other values are truncated on their textual form.
    pub fn truncated(self, max_len: usize) -> DatabaseValue {
        match self {
            DatabaseValue::Null => DatabaseValue::Null,
            DatabaseValue::String(s) if s.chars().count() <= max_len => DatabaseValue::String(s),
            other => DatabaseValue::String(other.to_text().chars().take(max_len).collect()),
        }
    }

    /// Cast to the declared parameter type
    pub fn coerce(&self, param_type: ParamType) -> DatabaseValue {
        match param_type {
            ParamType::Null => DatabaseValue::Null,
            ParamType::Int => DatabaseValue::Int(self.to_int_lossy()),
            ParamType::Bool => DatabaseValue::Bool(self.is_truthy()),
            ParamType::Str => DatabaseValue::String(self.to_text()),
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "null",
            DatabaseValue::Bool(_) => "bool",
            DatabaseValue::Int(_) => "int",
            DatabaseValue::Double(_) => "double",
            DatabaseValue::String(_) => "string",
            DatabaseValue::Bytes(_) => "bytes",
        }
    }
}

fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude = digits[..end].bytes().fold(0i64, |acc, d| {
        acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
    });
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

impl std::fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseValue::Null => f.write_str("NULL"),
            other => f.write_str(&other.to_text()),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(v: bool) -> Self {
        DatabaseValue::Bool(v)
    }
}

impl From<i32> for DatabaseValue {
    fn from(v: i32) -> Self {
        DatabaseValue::Int(i64::from(v))
    }
}

impl From<i64> for DatabaseValue {
    fn from(v: i64) -> Self {
        DatabaseValue::Int(v)
    }
}

impl From<f64> for DatabaseValue {
    fn from(v: f64) -> Self {
        DatabaseValue::Double(v)
    }
}

impl From<String> for DatabaseValue {
    fn from(v: String) -> Self {
        DatabaseValue::String(v)
    }
}

impl From<&str> for DatabaseValue {
    fn from(v: &str) -> Self {
        DatabaseValue::String(v.to_string())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(v: Vec<u8>) -> Self {
        DatabaseValue::Bytes(v)
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DatabaseValue::Null,
        }
    }
}
