//! Tagged-union scalar values
//!
//! A [`Value`] is one of bool, int64, uint64, float64, string, timestamp or
//! byte sequence, or an explicit null that still remembers the type it was
//! meant to have. The discriminant of a value never changes: conversions
//! build a new value of the requested type, and a conversion that cannot be
//! performed degrades to a null of that type instead of failing.
//!
//! # Conversion rules
//!
//! | from \ to | numeric            | time                 | string        | bytes   |
//! |-----------|--------------------|----------------------|---------------|---------|
//! | bool      | `true`→1, `false`→0 | null                 | `true`/`false`| null    |
//! | numeric   | truncating cast    | Unix seconds         | decimal       | null    |
//! | time      | Unix seconds       | itself               | RFC 3339      | null    |
//! | string    | parsed             | RFC 3339 parsed      | itself        | UTF-8   |
//! | bytes     | null               | null                 | UTF-8 (lossy) | itself  |

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::error::Error;

/// The discriminant of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Boolean
    Bool,
    /// Signed 64-bit integer
    Int,
    /// Unsigned 64-bit integer
    Uint,
    /// 64-bit float
    Float,
    /// UTF-8 string
    String,
    /// UTC timestamp with nanosecond precision
    Time,
    /// Raw byte sequence
    Bytes,
}

impl ValueType {
    /// Lower-case name used in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::String => "string",
            Self::Time => "time",
            Self::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Bool),
            "int" | "int64" | "integer" => Ok(Self::Int),
            "uint" | "uint64" => Ok(Self::Uint),
            "float" | "float64" | "double" => Ok(Self::Float),
            "string" | "str" => Ok(Self::String),
            "time" | "timestamp" => Ok(Self::Time),
            "bytes" => Ok(Self::Bytes),
            other => Err(Error::invalid(format!("unknown value type '{other}'"))),
        }
    }
}

/// A scalar flowing through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    Uint(u64),
    /// Float
    Float(f64),
    /// String
    String(String),
    /// Timestamp
    Time(DateTime<Utc>),
    /// Byte sequence
    Bytes(Vec<u8>),
    /// Untyped value carrying its declared type
    Null(ValueType),
}

impl Value {
    /// A null of the given type
    pub fn null(ty: ValueType) -> Self {
        Self::Null(ty)
    }

    /// The discriminant of this value (the declared type for nulls)
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Uint(_) => ValueType::Uint,
            Self::Float(_) => ValueType::Float,
            Self::String(_) => ValueType::String,
            Self::Time(_) => ValueType::Time,
            Self::Bytes(_) => ValueType::Bytes,
            Self::Null(ty) => *ty,
        }
    }

    /// Whether this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Convert to the given type, see the module docs for the rules
    pub fn convert(&self, ty: ValueType) -> Value {
        match ty {
            ValueType::Bool => self.to_bool(),
            ValueType::Int => self.to_int(),
            ValueType::Uint => self.to_uint(),
            ValueType::Float => self.to_float(),
            ValueType::String => self.to_text(),
            ValueType::Time => self.to_time(),
            ValueType::Bytes => self.to_bytes(),
        }
    }

    /// Convert to a bool value
    pub fn to_bool(&self) -> Value {
        let converted = match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Uint(u) => Some(*u != 0),
            Self::Float(f) => Some(*f != 0.0),
            Self::String(s) => parse_bool(s),
            Self::Time(_) | Self::Bytes(_) | Self::Null(_) => None,
        };
        converted.map_or(Self::Null(ValueType::Bool), Self::Bool)
    }

    /// Convert to a signed integer value
    pub fn to_int(&self) -> Value {
        let converted = match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            Self::Uint(u) => Some(*u as i64),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Time(t) => Some(t.timestamp()),
            Self::String(s) => s.trim().parse::<i64>().ok(),
            Self::Float(_) | Self::Bytes(_) | Self::Null(_) => None,
        };
        converted.map_or(Self::Null(ValueType::Int), Self::Int)
    }

    /// Convert to an unsigned integer value
    pub fn to_uint(&self) -> Value {
        let converted = match self {
            Self::Bool(b) => Some(u64::from(*b)),
            Self::Int(i) => Some(*i as u64),
            Self::Uint(u) => Some(*u),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as u64),
            Self::Time(t) => Some(t.timestamp() as u64),
            Self::String(s) => s.trim().parse::<u64>().ok(),
            Self::Float(_) | Self::Bytes(_) | Self::Null(_) => None,
        };
        converted.map_or(Self::Null(ValueType::Uint), Self::Uint)
    }

    /// Convert to a float value
    pub fn to_float(&self) -> Value {
        let converted = match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Uint(u) => Some(*u as f64),
            Self::Float(f) => Some(*f),
            Self::Time(t) => Some(t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / 1e9),
            Self::String(s) => s.trim().parse::<f64>().ok(),
            Self::Bytes(_) | Self::Null(_) => None,
        };
        converted.map_or(Self::Null(ValueType::Float), Self::Float)
    }

    /// Convert to a string value
    pub fn to_text(&self) -> Value {
        match self {
            Self::Bool(b) => Self::String(b.to_string()),
            Self::Int(i) => Self::String(i.to_string()),
            Self::Uint(u) => Self::String(u.to_string()),
            Self::Float(f) => Self::String(f.to_string()),
            Self::String(s) => Self::String(s.clone()),
            Self::Time(t) => Self::String(format_time(t)),
            Self::Bytes(b) => Self::String(String::from_utf8_lossy(b).into_owned()),
            Self::Null(_) => Self::Null(ValueType::String),
        }
    }

    /// Convert to a timestamp value
    pub fn to_time(&self) -> Value {
        let converted = match self {
            Self::Int(i) => Utc.timestamp_opt(*i, 0).single(),
            Self::Uint(u) => i64::try_from(*u)
                .ok()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            Self::Float(f) => time_from_float(*f),
            Self::Time(t) => Some(*t),
            Self::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            Self::Bool(_) | Self::Bytes(_) | Self::Null(_) => None,
        };
        converted.map_or(Self::Null(ValueType::Time), Self::Time)
    }

    /// Convert to a byte-sequence value
    pub fn to_bytes(&self) -> Value {
        match self {
            Self::String(s) => Self::Bytes(s.as_bytes().to_vec()),
            Self::Bytes(b) => Self::Bytes(b.clone()),
            _ => Self::Null(ValueType::Bytes),
        }
    }

    /// The raw bool, if this is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The raw signed integer, if this is an int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The raw unsigned integer, if this is a uint
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::Uint(u) => Some(*u),
            _ => None,
        }
    }

    /// The raw float, if this is a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The raw string, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The raw timestamp, if this is a time
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// The raw bytes, if this is a byte sequence
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Order two values of compatible discriminants.
    ///
    /// Int, uint and float compare with each other; every other
    /// discriminant only with itself. Nulls and incompatible pairs have no
    /// ordering.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Null(_), _) | (_, Self::Null(_)) => None,
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Time(a), Self::Time(b)) => Some(a.cmp(b)),
            (Self::Bytes(a), Self::Bytes(b)) => Some(a.cmp(b)),
            (a, b) => compare_numeric(a, b),
        }
    }

    /// Equality against another value; incompatible types are never equal
    pub fn equals(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Strictly greater than `other` (`true > false` for bools)
    pub fn greater_than(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Greater)
    }

    /// Strictly less than `other`
    pub fn less_than(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Less)
    }

    /// Whether any member of `set` equals this value
    pub fn is_in(&self, set: &[Value]) -> bool {
        set.iter().any(|candidate| self.equals(candidate))
    }
}

fn compare_numeric(a: &Value, b: &Value) -> Option<Ordering> {
    use Value::{Float, Int, Uint};
    match (a, b) {
        (Int(x), Int(y)) => Some(x.cmp(y)),
        (Uint(x), Uint(y)) => Some(x.cmp(y)),
        (Float(x), Float(y)) => x.partial_cmp(y),
        (Int(x), Uint(y)) => Some(if *x < 0 {
            Ordering::Less
        } else {
            (*x as u64).cmp(y)
        }),
        (Uint(_), Int(_)) => compare_numeric(b, a).map(Ordering::reverse),
        (Int(x), Float(y)) => int_cmp_float(*x, *y),
        (Uint(x), Float(y)) => uint_cmp_float(*x, *y),
        (Float(_), Int(_) | Uint(_)) => compare_numeric(b, a).map(Ordering::reverse),
        _ => None,
    }
}

// 2^63 and 2^64 are exact in f64
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

/// Exact ordering of an integer against a float, without rounding the
/// integer to f64
fn int_cmp_float(x: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f >= I64_BOUND {
        return Some(Ordering::Less);
    }
    if f < -I64_BOUND {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    match x.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)),
        other => Some(other),
    }
}

fn uint_cmp_float(x: u64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f >= U64_BOUND {
        return Some(Ordering::Less);
    }
    if f < 0.0 {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    match x.cmp(&(whole as u64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)),
        other => Some(other),
    }
}

/// Locale-free bool parsing, accepting the usual spellings
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn time_from_float(f: f64) -> Option<DateTime<Utc>> {
    if !f.is_finite() {
        return None;
    }
    let secs = f.floor();
    let nanos = ((f - secs) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(secs as i64, nanos).single()
}

fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null(_) => f.write_str("null"),
            Self::String(s) => f.write_str(s),
            Self::Time(t) => f.write_str(&format_time(t)),
            other => match other.to_text() {
                Self::String(s) => f.write_str(&s),
                _ => f.write_str("null"),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Time(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}
