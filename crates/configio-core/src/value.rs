//! The tagged value model stored under every key.
//!
//! # Why an enum instead of "any"? (for beginners)
//!
//! A configuration file mixes strings, numbers, booleans and nested groups.
//! Dynamically-typed languages keep such data in an untyped map and cast on
//! the way out, which fails at runtime when the cast is wrong.  In Rust we
//! spell out every shape a stored entry may take as a variant of [`Value`].
//! Readers then ask for a concrete Rust type through [`FromValue`], and a
//! mismatch becomes an ordinary error value instead of a crash.
//!
//! The variant names double as the XML tag names used on disk (see
//! [`Value::kind`]), so the XML codec can emit a tag without a second lookup
//! table.

use std::collections::BTreeMap;
use std::fmt;

/// The key → value mapping held by a store and produced by every codec.
///
/// A `BTreeMap` keeps keys sorted, which makes encoded files deterministic
/// (the same map always produces byte-identical output).
pub type Entries = BTreeMap<String, Value>;

/// One stored configuration entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An explicit null.  Getters treat it like an absent key.
    Null,
    /// UTF-8 text.
    String(String),
    /// `true` / `false`.
    Boolean(bool),
    /// 32-bit signed integer (`<int>` in XML).
    Int32(i32),
    /// 64-bit signed integer (`<long>` in XML).
    Int64(i64),
    /// Single-precision float (`<float>` in XML).
    Float32(f32),
    /// Double-precision float (`<double>` in XML).
    Float64(f64),
    /// Ordered sequence of strings (`<string-array>` in XML).
    StringArray(Vec<String>),
    /// A nested group of entries (`<map>` in XML).
    NestedMap(Entries),
    /// A heterogeneous sequence.  Only produced by the JSON codec for arrays
    /// that are not all strings; the XML format has no tag for it.
    List(Vec<Value>),
}

impl Value {
    /// Short lowercase name of the variant.
    ///
    /// For every variant the XML codec can represent this is exactly the tag
    /// name written on disk.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Int32(_) => "int",
            Value::Int64(_) => "long",
            Value::Float32(_) => "float",
            Value::Float64(_) => "double",
            Value::StringArray(_) => "string-array",
            Value::NestedMap(_) => "map",
            Value::List(_) => "list",
        }
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the value as an `i64` if it is any integer variant.
    ///
    /// Useful when reading back from JSON, where a value written as `Int64`
    /// may decode as `Int32` if it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as an `f64` if it is any numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrows the text of a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}L"),
            Value::Float32(v) => write!(f, "{v}f"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::StringArray(items) => write!(f, "{items:?}"),
            Value::NestedMap(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                f.write_str("}")
            }
            Value::List(items) => {
                f.write_str("[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

// ── Conversions into Value ────────────────────────────────────────────────────

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringArray(v)
    }
}

impl From<Entries> for Value {
    fn from(v: Entries) -> Self {
        Value::NestedMap(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ── Conversions out of Value ──────────────────────────────────────────────────

/// A Rust type that can be read back out of a [`Value`].
///
/// Conversion is strict: an `i64` is only produced from [`Value::Int64`],
/// never from [`Value::Int32`].  Use [`Value::as_i64`] / [`Value::as_f64`]
/// when width-tolerant reads are wanted.
pub trait FromValue: Sized {
    /// Variant name this type reads from, used in error messages.
    const KIND: &'static str;

    /// Returns `Some` when `value` holds the matching variant.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_from_value {
    ($ty:ty, $kind:literal, $variant:ident) => {
        impl FromValue for $ty {
            const KIND: &'static str = $kind;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_from_value!(String, "string", String);
impl_from_value!(bool, "boolean", Boolean);
impl_from_value!(i32, "int", Int32);
impl_from_value!(i64, "long", Int64);
impl_from_value!(f32, "float", Float32);
impl_from_value!(f64, "double", Float64);
impl_from_value!(Vec<String>, "string-array", StringArray);
impl_from_value!(Entries, "map", NestedMap);

impl FromValue for Value {
    const KIND: &'static str = "any";

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
