//! JSON document codec.
//!
//! File layout: one JSON object at the root.
//!
//! ```json
//! {
//!   "test_bool": true,
//!   "test_int": 10,
//!   "window": { "width": 800, "title": "main" },
//!   "recent": ["a.txt", "b.txt"]
//! }
//! ```
//!
//! # Numeric width is not preserved
//!
//! JSON has a single number type, so the decoder picks the narrowest
//! matching variant: integers that fit in 32 bits become [`Value::Int32`],
//! larger integers [`Value::Int64`], everything else [`Value::Float64`].
//! A value written as `Int64(100)` therefore reads back as `Int32(100)`, and
//! `Float32(0.5)` reads back as `Float64(0.5)`.  Callers that need to be
//! width-agnostic use [`Value::as_i64`] / [`Value::as_f64`].

use serde_json::{Map, Number};

use crate::codec::{Codec, CodecError};
use crate::options::StoreOptions;
use crate::value::{Entries, Value};

/// Reads and writes the JSON object format.
#[derive(Debug, Clone)]
pub struct JsonCodec {
    max_depth: usize,
    pretty: bool,
}

impl JsonCodec {
    /// Creates a codec with the default limits.
    pub fn new() -> Self {
        Self::with_options(&StoreOptions::default())
    }

    /// Creates a codec using `max_depth` and `pretty_json` from `options`.
    pub fn with_options(options: &StoreOptions) -> Self {
        Self {
            max_depth: options.max_depth,
            pretty: options.pretty_json,
        }
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, entries: &Entries) -> Result<Vec<u8>, CodecError> {
        let root = encode_map(entries, 1, self.max_depth)?;
        let doc = serde_json::Value::Object(root);
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&doc)
        } else {
            serde_json::to_vec(&doc)
        };
        bytes.map_err(|e| CodecError::Parse(format!("JSON serialization failed: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Entries, CodecError> {
        let doc: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Parse(e.to_string()))?;
        match doc {
            serde_json::Value::Object(root) => decode_map(root, 1, self.max_depth),
            other => Err(CodecError::Parse(format!(
                "document root must be a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

fn encode_map(
    entries: &Entries,
    depth: usize,
    max_depth: usize,
) -> Result<Map<String, serde_json::Value>, CodecError> {
    if depth > max_depth {
        return Err(CodecError::DepthLimitExceeded { limit: max_depth });
    }
    let mut out = Map::new();
    for (key, value) in entries {
        out.insert(key.clone(), encode_value(key, value, depth, max_depth)?);
    }
    Ok(out)
}

fn encode_value(
    key: &str,
    value: &Value,
    depth: usize,
    max_depth: usize,
) -> Result<serde_json::Value, CodecError> {
    let json = match value {
        Value::Null => serde_json::Value::Null,
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Int32(v) => serde_json::Value::from(*v),
        Value::Int64(v) => serde_json::Value::from(*v),
        Value::Float32(v) => encode_float(key, value, widen_f32(*v))?,
        Value::Float64(v) => encode_float(key, value, *v)?,
        Value::StringArray(items) => serde_json::Value::Array(
            items
                .iter()
                .cloned()
                .map(serde_json::Value::String)
                .collect(),
        ),
        Value::NestedMap(inner) => {
            serde_json::Value::Object(encode_map(inner, depth + 1, max_depth)?)
        }
        Value::List(items) => {
            if depth + 1 > max_depth {
                return Err(CodecError::DepthLimitExceeded { limit: max_depth });
            }
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(encode_value(key, item, depth + 1, max_depth)?);
            }
            serde_json::Value::Array(out)
        }
    };
    Ok(json)
}

/// JSON has no NaN or infinity, so those cannot be stored.
fn encode_float(key: &str, value: &Value, v: f64) -> Result<serde_json::Value, CodecError> {
    Number::from_f64(v)
        .map(serde_json::Value::Number)
        .ok_or_else(|| CodecError::UnsupportedValueType {
            key: key.to_string(),
            kind: value.kind(),
        })
}

/// Converts through the shortest decimal form so `0.1f32` is written as
/// `0.1` rather than `0.10000000149011612`.
fn widen_f32(v: f32) -> f64 {
    v.to_string().parse().unwrap_or(f64::from(v))
}

// ── Decoding ──────────────────────────────────────────────────────────────────

fn decode_map(
    object: Map<String, serde_json::Value>,
    depth: usize,
    max_depth: usize,
) -> Result<Entries, CodecError> {
    if depth > max_depth {
        return Err(CodecError::DepthLimitExceeded { limit: max_depth });
    }
    let mut entries = Entries::new();
    for (key, json) in object {
        let value = decode_value(json, depth, max_depth)?;
        entries.insert(key, value);
    }
    Ok(entries)
}

fn decode_value(
    json: serde_json::Value,
    depth: usize,
    max_depth: usize,
) -> Result<Value, CodecError> {
    let value = match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Number(n) => decode_number(&n),
        serde_json::Value::Object(inner) => {
            Value::NestedMap(decode_map(inner, depth + 1, max_depth)?)
        }
        // A string array is a leaf, like `<string-array>` in XML; only a
        // mixed list opens a nesting level.
        serde_json::Value::Array(items) => {
            if items.iter().all(serde_json::Value::is_string) {
                Value::StringArray(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            serde_json::Value::String(s) => Some(s),
                            _ => None,
                        })
                        .collect(),
                )
            } else {
                if depth + 1 > max_depth {
                    return Err(CodecError::DepthLimitExceeded { limit: max_depth });
                }
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(decode_value(item, depth + 1, max_depth)?);
                }
                Value::List(out)
            }
        }
    };
    Ok(value)
}

fn decode_number(n: &Number) -> Value {
    if let Some(v) = n.as_i64() {
        return match i32::try_from(v) {
            Ok(small) => Value::Int32(small),
            Err(_) => Value::Int64(v),
        };
    }
    // Unsigned values above i64::MAX and all fractional values.
    Value::Float64(n.as_f64().unwrap_or(f64::NAN))
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
