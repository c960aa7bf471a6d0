//! Type-tagged XML document codec.
//!
//! File layout:
//!
//! ```xml
//! <?xml version='1.0' encoding='utf-8' standalone='yes' ?>
//! <map>
//!     <string name="test_str">12345678</string>
//!     <boolean name="test_bool" value="true" />
//!     <int name="test_int" value="10" />
//!     <long name="test_long" value="100000000" />
//!     <float name="test_float" value="0.5" />
//!     <double name="ratio" value="0.25" />
//!     <null name="unset" />
//!     <string-array name="recent" num="2">
//!         <item value="a.txt" />
//!         <item value="b.txt" />
//!     </string-array>
//!     <map name="window">
//!         <int name="width" value="800" />
//!     </map>
//! </map>
//! ```
//!
//! Every entry is one element whose tag names the value's type, so unlike
//! JSON the numeric width survives a round trip exactly.  [`Value::List`]
//! has no tag and is rejected by the encoder.
//!
//! # Reading
//!
//! The decoder walks the event stream from [`PullParser`] with an explicit
//! stack of open `<map>` frames instead of recursing, so a hostile file with
//! thousands of nested maps cannot overflow the call stack.  The stack is
//! additionally capped at `max_depth` to bound memory.

use std::fmt::Write as _;

use crate::codec::pull::{escape_attribute, escape_text, Event, PullParser, StartTag};
use crate::codec::{Codec, CodecError};
use crate::options::StoreOptions;
use crate::value::{Entries, Value};

const XML_DECLARATION: &str = "<?xml version='1.0' encoding='utf-8' standalone='yes' ?>\n";
const INDENT: &str = "    ";

/// Reads and writes the tagged `<map>` format.
#[derive(Debug, Clone)]
pub struct XmlCodec {
    max_depth: usize,
}

impl XmlCodec {
    /// Creates a codec with the default nesting limit.
    pub fn new() -> Self {
        Self::with_options(&StoreOptions::default())
    }

    /// Creates a codec using `max_depth` from `options`.
    pub fn with_options(options: &StoreOptions) -> Self {
        Self {
            max_depth: options.max_depth,
        }
    }
}

impl Default for XmlCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for XmlCodec {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn encode(&self, entries: &Entries) -> Result<Vec<u8>, CodecError> {
        let mut out = String::from(XML_DECLARATION);
        write_map(&mut out, None, entries, 1, self.max_depth)?;
        Ok(out.into_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Entries, CodecError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CodecError::Parse(format!("document is not valid UTF-8: {e}")))?;
        read_document(&mut PullParser::new(text), self.max_depth)
    }
}

// ── Serializer ────────────────────────────────────────────────────────────────

fn write_map(
    out: &mut String,
    name: Option<&str>,
    entries: &Entries,
    depth: usize,
    max_depth: usize,
) -> Result<(), CodecError> {
    if depth > max_depth {
        return Err(CodecError::DepthLimitExceeded { limit: max_depth });
    }
    let indent = INDENT.repeat(depth - 1);
    out.push_str(&indent);
    out.push_str("<map");
    write_name(out, name);
    if entries.is_empty() {
        out.push_str(" />\n");
        return Ok(());
    }
    out.push_str(">\n");
    for (key, value) in entries {
        write_value(out, key, value, depth + 1, max_depth)?;
    }
    out.push_str(&indent);
    out.push_str("</map>\n");
    Ok(())
}

fn write_value(
    out: &mut String,
    key: &str,
    value: &Value,
    depth: usize,
    max_depth: usize,
) -> Result<(), CodecError> {
    let indent = INDENT.repeat(depth - 1);
    let scalar = match value {
        Value::Null => None,
        Value::String(text) => {
            out.push_str(&indent);
            out.push_str("<string");
            write_name(out, Some(key));
            let _ = writeln!(out, ">{}</string>", escape_text(text));
            return Ok(());
        }
        Value::Boolean(b) => Some(b.to_string()),
        Value::Int32(v) => Some(v.to_string()),
        Value::Int64(v) => Some(v.to_string()),
        Value::Float32(v) => Some(format_float(f64::from(*v), v.to_string())),
        Value::Float64(v) => Some(format_float(*v, v.to_string())),
        Value::StringArray(items) => {
            write_string_array(out, key, items, &indent);
            return Ok(());
        }
        Value::NestedMap(inner) => return write_map(out, Some(key), inner, depth, max_depth),
        Value::List(_) => {
            return Err(CodecError::UnsupportedValueType {
                key: key.to_string(),
                kind: value.kind(),
            })
        }
    };

    out.push_str(&indent);
    out.push('<');
    out.push_str(value.kind());
    write_name(out, Some(key));
    if let Some(text) = scalar {
        let _ = write!(out, " value=\"{}\"", escape_attribute(&text));
    }
    out.push_str(" />\n");
    Ok(())
}

fn write_string_array(out: &mut String, key: &str, items: &[String], indent: &str) {
    out.push_str(indent);
    out.push_str("<string-array");
    write_name(out, Some(key));
    let _ = write!(out, " num=\"{}\"", items.len());
    if items.is_empty() {
        out.push_str(" />\n");
        return;
    }
    out.push_str(">\n");
    for item in items {
        let _ = writeln!(
            out,
            "{indent}{INDENT}<item value=\"{}\" />",
            escape_attribute(item)
        );
    }
    out.push_str(indent);
    out.push_str("</string-array>\n");
}

fn write_name(out: &mut String, name: Option<&str>) {
    if let Some(name) = name {
        let _ = write!(out, " name=\"{}\"", escape_attribute(name));
    }
}

/// Non-finite values use the spellings `NaN`, `Infinity` and `-Infinity`.
fn format_float(v: f64, finite: String) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "Infinity".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        finite
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// An open `<map>` element on the reader's stack.
struct Frame {
    name: Option<String>,
    entries: Entries,
}

fn read_document(parser: &mut PullParser<'_>, max_depth: usize) -> Result<Entries, CodecError> {
    let root = loop {
        match parser.next()? {
            Event::Start(tag) => break tag,
            Event::Text(text) if text.trim().is_empty() => continue,
            Event::Text(_) => {
                return Err(CodecError::Parse(
                    "unexpected text before the root element".to_string(),
                ))
            }
            Event::End(name) => {
                return Err(CodecError::UnexpectedTag {
                    expected: "<map>".to_string(),
                    found: format!("</{name}>"),
                })
            }
            Event::Eof => {
                return Err(CodecError::UnexpectedEndOfDocument {
                    context: "document (no root element)".to_string(),
                })
            }
        }
    };
    if root.name != "map" {
        return Err(CodecError::UnexpectedTag {
            expected: "<map>".to_string(),
            found: format!("<{}>", root.name),
        });
    }
    if max_depth == 0 {
        return Err(CodecError::DepthLimitExceeded { limit: max_depth });
    }

    let mut stack = vec![Frame {
        name: None,
        entries: Entries::new(),
    }];

    loop {
        match parser.next()? {
            Event::Start(tag) if tag.name == "map" => {
                if stack.len() >= max_depth {
                    return Err(CodecError::DepthLimitExceeded { limit: max_depth });
                }
                let name = Some(required_name(&tag)?);
                stack.push(Frame {
                    name,
                    entries: Entries::new(),
                });
            }
            Event::Start(tag) => {
                let name = required_name(&tag)?;
                let value = read_leaf(parser, &tag)?;
                if let Some(frame) = stack.last_mut() {
                    frame.entries.insert(name, value);
                }
            }
            Event::End(name) if name == "map" => {
                let Some(frame) = stack.pop() else {
                    break Err(CodecError::Parse("unbalanced </map>".to_string()));
                };
                match stack.last_mut() {
                    Some(parent) => {
                        let key = frame.name.unwrap_or_default();
                        parent.entries.insert(key, Value::NestedMap(frame.entries));
                    }
                    None => {
                        expect_trailing_whitespace(parser)?;
                        break Ok(frame.entries);
                    }
                }
            }
            Event::End(name) => {
                return Err(CodecError::UnexpectedTag {
                    expected: "</map>".to_string(),
                    found: format!("</{name}>"),
                })
            }
            Event::Text(text) => {
                if !text.trim().is_empty() {
                    return Err(CodecError::Parse(format!(
                        "unexpected text inside <map> at byte {}",
                        parser.position()
                    )));
                }
            }
            Event::Eof => {
                return Err(CodecError::UnexpectedEndOfDocument {
                    context: "<map>".to_string(),
                })
            }
        }
    }
}

/// Entries inside a map must be named, otherwise they cannot be keyed.
fn required_name(tag: &StartTag) -> Result<String, CodecError> {
    tag.attribute("name")
        .map(str::to_string)
        .ok_or_else(|| CodecError::Parse(format!("<{}> inside <map> has no name attribute", tag.name)))
}

/// Reads the value of a non-map element whose start tag was just consumed.
fn read_leaf(parser: &mut PullParser<'_>, tag: &StartTag) -> Result<Value, CodecError> {
    let value = match tag.name.as_str() {
        "null" => Value::Null,
        "string" => return read_string(parser),
        "int" => Value::Int32(parse_attribute(tag, "value", |s| s.parse().ok())?),
        "long" => Value::Int64(parse_attribute(tag, "value", |s| s.parse().ok())?),
        "float" => Value::Float32(parse_attribute(tag, "value", parse_f32)?),
        "double" => Value::Float64(parse_attribute(tag, "value", parse_f64)?),
        "boolean" => Value::Boolean(parse_attribute(tag, "value", parse_bool)?),
        "string-array" => return read_string_array(parser, tag),
        other => {
            return Err(CodecError::UnexpectedTag {
                expected: "a value tag".to_string(),
                found: format!("<{other}>"),
            })
        }
    };
    expect_end(parser, &tag.name)?;
    Ok(value)
}

/// Concatenates text fragments up to `</string>`.
fn read_string(parser: &mut PullParser<'_>) -> Result<Value, CodecError> {
    let mut value = String::new();
    loop {
        match parser.next()? {
            Event::Text(text) => value.push_str(&text),
            Event::End(name) if name == "string" => return Ok(Value::String(value)),
            Event::End(name) => {
                return Err(CodecError::UnexpectedTag {
                    expected: "</string>".to_string(),
                    found: format!("</{name}>"),
                })
            }
            Event::Start(tag) => {
                return Err(CodecError::UnexpectedTag {
                    expected: "</string>".to_string(),
                    found: format!("<{}>", tag.name),
                })
            }
            Event::Eof => {
                return Err(CodecError::UnexpectedEndOfDocument {
                    context: "<string>".to_string(),
                })
            }
        }
    }
}

fn read_string_array(parser: &mut PullParser<'_>, tag: &StartTag) -> Result<Value, CodecError> {
    let num: usize = parse_attribute(tag, "num", |s| s.parse().ok())?;
    // Never trust `num` for the allocation size.
    let mut items = Vec::with_capacity(num.min(1024));

    loop {
        match parser.next()? {
            Event::Start(item) if item.name == "item" => {
                if items.len() == num {
                    return Err(CodecError::MalformedArray(format!(
                        "num is {num} but more <item> children follow"
                    )));
                }
                let value = item.attribute("value").ok_or_else(|| {
                    CodecError::Parse("<item> requires a value attribute".to_string())
                })?;
                items.push(value.to_string());
                expect_end(parser, "item")?;
            }
            Event::Start(other) => {
                return Err(CodecError::MalformedArray(format!(
                    "expected <item>, found <{}>",
                    other.name
                )))
            }
            Event::End(name) if name == "string-array" => {
                if items.len() != num {
                    return Err(CodecError::MalformedArray(format!(
                        "num is {num} but {} <item> children were found",
                        items.len()
                    )));
                }
                return Ok(Value::StringArray(items));
            }
            Event::End(name) => {
                return Err(CodecError::UnexpectedTag {
                    expected: "</string-array>".to_string(),
                    found: format!("</{name}>"),
                })
            }
            Event::Text(text) => {
                if !text.trim().is_empty() {
                    return Err(CodecError::MalformedArray(
                        "text is not allowed inside <string-array>".to_string(),
                    ));
                }
            }
            Event::Eof => {
                return Err(CodecError::UnexpectedEndOfDocument {
                    context: "<string-array>".to_string(),
                })
            }
        }
    }
}

/// Consumes events up to `</tag>`, allowing only whitespace in between.
fn expect_end(parser: &mut PullParser<'_>, tag: &str) -> Result<(), CodecError> {
    loop {
        match parser.next()? {
            Event::End(name) if name == tag => return Ok(()),
            Event::Text(text) if text.trim().is_empty() => {}
            Event::Text(_) => {
                return Err(CodecError::Parse(format!("unexpected text in <{tag}>")))
            }
            Event::End(name) => {
                return Err(CodecError::UnexpectedTag {
                    expected: format!("</{tag}>"),
                    found: format!("</{name}>"),
                })
            }
            Event::Start(other) => {
                return Err(CodecError::UnexpectedTag {
                    expected: format!("</{tag}>"),
                    found: format!("<{}>", other.name),
                })
            }
            Event::Eof => {
                return Err(CodecError::UnexpectedEndOfDocument {
                    context: format!("<{tag}>"),
                })
            }
        }
    }
}

fn expect_trailing_whitespace(parser: &mut PullParser<'_>) -> Result<(), CodecError> {
    loop {
        match parser.next()? {
            Event::Eof => return Ok(()),
            Event::Text(text) if text.trim().is_empty() => {}
            _ => {
                return Err(CodecError::Parse(
                    "content after the root element".to_string(),
                ))
            }
        }
    }
}

// ── Attribute parsing ─────────────────────────────────────────────────────────

fn parse_attribute<T>(
    tag: &StartTag,
    attribute: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, CodecError> {
    let raw = tag.attribute(attribute).ok_or_else(|| {
        CodecError::Parse(format!("<{}> requires a {attribute} attribute", tag.name))
    })?;
    parse(raw.trim()).ok_or_else(|| {
        CodecError::Parse(format!(
            "invalid {attribute} attribute in <{}>: {raw:?}",
            tag.name
        ))
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_f64(s: &str) -> Option<f64> {
    match s {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => s.parse().ok(),
    }
}

fn parse_f32(s: &str) -> Option<f32> {
    match s {
        "NaN" => Some(f32::NAN),
        "Infinity" => Some(f32::INFINITY),
        "-Infinity" => Some(f32::NEG_INFINITY),
        _ => s.parse().ok(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
