//! A small pull-style XML tokenizer.
//!
//! # What is a pull parser? (for beginners)
//!
//! A *DOM* parser reads the whole document into a tree before you can look
//! at it.  A *pull* parser instead hands you one event at a time (a start
//! tag, some text, an end tag) each time you call [`PullParser::next`], and
//! the caller decides what to do next.  This keeps memory flat and lets the
//! value reader in [`super::xml`] be written as a simple state machine.
//!
//! # Supported subset
//!
//! The tokenizer understands exactly what configuration files need:
//!
//! - start, end and self-closing (`<tag />`) elements with quoted attributes;
//! - character data, including `<![CDATA[...]]>` sections;
//! - the five predefined entities and numeric character references;
//! - comments and processing instructions (including the `<?xml ...?>`
//!   declaration), which are skipped.
//!
//! Document type declarations are rejected outright, so no entity expansion
//! can ever be triggered by file content.  Namespaces are not interpreted:
//! a prefixed name such as `a:map` is just a tag called `a:map`.

use std::borrow::Cow;

use crate::codec::CodecError;

/// One start tag with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct StartTag {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

impl StartTag {
    /// Looks up an attribute value by name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A single parse event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<'a> {
    /// `<name attr="...">`, also emitted for the opening half of `<name/>`.
    Start(StartTag),
    /// `</name>`, also emitted right after the start of `<name/>`.
    End(String),
    /// Character data with entities already decoded.
    Text(Cow<'a, str>),
    /// No more input.
    Eof,
}

/// Tokenizer over a borrowed UTF-8 document.
pub struct PullParser<'a> {
    src: &'a str,
    pos: usize,
    /// End event owed for a self-closing tag.
    pending_end: Option<String>,
}

impl<'a> PullParser<'a> {
    /// Creates a parser positioned at the start of `src`.
    ///
    /// A leading byte-order mark is skipped.
    pub fn new(src: &'a str) -> Self {
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Self {
            src,
            pos: 0,
            pending_end: None,
        }
    }

    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the next event.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Parse`] for malformed markup and
    /// [`CodecError::UnexpectedEndOfDocument`] when a construct is cut off.
    pub fn next(&mut self) -> Result<Event<'a>, CodecError> {
        if let Some(name) = self.pending_end.take() {
            return Ok(Event::End(name));
        }

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Ok(Event::Eof);
            }

            if !rest.starts_with('<') {
                let len = rest.find('<').unwrap_or(rest.len());
                let start = self.pos;
                self.pos += len;
                let text = unescape(&self.src[start..start + len], start)?;
                return Ok(Event::Text(text));
            }

            if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if rest.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                let start = self.pos;
                let end = self.find("]]>", "CDATA section")?;
                self.pos = end + "]]>".len();
                return Ok(Event::Text(Cow::Borrowed(&self.src[start..end])));
            } else if rest.starts_with("<!") {
                return Err(self.error("document type declarations are not supported"));
            } else if rest.starts_with("</") {
                self.pos += 2;
                let name = self.read_name()?;
                self.skip_whitespace();
                self.expect('>', "end tag")?;
                return Ok(Event::End(name));
            } else {
                self.pos += 1;
                return self.read_start_tag();
            }
        }
    }

    // ── Markup helpers ────────────────────────────────────────────────────────

    fn read_start_tag(&mut self) -> Result<Event<'a>, CodecError> {
        let name = self.read_name()?;
        let mut attributes: Vec<(String, String)> = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(CodecError::UnexpectedEndOfDocument {
                    context: format!("<{name}> start tag"),
                });
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                self.pending_end = Some(name.clone());
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if !had_space {
                return Err(self.error(&format!("expected whitespace in <{name}> start tag")));
            }

            let key = self.read_name()?;
            self.skip_whitespace();
            self.expect('=', "attribute")?;
            self.skip_whitespace();
            let value = self.read_quoted()?;
            if attributes.iter().any(|(existing, _)| *existing == key) {
                return Err(self.error(&format!("duplicate attribute {key:?} in <{name}>")));
            }
            attributes.push((key, value));
        }

        Ok(Event::Start(StartTag { name, attributes }))
    }

    fn read_name(&mut self) -> Result<String, CodecError> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '/' | '>' | '=' | '<' | '"' | '\''))
            .unwrap_or(rest.len());
        if len == 0 {
            if rest.is_empty() {
                return Err(CodecError::UnexpectedEndOfDocument {
                    context: "tag name".to_string(),
                });
            }
            return Err(self.error("expected a tag or attribute name"));
        }
        let name = rest[..len].to_string();
        self.pos += len;
        Ok(name)
    }

    fn read_quoted(&mut self) -> Result<String, CodecError> {
        let quote = match self.rest().chars().next() {
            Some(q @ ('"' | '\'')) => q,
            Some(_) => return Err(self.error("attribute value must be quoted")),
            None => {
                return Err(CodecError::UnexpectedEndOfDocument {
                    context: "attribute value".to_string(),
                })
            }
        };
        self.pos += 1;
        let start = self.pos;
        let len = self
            .rest()
            .find(quote)
            .ok_or_else(|| CodecError::UnexpectedEndOfDocument {
                context: "attribute value".to_string(),
            })?;
        let raw = &self.src[start..start + len];
        if raw.contains('<') {
            return Err(self.error("'<' is not allowed in attribute values"));
        }
        self.pos += len + 1;
        Ok(unescape(raw, start)?.into_owned())
    }

    fn skip_whitespace(&mut self) -> bool {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        let skipped = rest.len() - trimmed.len();
        self.pos += skipped;
        skipped > 0
    }

    fn skip_past(&mut self, terminator: &str, what: &str) -> Result<(), CodecError> {
        let end = self.find(terminator, what)?;
        self.pos = end + terminator.len();
        Ok(())
    }

    /// Absolute offset of `needle` at or after the cursor.
    fn find(&self, needle: &str, what: &str) -> Result<usize, CodecError> {
        self.rest()
            .find(needle)
            .map(|i| self.pos + i)
            .ok_or_else(|| CodecError::UnexpectedEndOfDocument {
                context: what.to_string(),
            })
    }

    fn expect(&mut self, c: char, what: &str) -> Result<(), CodecError> {
        match self.rest().chars().next() {
            Some(found) if found == c => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(found) => Err(self.error(&format!("expected {c:?} in {what}, found {found:?}"))),
            None => Err(CodecError::UnexpectedEndOfDocument {
                context: what.to_string(),
            }),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, message: &str) -> CodecError {
        CodecError::Parse(format!("{message} at byte {}", self.pos))
    }
}

// ── Entity handling ───────────────────────────────────────────────────────────

/// Decodes entity and character references in `raw`.
///
/// `offset` is the absolute position of `raw`, used in error messages.
pub fn unescape(raw: &str, offset: usize) -> Result<Cow<'_, str>, CodecError> {
    if !raw.contains('&') {
        return Ok(Cow::Borrowed(raw));
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after.find(';').ok_or_else(|| {
            CodecError::Parse(format!(
                "unterminated entity reference at byte {}",
                offset + (raw.len() - rest.len()) + amp
            ))
        })?;
        let entity = &after[..semi];
        let decoded = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => decode_char_ref(entity).ok_or_else(|| {
                CodecError::Parse(format!("unknown entity reference &{entity};"))
            })?,
        };
        out.push(decoded);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}

fn decode_char_ref(entity: &str) -> Option<char> {
    let code = if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(code)
}

/// Escapes character data for use between tags.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    escape(text, false)
}

/// Escapes an attribute value for use inside double quotes.
///
/// Tabs and line breaks are written as character references so they survive
/// attribute-value normalisation in other XML readers.
pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    escape(value, true)
}

fn escape(s: &str, attribute: bool) -> Cow<'_, str> {
    let needs = |c: char| match c {
        '&' | '<' | '>' => true,
        '"' | '\n' | '\r' | '\t' => attribute,
        _ => false,
    };
    if !s.chars().any(needs) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' if attribute => out.push_str("&#10;"),
            '\r' if attribute => out.push_str("&#13;"),
            '\t' if attribute => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(src: &str) -> Vec<Event<'_>> {
        let mut parser = PullParser::new(src);
        let mut events = Vec::new();
        loop {
            let event = parser.next().expect("tokenize");
            if event == Event::Eof {
                break;
            }
            events.push(event);
        }
        events
    }

    fn start(name: &str, attributes: &[(&str, &str)]) -> Event<'static> {
        Event::Start(StartTag {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    #[test]
    fn test_self_closing_tag_yields_start_then_end() {
        let events = collect(r#"<int name="a" value="1" />"#);
        assert_eq!(
            events,
            vec![start("int", &[("name", "a"), ("value", "1")]), Event::End("int".into())]
        );
    }

    #[test]
    fn test_declaration_and_comments_are_skipped() {
        let events = collect("<?xml version='1.0' ?><!-- hi --><map></map>");
        assert_eq!(events, vec![start("map", &[]), Event::End("map".into())]);
    }

    #[test]
    fn test_entities_are_decoded_in_text_and_attributes() {
        let events = collect(r#"<s a="&quot;&#65;&#x42;">x &amp; y &lt;z&gt;</s>"#);
        assert_eq!(
            events,
            vec![
                start("s", &[("a", "\"AB")]),
                Event::Text(Cow::Owned("x & y <z>".to_string())),
                Event::End("s".into()),
            ]
        );
    }

    #[test]
    fn test_cdata_is_returned_verbatim() {
        let events = collect("<s><![CDATA[a < b & c]]></s>");
        assert_eq!(events[1], Event::Text(Cow::Borrowed("a < b & c")));
    }

    #[test]
    fn test_single_quoted_attributes() {
        let events = collect("<x name='k'/>");
        assert_eq!(events[0], start("x", &[("name", "k")]));
    }

    #[test]
    fn test_doctype_is_rejected() {
        let mut parser = PullParser::new("<!DOCTYPE map [<!ENTITY x 'y'>]><map/>");
        assert!(matches!(parser.next(), Err(CodecError::Parse(_))));
    }

    #[test]
    fn test_unknown_entity_is_parse_error() {
        let mut parser = PullParser::new("<s>&bogus;</s>");
        parser.next().expect("start");
        assert!(matches!(parser.next(), Err(CodecError::Parse(_))));
    }

    #[test]
    fn test_truncated_tag_is_end_of_document() {
        let mut parser = PullParser::new("<map name=\"a");
        assert!(matches!(
            parser.next(),
            Err(CodecError::UnexpectedEndOfDocument { .. })
        ));
    }

    #[test]
    fn test_duplicate_attribute_is_rejected() {
        let mut parser = PullParser::new(r#"<int value="1" value="2"/>"#);
        assert!(matches!(parser.next(), Err(CodecError::Parse(_))));
    }

    #[test]
    fn test_escape_round_trips_through_unescape() {
        let original = "a&b<c>\"d\"\n\te";
        let escaped = escape_attribute(original);
        assert!(!escaped.contains('"'));
        assert_eq!(unescape(&escaped, 0).expect("unescape"), original);
    }

    #[test]
    fn test_escape_text_leaves_quotes_alone() {
        assert_eq!(escape_text("say \"hi\""), "say \"hi\"");
        assert_eq!(escape_text("1 < 2"), "1 &lt; 2");
    }
}
