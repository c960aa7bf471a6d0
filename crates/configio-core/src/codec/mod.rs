//! Wire-format codecs: pure conversions between [`Entries`] and file bytes.
//!
//! Two implementations exist:
//!
//! - [`JsonCodec`]: a single JSON object at the document root.
//! - [`XmlCodec`]: a type-tagged `<map>` document, read by a hand-written
//!   pull parser (see [`pull`]).
//!
//! A store picks one codec at construction time from the file suffix
//! ([`Format::from_path`]) and never changes it afterwards.  Codecs hold no
//! state besides their limits, so one instance can be shared between the
//! calling thread and the background apply worker.

use std::path::Path;

use thiserror::Error;

use crate::options::StoreOptions;
use crate::value::Entries;

pub mod json;
pub mod pull;
pub mod xml;

pub use json::JsonCodec;
pub use xml::XmlCodec;

/// Errors produced while encoding or decoding a document.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Malformed document text, or an attribute that cannot be parsed as the
    /// type its tag declares.
    #[error("parse error: {0}")]
    Parse(String),

    /// The encoder was asked to write a value the format cannot carry.
    #[error("cannot encode {kind} value under key {key:?}")]
    UnsupportedValueType { key: String, kind: &'static str },

    /// A `<string-array>` whose children disagree with its `num` attribute.
    #[error("malformed string-array: {0}")]
    MalformedArray(String),

    /// A start or end tag that is not allowed at this position.
    #[error("unexpected tag: expected {expected}, found {found}")]
    UnexpectedTag { expected: String, found: String },

    /// The input ended before the element being read was closed.
    #[error("unexpected end of document while reading {context}")]
    UnexpectedEndOfDocument { context: String },

    /// Maps nested deeper than the configured limit.
    #[error("nesting depth exceeds the limit of {limit}")]
    DepthLimitExceeded { limit: usize },
}

/// A wire format able to persist a whole [`Entries`] map.
///
/// Implementations must be pure: `decode(encode(m))` reproduces `m` within
/// the format's numeric tolerance, and neither call touches the file system.
#[cfg_attr(test, mockall::automock)]
pub trait Codec: Send + Sync {
    /// Short format name used in log output (`"json"`, `"xml"`).
    fn name(&self) -> &'static str;

    /// Serialises `entries` to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedValueType`] for variants the format
    /// cannot represent and [`CodecError::DepthLimitExceeded`] for maps
    /// nested deeper than the configured limit.
    fn encode(&self, entries: &Entries) -> Result<Vec<u8>, CodecError>;

    /// Parses bytes produced by [`Codec::encode`] (or written by hand).
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] describing the first structural or value
    /// error encountered.
    fn decode(&self, bytes: &[u8]) -> Result<Entries, CodecError>;

    /// Bytes that represent an empty map in this format.
    ///
    /// # Errors
    ///
    /// Whatever [`Codec::encode`] returns for an empty map.
    fn empty_document(&self) -> Result<Vec<u8>, CodecError> {
        self.encode(&Entries::new())
    }
}

/// The file formats a store can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Xml,
}

impl Format {
    /// Selects a format from the file name suffix: `.json` or `.xml`.
    ///
    /// The whole file name is matched, so a bare `.json` qualifies.
    /// Matching is case-sensitive, so `settings.JSON` is not recognised.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".json") {
            Some(Format::Json)
        } else if name.ends_with(".xml") {
            Some(Format::Xml)
        } else {
            None
        }
    }

    /// Builds the codec for this format with the limits from `options`.
    pub fn codec(self, options: &StoreOptions) -> Box<dyn Codec> {
        match self {
            Format::Json => Box::new(JsonCodec::with_options(options)),
            Format::Xml => Box::new(XmlCodec::with_options(options)),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_path_recognises_json_and_xml() {
        assert_eq!(
            Format::from_path(&PathBuf::from("/data/app/settings.json")),
            Some(Format::Json)
        );
        assert_eq!(
            Format::from_path(&PathBuf::from("/data/app/settings.xml")),
            Some(Format::Xml)
        );
    }

    #[test]
    fn test_format_from_path_accepts_bare_suffix_file_names() {
        assert_eq!(Format::from_path(&PathBuf::from("/data/.json")), Some(Format::Json));
        assert_eq!(Format::from_path(&PathBuf::from(".xml")), Some(Format::Xml));
    }

    #[test]
    fn test_format_from_path_rejects_other_suffixes() {
        assert_eq!(Format::from_path(&PathBuf::from("/data/settings.toml")), None);
        assert_eq!(Format::from_path(&PathBuf::from("/data/settings")), None);
        assert_eq!(Format::from_path(&PathBuf::from("/data/settings.JSON")), None);
        assert_eq!(Format::from_path(&PathBuf::from("")), None);
    }

    #[test]
    fn test_codec_names_follow_format() {
        let options = StoreOptions::default();
        assert_eq!(Format::Json.codec(&options).name(), "json");
        assert_eq!(Format::Xml.codec(&options).name(), "xml");
    }

    #[test]
    fn test_empty_document_decodes_to_empty_map() {
        let options = StoreOptions::default();
        for format in [Format::Json, Format::Xml] {
            let codec = format.codec(&options);
            let bytes = codec.empty_document().expect("empty document");
            assert!(!bytes.is_empty());
            assert!(codec.decode(&bytes).expect("decode").is_empty());
        }
    }
}
