//! Integration tests for the JSON and XML codecs through the public API.
//!
//! XML keeps every declared type; JSON keeps the value but not the numeric
//! width, so the JSON assertions compare through the widening accessors.

use configio_core::{Codec, CodecError, Entries, Format, JsonCodec, StoreOptions, Value, XmlCodec};

fn sample() -> Entries {
    let mut inner = Entries::new();
    inner.insert("depth".to_string(), Value::Int32(2));
    inner.insert(
        "label".to_string(),
        Value::String("<inner> & \"quoted\"".to_string()),
    );

    let mut entries = Entries::new();
    entries.insert("none".to_string(), Value::Null);
    entries.insert("text".to_string(), Value::String("héllo\nworld".to_string()));
    entries.insert("flag".to_string(), Value::Boolean(false));
    entries.insert("small".to_string(), Value::Int32(-7));
    entries.insert("big".to_string(), Value::Int64(9_000_000_000));
    entries.insert("ratio".to_string(), Value::Float32(0.25));
    entries.insert("precise".to_string(), Value::Float64(1.0e-12));
    entries.insert(
        "recent".to_string(),
        Value::StringArray(vec!["a".to_string(), String::new(), "c d".to_string()]),
    );
    entries.insert("empty_list".to_string(), Value::StringArray(Vec::new()));
    entries.insert("window".to_string(), Value::NestedMap(inner));
    entries
}

#[test]
fn test_xml_roundtrip_preserves_every_variant() {
    let codec = XmlCodec::new();
    let original = sample();

    let bytes = codec.encode(&original).expect("encode must succeed");
    let decoded = codec.decode(&bytes).expect("decode must succeed");

    assert_eq!(decoded, original);
}

#[test]
fn test_json_roundtrip_preserves_values_up_to_width() {
    let codec = JsonCodec::new();
    let original = sample();

    let bytes = codec.encode(&original).expect("encode must succeed");
    let decoded = codec.decode(&bytes).expect("decode must succeed");

    assert_eq!(decoded.len(), original.len());
    assert_eq!(decoded["none"], Value::Null);
    assert_eq!(decoded["text"], original["text"]);
    assert_eq!(decoded["flag"], Value::Boolean(false));
    assert_eq!(decoded["small"].as_i64(), Some(-7));
    assert_eq!(decoded["big"], Value::Int64(9_000_000_000));
    assert_eq!(decoded["ratio"].as_f64(), Some(0.25));
    assert_eq!(decoded["precise"].as_f64(), Some(1.0e-12));
    assert_eq!(decoded["recent"], original["recent"]);
    assert_eq!(decoded["empty_list"], Value::StringArray(Vec::new()));
    assert_eq!(decoded["window"], original["window"]);
}

#[test]
fn test_xml_output_is_json_convertible() {
    // XML → entries → JSON → entries keeps all non-width information.
    let xml = XmlCodec::new();
    let json = JsonCodec::new();
    let document = "<?xml version='1.0' encoding='utf-8' standalone='yes' ?>\n\
        <map>\n\
        \x20   <string name=\"user\">ada</string>\n\
        \x20   <boolean name=\"dark\" value=\"true\" />\n\
        \x20   <int name=\"launches\" value=\"3\" />\n\
        </map>\n";

    let entries = xml.decode(document.as_bytes()).unwrap();
    let converted = json.decode(&json.encode(&entries).unwrap()).unwrap();

    assert_eq!(converted, entries);
}

#[test]
fn test_format_selection_by_suffix() {
    let options = StoreOptions::default();

    let json = Format::from_path("a/b/settings.json".as_ref()).unwrap();
    let xml = Format::from_path("settings.xml".as_ref()).unwrap();

    assert_eq!(json.codec(&options).name(), JsonCodec::new().name());
    assert_eq!(xml.codec(&options).name(), XmlCodec::new().name());
    assert!(Format::from_path("settings.yaml".as_ref()).is_none());
    assert!(Format::from_path("settings".as_ref()).is_none());
}

#[test]
fn test_both_codecs_reject_nesting_beyond_the_limit() {
    let options = StoreOptions {
        max_depth: 3,
        ..StoreOptions::default()
    };
    let mut nested = Entries::new();
    nested.insert("leaf".to_string(), Value::Int32(1));
    for level in 0..4 {
        let mut outer = Entries::new();
        outer.insert(format!("level{level}"), Value::NestedMap(nested));
        nested = outer;
    }

    for codec in [Format::Json.codec(&options), Format::Xml.codec(&options)] {
        let err = codec.encode(&nested).unwrap_err();
        assert_eq!(
            err,
            CodecError::DepthLimitExceeded { limit: 3 },
            "codec {}",
            codec.name()
        );
    }
}

#[test]
fn test_truncated_documents_fail_for_both_codecs() {
    let json = JsonCodec::new();
    let xml = XmlCodec::new();

    assert!(json.decode(br#"{"a": 1"#).is_err());
    assert!(matches!(
        xml.decode(br#"<map><int name="a" value="1" />"#),
        Err(CodecError::UnexpectedEndOfDocument { .. })
    ));
}
