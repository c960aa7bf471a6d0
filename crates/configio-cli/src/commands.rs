//! Subcommand bodies.
//!
//! Each command opens its own [`ConfigStore`], does one thing and commits
//! synchronously, so a failed write is reported through the exit status
//! rather than lost in a background thread.  Output goes to the writer passed
//! in so the commands can be exercised from tests.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use configio_core::{CommitOutcome, ConfigStore, StoreOptions, Value};
use tracing::{debug, info};

/// Type tag accepted by `configio set --type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueType {
    String,
    Bool,
    Int,
    Long,
    Float,
    Double,
    /// Comma-separated items; an empty argument is an empty array.
    StringArray,
    Null,
}

impl ValueType {
    /// Converts the raw command-line text into a typed [`Value`].
    pub fn parse(self, raw: &str) -> Result<Value> {
        let value = match self {
            ValueType::String => Value::String(raw.to_string()),
            ValueType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                _ => bail!("'{raw}' is not a boolean (expected true or false)"),
            },
            ValueType::Int => Value::Int32(
                raw.trim()
                    .parse()
                    .with_context(|| format!("'{raw}' is not a 32-bit integer"))?,
            ),
            ValueType::Long => Value::Int64(
                raw.trim()
                    .parse()
                    .with_context(|| format!("'{raw}' is not a 64-bit integer"))?,
            ),
            ValueType::Float => Value::Float32(
                raw.trim()
                    .parse()
                    .with_context(|| format!("'{raw}' is not a float"))?,
            ),
            ValueType::Double => Value::Float64(
                raw.trim()
                    .parse()
                    .with_context(|| format!("'{raw}' is not a double"))?,
            ),
            ValueType::StringArray if raw.is_empty() => Value::StringArray(Vec::new()),
            ValueType::StringArray => {
                Value::StringArray(raw.split(',').map(str::to_string).collect())
            }
            ValueType::Null => Value::Null,
        };
        Ok(value)
    }
}

fn open(path: &Path, options: &StoreOptions) -> Result<ConfigStore> {
    ConfigStore::open_with(path, options.clone())
        .with_context(|| format!("cannot open {}", path.display()))
}

/// Opens and loads a store whose file must already exist.
fn open_existing(path: &Path, options: &StoreOptions) -> Result<ConfigStore> {
    let store = open(path, options)?;
    let found = store
        .load_from_file()
        .with_context(|| format!("failed to load {}", path.display()))?;
    if !found {
        bail!("{} does not exist", path.display());
    }
    Ok(store)
}

fn commit(store: &ConfigStore) -> Result<CommitOutcome> {
    let outcome = store
        .writer()
        .try_commit()
        .with_context(|| format!("failed to write {}", store.path().display()))?;
    debug!(path = %store.path().display(), ?outcome, "commit finished");
    Ok(outcome)
}

/// `configio get`: prints one value.  Strings are printed without quotes.
pub fn get(path: &Path, key: &str, options: &StoreOptions, out: &mut dyn Write) -> Result<()> {
    let store = open_existing(path, options)?;
    let Some(value) = store.get_value(key) else {
        bail!("key {key:?} not found in {}", path.display());
    };
    match value.as_str() {
        Some(text) => writeln!(out, "{text}")?,
        None => writeln!(out, "{value}")?,
    }
    Ok(())
}

/// `configio set`: stores one typed value and commits.
pub fn set(path: &Path, key: &str, value: Value, options: &StoreOptions) -> Result<()> {
    let store = open(path, options)?;
    let kind = value.kind();
    store.writer().put(key, value);
    commit(&store)?;
    info!(path = %path.display(), key, kind, "value stored");
    Ok(())
}

/// `configio remove`: deletes one key and commits.
pub fn remove(path: &Path, key: &str, options: &StoreOptions) -> Result<()> {
    let store = open(path, options)?;
    store.writer().remove(key);
    commit(&store)?;
    info!(path = %path.display(), key, "key removed");
    Ok(())
}

/// `configio clear`: empties the file.
///
/// The file is loaded first so every key on disk is known to the store when
/// the map is cleared.
pub fn clear(path: &Path, options: &StoreOptions) -> Result<()> {
    let store = open(path, options)?;
    store
        .load_from_file()
        .with_context(|| format!("failed to load {}", path.display()))?;
    store.writer().clear();
    match commit(&store)? {
        CommitOutcome::Written { .. } => info!(path = %path.display(), "file cleared"),
        CommitOutcome::NothingToWrite => info!(path = %path.display(), "nothing to clear"),
    }
    Ok(())
}

/// `configio dump`: prints every entry as `key (type) = value`.
pub fn dump(path: &Path, options: &StoreOptions, out: &mut dyn Write) -> Result<()> {
    let store = open_existing(path, options)?;
    for (key, value) in store.get_all() {
        writeln!(out, "{key} ({}) = {value}", value.kind())?;
    }
    Ok(())
}

/// `configio convert`: rewrites `src` in the format selected by `dst`'s
/// suffix.  Existing content of `dst` is replaced.
///
/// Returns the number of entries written.
pub fn convert(src: &Path, dst: &Path, options: &StoreOptions) -> Result<usize> {
    let source = open_existing(src, options)?;
    let target = open(dst, options)?;
    target
        .load_from_file()
        .with_context(|| format!("failed to load {}", dst.display()))?;

    let entries = source.get_all();
    let count = entries.len();
    let writer = target.writer().clear();
    for (key, value) in entries {
        writer.put(key, value);
    }
    commit(&target)?;
    info!(
        src = %src.display(),
        dst = %dst.display(),
        entries = count,
        "converted config file"
    );
    Ok(count)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("configio_cli_{}", uuid::Uuid::new_v4()));
            std::fs::create_dir_all(&dir).expect("create temp dir");
            Self(dir)
        }

        fn file(&self, name: &str) -> PathBuf {
            self.0.join(name)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.0).ok();
        }
    }

    fn output(f: impl FnOnce(&mut dyn Write) -> Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).expect("command must succeed");
        String::from_utf8(buf).expect("utf-8 output")
    }

    #[test]
    fn test_value_type_parses_each_type() {
        assert_eq!(ValueType::String.parse(" a ").unwrap(), Value::String(" a ".into()));
        assert_eq!(ValueType::Bool.parse("TRUE").unwrap(), Value::Boolean(true));
        assert_eq!(ValueType::Int.parse("-3").unwrap(), Value::Int32(-3));
        assert_eq!(
            ValueType::Long.parse("100000000000").unwrap(),
            Value::Int64(100_000_000_000)
        );
        assert_eq!(ValueType::Float.parse("0.5").unwrap(), Value::Float32(0.5));
        assert_eq!(ValueType::Double.parse("2.25").unwrap(), Value::Float64(2.25));
        assert_eq!(
            ValueType::StringArray.parse("a,b").unwrap(),
            Value::StringArray(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            ValueType::StringArray.parse("").unwrap(),
            Value::StringArray(Vec::new())
        );
        assert_eq!(ValueType::Null.parse("").unwrap(), Value::Null);
    }

    #[test]
    fn test_value_type_rejects_out_of_range_int() {
        assert!(ValueType::Int.parse("3000000000").is_err());
        assert!(ValueType::Bool.parse("yes").is_err());
    }

    #[test]
    fn test_set_then_get_prints_value() {
        // Arrange
        let dir = TempDir::new();
        let path = dir.file("settings.xml");
        let options = StoreOptions::default();

        // Act
        set(&path, "user", Value::String("ada".into()), &options).unwrap();
        set(&path, "launches", Value::Int32(3), &options).unwrap();

        // Assert
        assert_eq!(output(|out| get(&path, "user", &options, out)), "ada\n");
        assert_eq!(output(|out| get(&path, "launches", &options, out)), "3\n");
    }

    #[test]
    fn test_get_missing_key_or_file_fails() {
        let dir = TempDir::new();
        let path = dir.file("settings.json");
        let options = StoreOptions::default();
        let mut sink = Vec::new();

        assert!(get(&path, "k", &options, &mut sink).is_err());
        set(&path, "other", Value::Boolean(true), &options).unwrap();
        assert!(get(&path, "k", &options, &mut sink).is_err());
    }

    #[test]
    fn test_remove_and_clear_update_the_file() {
        // Arrange
        let dir = TempDir::new();
        let path = dir.file("settings.json");
        let options = StoreOptions::default();
        set(&path, "a", Value::Int32(1), &options).unwrap();
        set(&path, "b", Value::Int32(2), &options).unwrap();

        // Act
        remove(&path, "a", &options).unwrap();
        let after_remove = output(|out| dump(&path, &options, out));
        clear(&path, &options).unwrap();
        let after_clear = output(|out| dump(&path, &options, out));

        // Assert
        assert_eq!(after_remove, "b (int) = 2\n");
        assert_eq!(after_clear, "");
    }

    #[test]
    fn test_clear_of_missing_file_writes_nothing() {
        let dir = TempDir::new();
        let path = dir.file("settings.xml");

        clear(&path, &StoreOptions::default()).unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn test_convert_json_to_xml_replaces_target() {
        // Arrange
        let dir = TempDir::new();
        let src = dir.file("settings.json");
        let dst = dir.file("settings.xml");
        let options = StoreOptions::default();
        set(&src, "theme", Value::String("dark".into()), &options).unwrap();
        set(&src, "volume", Value::Int32(7), &options).unwrap();
        set(&dst, "stale", Value::Boolean(true), &options).unwrap();

        // Act
        let count = convert(&src, &dst, &options).unwrap();

        // Assert
        assert_eq!(count, 2);
        assert_eq!(
            output(|out| dump(&dst, &options, out)),
            "theme (string) = \"dark\"\nvolume (int) = 7\n"
        );
    }

    #[test]
    fn test_unknown_suffix_is_rejected() {
        let dir = TempDir::new();
        let err = set(
            &dir.file("settings.ini"),
            "k",
            Value::Int32(1),
            &StoreOptions::default(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("cannot open"));
    }
}
