//! `configio`: inspect and edit configio JSON / XML files from the shell.
//!
//! # Usage
//!
//! ```text
//! configio [OPTIONS] <COMMAND>
//!
//! Commands:
//!   get      <FILE> <KEY>                  Print one value
//!   set      <FILE> <KEY> [VALUE] --type   Store one typed value
//!   remove   <FILE> <KEY>                  Delete one key
//!   clear    <FILE>                        Delete every key
//!   dump     <FILE>                        Print every entry
//!   convert  <SRC> <DST>                   Rewrite SRC in DST's format
//!
//! Options:
//!   --options   <FILE>    TOML file with store options [env: CONFIGIO_OPTIONS]
//!   --log-level <FILTER>  Log filter, overrides RUST_LOG [env: CONFIGIO_LOG]
//! ```
//!
//! The file format is chosen from the suffix: `.json` or `.xml`.
//!
//! # Options file
//!
//! ```toml
//! max_depth = 32
//! pretty_json = false
//! ```
//!
//! Absent fields keep their defaults; an absent file means all defaults.

mod commands;

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use configio_core::StoreOptions;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::ValueType;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Inspect and edit configio JSON / XML configuration files.
#[derive(Debug, Parser)]
#[command(name = "configio", version)]
struct Cli {
    /// TOML file holding store options (max_depth, pretty_json, worker_name).
    #[arg(long, global = true, env = "CONFIGIO_OPTIONS")]
    options: Option<PathBuf>,

    /// Log filter such as `debug` or `configio_core=trace`.
    ///
    /// Falls back to `RUST_LOG`, then to `info`.
    #[arg(long, global = true, env = "CONFIGIO_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the value stored under KEY.
    Get { file: PathBuf, key: String },

    /// Store VALUE under KEY and write the file.
    Set {
        file: PathBuf,
        key: String,
        /// Omit only with `--type null`.
        value: Option<String>,
        #[arg(long = "type", short = 't', value_enum, default_value_t = ValueType::String)]
        value_type: ValueType,
    },

    /// Delete KEY and write the file.
    Remove { file: PathBuf, key: String },

    /// Delete every key and write the file.
    Clear { file: PathBuf },

    /// Print every entry as `key (type) = value`.
    Dump { file: PathBuf },

    /// Rewrite SRC in the format selected by DST's suffix.
    Convert { src: PathBuf, dst: PathBuf },
}

// ── Options file ──────────────────────────────────────────────────────────────

/// Reads [`StoreOptions`] from a TOML file; a missing file yields defaults.
fn load_options(path: Option<&Path>) -> anyhow::Result<StoreOptions> {
    let Some(path) = path else {
        return Ok(StoreOptions::default());
    };
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)
            .with_context(|| format!("invalid options file {}", path.display())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "options file not found; using defaults");
            Ok(StoreOptions::default())
        }
        Err(e) => {
            Err(e).with_context(|| format!("failed to read options file {}", path.display()))
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `get` and `dump` output stays pipeable.
    let filter = match cli.log_level.as_deref() {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log filter '{level}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = load_options(cli.options.as_deref())?;
    debug!(?options, "store options");

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Get { file, key } => commands::get(&file, &key, &options, &mut stdout)?,
        Command::Set {
            file,
            key,
            value,
            value_type,
        } => {
            let raw = match (value, value_type) {
                (Some(raw), _) => raw,
                (None, ValueType::Null) => String::new(),
                (None, _) => bail!("a VALUE is required unless --type null is given"),
            };
            let value = value_type.parse(&raw)?;
            commands::set(&file, &key, value, &options)?;
        }
        Command::Remove { file, key } => commands::remove(&file, &key, &options)?,
        Command::Clear { file } => commands::clear(&file, &options)?,
        Command::Dump { file } => commands::dump(&file, &options, &mut stdout)?,
        Command::Convert { src, dst } => {
            let count = commands::convert(&src, &dst, &options)?;
            writeln!(
                stdout,
                "converted {count} entries: {} -> {}",
                src.display(),
                dst.display()
            )?;
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_parses_type_flag() {
        // Arrange / Act
        let cli = Cli::parse_from([
            "configio", "set", "a.xml", "volume", "7", "--type", "int",
        ]);

        // Assert
        match cli.command {
            Command::Set {
                key,
                value,
                value_type,
                ..
            } => {
                assert_eq!(key, "volume");
                assert_eq!(value.as_deref(), Some("7"));
                assert_eq!(value_type, ValueType::Int);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_set_type_defaults_to_string() {
        let cli = Cli::parse_from(["configio", "set", "a.json", "k", "v"]);
        assert!(matches!(
            cli.command,
            Command::Set {
                value_type: ValueType::String,
                ..
            }
        ));
    }

    #[test]
    fn test_string_array_type_name_is_kebab_case() {
        let cli = Cli::parse_from(["configio", "set", "a.xml", "k", "x,y", "-t", "string-array"]);
        assert!(matches!(
            cli.command,
            Command::Set {
                value_type: ValueType::StringArray,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_options_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("configio_opts_{}.toml", uuid::Uuid::new_v4()));

        let options = load_options(Some(&path)).unwrap();

        assert_eq!(options, StoreOptions::default());
    }

    #[test]
    fn test_options_file_overrides_fields() {
        // Arrange
        let path = std::env::temp_dir().join(format!("configio_opts_{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "max_depth = 5\npretty_json = false\n").unwrap();

        // Act
        let options = load_options(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        // Assert
        assert_eq!(options.max_depth, 5);
        assert!(!options.pretty_json);
        assert_eq!(options.worker_name, "configio-apply");
    }

    #[test]
    fn test_malformed_options_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("configio_opts_{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "max_depth = \"deep\"\n").unwrap();

        let result = load_options(Some(&path));
        std::fs::remove_file(&path).ok();

        assert!(result.is_err());
    }
}
