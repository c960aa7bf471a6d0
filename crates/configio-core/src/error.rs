//! Store-level error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;

/// Errors returned by [`crate::ConfigStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The path suffix does not select a known codec.
    #[error("unsupported file format for {path}: expected a .json or .xml suffix")]
    UnsupportedFormat { path: PathBuf },

    /// The supplied [`crate::StoreOptions`] are out of range.
    #[error("invalid store options: {reason}")]
    InvalidOptions { reason: String },

    /// The store was created without a target path.
    #[error("the store has no target path")]
    EmptyPath,

    /// Reading or writing the target file failed.
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The codec rejected the file content or the in-memory map.
    #[error("{path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// A getter asked for a different type than the one stored.
    #[error("type mismatch for key {key:?}: requested {requested}, stored {stored}")]
    TypeMismatch {
        key: String,
        requested: &'static str,
        stored: &'static str,
    },
}

impl StoreError {
    /// The codec error behind this failure, if any.
    pub fn codec_error(&self) -> Option<&CodecError> {
        match self {
            StoreError::Codec { source, .. } => Some(source),
            _ => None,
        }
    }
}
