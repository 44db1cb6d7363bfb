//! Error types for sftkit.

use crate::{SampleFormat, Split};
use thiserror::Error;

/// Result type alias for sftkit operations.
pub type Result<T> = std::result::Result<T, SftError>;

/// Main error type for sftkit operations.
///
/// Every variant is fatal to the `load_dataset` call that raised it.
#[derive(Error, Debug)]
pub enum SftError {
    /// A record matches none of the known sample shapes.
    #[error(
        "Unrecognized record schema in {location}: found keys {keys:?}, expected \
         'messages', 'prompt' + 'completion', or 'text'"
    )]
    UnrecognizedSchema {
        /// Where the record came from (file and line, or hub split).
        location: String,
        /// Keys present on the offending record.
        keys: Vec<String>,
    },

    /// A record disagrees with the shape detected from the first record.
    #[error("Schema mismatch in {location}: expected a {expected} record, {reason}")]
    SchemaMismatch {
        /// Where the record came from.
        location: String,
        /// Shape detected from the first record of the source.
        expected: SampleFormat,
        /// What is wrong with the record.
        reason: String,
    },

    /// A requested split has no backing file.
    #[error("Missing {split} split for {source_name}")]
    MissingSplit {
        /// The split that was requested.
        split: Split,
        /// Dataset the split was requested from.
        source_name: String,
    },

    /// The tokenizer rejected its input.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Chat rendering failed or no chat template is configured.
    #[error("Chat template error: {0}")]
    Template(String),

    /// Network or hub failure while fetching remote rows.
    #[error("Remote fetch error: {0}")]
    RemoteFetch(String),

    /// A dataset descriptor is neither a local-path nor a hub shape.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sample index outside `[0, len)`.
    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: i64,
        /// Length of the dataset.
        len: usize,
    },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SftError {
    /// Build an [`SftError::IndexOutOfRange`] from any integer index.
    pub fn index_out_of_range(index: impl TryInto<i64>, len: usize) -> Self {
        Self::IndexOutOfRange {
            index: index.try_into().unwrap_or(i64::MAX),
            len,
        }
    }
}
