//! Common type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One unparsed input row: a local JSON line or a hub row.
///
/// Records are never mutated after load.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Dataset split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    /// Training split.
    Train,
    /// Validation split.
    Valid,
    /// Test split.
    Test,
}

impl Split {
    /// All splits in load order.
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    /// Split name as used in file names and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Valid => "valid",
            Self::Test => "test",
        }
    }

    /// File name of this split inside a local dataset directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.jsonl", self.as_str())
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the records in one source, decided once from its first record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Single free-text field: `{"text": "..."}`.
    Text,
    /// Prompt and completion fields: `{"prompt": "...", "completion": "..."}`.
    Completions,
    /// Ordered chat turns: `{"messages": [{"role": "...", "content": "..."}, ...]}`.
    Chat,
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Completions => f.write_str("completions"),
            Self::Chat => f.write_str("chat"),
        }
    }
}
