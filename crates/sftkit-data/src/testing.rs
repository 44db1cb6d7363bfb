//! In-memory tokenizer and hub client for tests and offline experiments.

use crate::chat_templates::{ChatTemplate, Message};
use crate::tokenizer::SampleTokenizer;
use sftkit_core::{HubClient, RawRecord, Result, SftError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tokenizer that maps every UTF-8 byte to its value.
///
/// Deterministic and dependency-free, with optional EOS, chat template and
/// length ceiling so each tokenizer behaviour can be exercised.
#[derive(Debug, Clone, Default)]
pub struct ByteTokenizer {
    eos: Option<u32>,
    template: Option<ChatTemplate>,
    max_length: Option<usize>,
}

impl ByteTokenizer {
    /// A tokenizer with no EOS, no chat template and no length limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `eos` to text samples.
    #[must_use]
    pub fn with_eos(mut self, eos: u32) -> Self {
        self.eos = Some(eos);
        self
    }

    /// Render chats with the ChatML template.
    #[must_use]
    pub fn with_chat_template(mut self) -> Self {
        self.template = Some(ChatTemplate::chatml());
        self
    }

    /// Reject inputs longer than `max_length` bytes.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

impl SampleTokenizer for ByteTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        if let Some(max) = self.max_length {
            if text.len() > max {
                return Err(SftError::Encoding(format!(
                    "input is {} bytes, limit is {}",
                    text.len(),
                    max
                )));
            }
        }
        Ok(text.bytes().map(u32::from).collect())
    }

    fn eos_token_id(&self) -> Option<u32> {
        self.eos
    }

    fn has_chat_template(&self) -> bool {
        self.template.is_some()
    }

    fn apply_chat_template(&self, messages: &[Message]) -> Result<String> {
        self.template
            .as_ref()
            .map(|t| t.render(messages))
            .ok_or_else(|| SftError::Template("no chat template configured".to_string()))
    }
}

/// Hub client serving rows registered ahead of time.
///
/// Queries are matched literally against what was registered; anything else
/// fails like a bad query on a real hub.
#[derive(Debug, Default)]
pub struct MemoryHub {
    rows: HashMap<(String, String), Vec<RawRecord>>,
    fetches: AtomicUsize,
}

impl MemoryHub {
    /// An empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `rows` for `split_query` on `dataset_id`.
    #[must_use]
    pub fn with_rows(
        mut self,
        dataset_id: impl Into<String>,
        split_query: impl Into<String>,
        rows: Vec<RawRecord>,
    ) -> Self {
        self.rows
            .insert((dataset_id.into(), split_query.into()), rows);
        self
    }

    /// Number of fetches served or attempted so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl HubClient for MemoryHub {
    fn fetch(&self, dataset_id: &str, split_query: &str) -> Result<Vec<RawRecord>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.rows
            .get(&(dataset_id.to_string(), split_query.to_string()))
            .cloned()
            .ok_or_else(|| {
                SftError::RemoteFetch(format!(
                    "dataset '{}' has no rows for query '{}'",
                    dataset_id, split_query
                ))
            })
    }
}
