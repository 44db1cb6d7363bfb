//! Tokenizer capability and its `tokenizers`-backed implementation.

use crate::chat_templates::{detect_template_from_model, ChatTemplate, Message};
use sftkit_core::{Result, SftError};
use std::path::Path;

/// What the data layer needs from a tokenizer.
///
/// Containers share one tokenizer read-only, so implementations must be safe
/// to call from several threads at once.
pub trait SampleTokenizer: Send + Sync {
    /// Encode text to token IDs, without post-processor special tokens.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// End-of-sequence token appended to text samples, if the tokenizer has one.
    fn eos_token_id(&self) -> Option<u32> {
        None
    }

    /// Whether a chat template is configured.
    fn has_chat_template(&self) -> bool;

    /// Render a conversation with the configured chat template.
    ///
    /// Fails with [`SftError::Template`] when no template is configured.
    fn apply_chat_template(&self, messages: &[Message]) -> Result<String>;
}

/// Wrapper around the tokenizers library.
pub struct Tokenizer {
    inner: tokenizers::Tokenizer,
    chat_template: Option<ChatTemplate>,
    max_length: Option<usize>,
}

impl Tokenizer {
    /// Load a tokenizer from a local `tokenizer.json` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| SftError::Encoding(format!("failed to load tokenizer: {e}")))?;
        Ok(Self::from_inner(inner))
    }

    /// Load a tokenizer from the bytes of a `tokenizer.json`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_bytes(bytes)
            .map_err(|e| SftError::Encoding(format!("failed to load tokenizer: {e}")))?;
        Ok(Self::from_inner(inner))
    }

    /// Wrap an already constructed tokenizer.
    pub fn from_inner(inner: tokenizers::Tokenizer) -> Self {
        Self {
            inner,
            chat_template: None,
            max_length: None,
        }
    }

    /// Use `template` for chat samples.
    #[must_use]
    pub fn with_chat_template(mut self, template: ChatTemplate) -> Self {
        self.chat_template = Some(template);
        self
    }

    /// Pick a chat template from the model name, if it suggests one.
    #[must_use]
    pub fn with_template_for_model(mut self, model_name: &str) -> Self {
        self.chat_template = detect_template_from_model(model_name);
        if self.chat_template.is_none() {
            tracing::debug!("No chat template recognised for model {}", model_name);
        }
        self
    }

    /// Reject inputs that encode to more than `max_length` tokens.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// The configured chat template, if any.
    pub fn chat_template(&self) -> Option<&ChatTemplate> {
        self.chat_template.as_ref()
    }

    /// Decode token IDs to text.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| SftError::Encoding(e.to_string()))
    }

    /// Get vocabulary size.
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    /// Get the underlying tokenizer.
    pub fn inner(&self) -> &tokenizers::Tokenizer {
        &self.inner
    }
}

impl SampleTokenizer for Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| SftError::Encoding(e.to_string()))?;
        let ids = encoding.get_ids();

        if let Some(max) = self.max_length {
            if ids.len() > max {
                return Err(SftError::Encoding(format!(
                    "input encodes to {} tokens, limit is {}",
                    ids.len(),
                    max
                )));
            }
        }

        Ok(ids.to_vec())
    }

    fn eos_token_id(&self) -> Option<u32> {
        self.inner
            .token_to_id("</s>")
            .or_else(|| self.inner.token_to_id("<|endoftext|>"))
            .or_else(|| self.inner.token_to_id("<|end_of_text|>"))
            .or_else(|| self.inner.token_to_id("<|im_end|>"))
            .or_else(|| self.inner.token_to_id("<eos>"))
    }

    fn has_chat_template(&self) -> bool {
        self.chat_template.is_some()
    }

    fn apply_chat_template(&self, messages: &[Message]) -> Result<String> {
        let template = self.chat_template.as_ref().ok_or_else(|| {
            SftError::Template("tokenizer has no chat template configured".to_string())
        })?;
        Ok(template.render(messages))
    }
}

impl<T: SampleTokenizer + ?Sized> SampleTokenizer for std::sync::Arc<T> {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (**self).encode(text)
    }

    fn eos_token_id(&self) -> Option<u32> {
        (**self).eos_token_id()
    }

    fn has_chat_template(&self) -> bool {
        (**self).has_chat_template()
    }

    fn apply_chat_template(&self, messages: &[Message]) -> Result<String> {
        (**self).apply_chat_template(messages)
    }
}
