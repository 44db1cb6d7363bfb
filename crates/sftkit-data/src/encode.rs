//! Sample encoders: one record's fields in, token IDs out.

use crate::chat_templates::Message;
use crate::tokenizer::SampleTokenizer;
use sftkit_core::{Result, SftError};

/// Encode free text, terminated with the tokenizer's EOS token when it has one.
pub fn encode_text(tokenizer: &dyn SampleTokenizer, text: &str) -> Result<Vec<u32>> {
    let mut ids = tokenizer.encode(text)?;
    if let Some(eos) = tokenizer.eos_token_id() {
        if ids.last() != Some(&eos) {
            ids.push(eos);
        }
    }
    Ok(ids)
}

/// Encode a prompt followed directly by its completion.
pub fn encode_completion(
    tokenizer: &dyn SampleTokenizer,
    prompt: &str,
    completion: &str,
) -> Result<Vec<u32>> {
    let mut text = String::with_capacity(prompt.len() + completion.len());
    text.push_str(prompt);
    text.push_str(completion);
    tokenizer.encode(&text)
}

/// Token index at which the completion starts in [`encode_completion`]'s output.
///
/// Everything before this index belongs to the prompt and is what a collator
/// masks out of the loss.
pub fn completion_offset(
    tokenizer: &dyn SampleTokenizer,
    prompt: &str,
    completion: &str,
) -> Result<usize> {
    let prompt_len = tokenizer.encode(prompt)?.len();
    let total_len = encode_completion(tokenizer, prompt, completion)?.len();
    Ok(prompt_len.min(total_len))
}

/// Render a conversation with the tokenizer's chat template, then encode it.
pub fn encode_chat(tokenizer: &dyn SampleTokenizer, messages: &[Message]) -> Result<Vec<u32>> {
    if !tokenizer.has_chat_template() {
        return Err(SftError::Template(
            "chat samples need a tokenizer with a chat template".to_string(),
        ));
    }
    let text = tokenizer.apply_chat_template(messages)?;
    tokenizer.encode(&text)
}
