//! Record shape detection and validation.
//!
//! A source's shape is decided once from its first record and then enforced on
//! every other record of that source. A record that disagrees is an error, not
//! something to coerce or drop.

use crate::chat_templates::Message;
use serde_json::Value;
use sftkit_core::{HubDatasetConfig, RawRecord, Result, SampleFormat, SftError};

/// Field names used to read each record shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    /// Free-text field.
    pub text: String,
    /// Prompt field.
    pub prompt: String,
    /// Completion field.
    pub completion: String,
    /// Chat turns field.
    pub messages: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            text: "text".to_string(),
            prompt: "prompt".to_string(),
            completion: "completion".to_string(),
            messages: "messages".to_string(),
        }
    }
}

impl FieldNames {
    /// Field names for a hub source, with its overrides applied.
    pub fn for_hub(config: &HubDatasetConfig) -> Self {
        let defaults = Self::default();
        Self {
            text: config.text_feature.clone().unwrap_or(defaults.text),
            prompt: config.prompt_feature.clone().unwrap_or(defaults.prompt),
            completion: config
                .completion_feature
                .clone()
                .unwrap_or(defaults.completion),
            messages: config.chat_feature.clone().unwrap_or(defaults.messages),
        }
    }

    /// Decide the shape of `record`.
    ///
    /// Chat turns win over prompt/completion, which win over free text.
    pub fn detect(&self, record: &RawRecord, location: &str) -> Result<SampleFormat> {
        let format = if record.contains_key(&self.messages) {
            SampleFormat::Chat
        } else if record.contains_key(&self.prompt) && record.contains_key(&self.completion) {
            SampleFormat::Completions
        } else if record.contains_key(&self.text) {
            SampleFormat::Text
        } else {
            let mut keys: Vec<String> = record.keys().cloned().collect();
            keys.sort();
            return Err(SftError::UnrecognizedSchema {
                location: location.to_string(),
                keys,
            });
        };
        tracing::debug!("Detected {} records in {}", format, location);
        Ok(format)
    }

    /// Check that `record` carries the fields `format` needs, with the right types.
    pub fn validate(&self, record: &RawRecord, format: SampleFormat, location: &str) -> Result<()> {
        let mismatch = |reason: String| SftError::SchemaMismatch {
            location: location.to_string(),
            expected: format,
            reason,
        };
        match format {
            SampleFormat::Text => {
                self.text_of(record).map_err(mismatch)?;
            }
            SampleFormat::Completions => {
                self.prompt_of(record).map_err(mismatch)?;
                self.completion_of(record).map_err(mismatch)?;
            }
            SampleFormat::Chat => {
                self.messages_of(record).map_err(mismatch)?;
            }
        }
        Ok(())
    }

    /// The free-text field of `record`.
    pub fn text_of<'a>(&self, record: &'a RawRecord) -> std::result::Result<&'a str, String> {
        string_field(record, &self.text)
    }

    /// The prompt field of `record`.
    pub fn prompt_of<'a>(&self, record: &'a RawRecord) -> std::result::Result<&'a str, String> {
        string_field(record, &self.prompt)
    }

    /// The completion field of `record`.
    pub fn completion_of<'a>(
        &self,
        record: &'a RawRecord,
    ) -> std::result::Result<&'a str, String> {
        string_field(record, &self.completion)
    }

    /// The chat turns of `record`.
    pub fn messages_of(&self, record: &RawRecord) -> std::result::Result<Vec<Message>, String> {
        let turns = match record.get(&self.messages) {
            Some(Value::Array(turns)) => turns,
            Some(other) => {
                return Err(format!(
                    "field '{}' must be a list of turns, got {}",
                    self.messages,
                    type_name(other)
                ))
            }
            None => return Err(format!("missing field '{}'", self.messages)),
        };

        turns
            .iter()
            .enumerate()
            .map(|(i, turn)| {
                let role = turn.get("role").and_then(Value::as_str);
                let content = turn.get("content").and_then(Value::as_str);
                match (role, content) {
                    (Some(role), Some(content)) => Ok(Message::new(role, content)),
                    _ => Err(format!(
                        "turn {} of '{}' needs string 'role' and 'content'",
                        i, self.messages
                    )),
                }
            })
            .collect()
    }
}

fn string_field<'a>(record: &'a RawRecord, key: &str) -> std::result::Result<&'a str, String> {
    match record.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(format!(
            "field '{}' must be a string, got {}",
            key,
            type_name(other)
        )),
        None => Err(format!("missing field '{}'", key)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
