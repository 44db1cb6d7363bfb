//! Chat templates for rendering conversations into training text.
//!
//! Each template reproduces the turn delimiters of one model family so that a
//! conversation of `{role, content}` turns becomes the exact text the model saw
//! during instruction tuning.

use serde::{Deserialize, Serialize};

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role: "system", "user", "assistant", or a template-specific role.
    pub role: String,
    /// Content of the turn.
    pub content: String,
}

impl Message {
    /// Create a new message.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Known chat template types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatTemplateType {
    /// ChatML format: `<|im_start|>role\ncontent<|im_end|>`
    ChatMl,
    /// Qwen format: ChatML with a default system prompt.
    Qwen,
    /// Llama-3 format: `<|start_header_id|>role<|end_header_id|>\n\ncontent<|eot_id|>`
    Llama3,
    /// Mistral format: `[INST] message [/INST]`
    Mistral,
    /// Gemma format: `<start_of_turn>role\ncontent<end_of_turn>`
    Gemma,
    /// Phi-3 format: `<|user|>\ncontent<|end|>`
    Phi3,
}

/// Chat template configuration and application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTemplate {
    /// The template type.
    pub template_type: ChatTemplateType,
    /// System message inserted when a conversation has none.
    pub default_system_message: Option<String>,
}

impl ChatTemplate {
    /// Create a new chat template with the given type.
    pub fn new(template_type: ChatTemplateType) -> Self {
        let default_system_message = match template_type {
            ChatTemplateType::Qwen => Some("You are a helpful assistant.".to_string()),
            _ => None,
        };
        Self {
            template_type,
            default_system_message,
        }
    }

    /// Create a ChatML template.
    pub fn chatml() -> Self {
        Self::new(ChatTemplateType::ChatMl)
    }

    /// Create a Qwen template.
    pub fn qwen() -> Self {
        Self::new(ChatTemplateType::Qwen)
    }

    /// Create a Llama-3 template.
    pub fn llama3() -> Self {
        Self::new(ChatTemplateType::Llama3)
    }

    /// Create a Mistral template.
    pub fn mistral() -> Self {
        Self::new(ChatTemplateType::Mistral)
    }

    /// Create a Gemma template.
    pub fn gemma() -> Self {
        Self::new(ChatTemplateType::Gemma)
    }

    /// Create a Phi-3 template.
    pub fn phi3() -> Self {
        Self::new(ChatTemplateType::Phi3)
    }

    /// Set the default system message.
    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.default_system_message = Some(message.into());
        self
    }

    /// Render a conversation into one text blob, delimiters included.
    pub fn render(&self, messages: &[Message]) -> String {
        let messages = self.with_default_system(messages);
        match self.template_type {
            ChatTemplateType::ChatMl | ChatTemplateType::Qwen => render_chatml(&messages),
            ChatTemplateType::Llama3 => render_llama3(&messages),
            ChatTemplateType::Mistral => render_mistral(&messages),
            ChatTemplateType::Gemma => render_gemma(&messages),
            ChatTemplateType::Phi3 => render_phi3(&messages),
        }
    }

    fn with_default_system(&self, messages: &[Message]) -> Vec<Message> {
        match &self.default_system_message {
            Some(system) if !messages.iter().any(|m| m.role == "system") => {
                let mut all = Vec::with_capacity(messages.len() + 1);
                all.push(Message::system(system.clone()));
                all.extend_from_slice(messages);
                all
            }
            _ => messages.to_vec(),
        }
    }
}

fn render_chatml(messages: &[Message]) -> String {
    let mut text = String::new();
    for msg in messages {
        text.push_str(&format!("<|im_start|>{}\n{}<|im_end|>\n", msg.role, msg.content));
    }
    text
}

fn render_llama3(messages: &[Message]) -> String {
    let mut text = String::from("<|begin_of_text|>");
    for msg in messages {
        text.push_str(&format!(
            "<|start_header_id|>{}<|end_header_id|>\n\n{}<|eot_id|>",
            msg.role,
            msg.content.trim()
        ));
    }
    text
}

fn render_mistral(messages: &[Message]) -> String {
    let mut text = String::from("<s>");
    // Mistral has no system turn; it is folded into the first user turn.
    let mut system: Option<&str> = None;
    for msg in messages {
        match msg.role.as_str() {
            "system" => system = Some(msg.content.as_str()),
            "assistant" => {
                text.push(' ');
                text.push_str(&msg.content);
                text.push_str("</s>");
            }
            _ => {
                text.push_str("[INST] ");
                if let Some(sys) = system.take() {
                    text.push_str(sys);
                    text.push_str("\n\n");
                }
                text.push_str(&msg.content);
                text.push_str(" [/INST]");
            }
        }
    }
    text
}

fn render_gemma(messages: &[Message]) -> String {
    let mut text = String::from("<bos>");
    for msg in messages {
        let role = match msg.role.as_str() {
            "assistant" => "model",
            // Gemma has no system role.
            "system" => "user",
            other => other,
        };
        text.push_str(&format!("<start_of_turn>{}\n{}<end_of_turn>\n", role, msg.content));
    }
    text
}

fn render_phi3(messages: &[Message]) -> String {
    let mut text = String::new();
    for msg in messages {
        let tag = match msg.role.as_str() {
            "system" => "<|system|>",
            "assistant" => "<|assistant|>",
            _ => "<|user|>",
        };
        text.push_str(&format!("{}\n{}<|end|>\n", tag, msg.content));
    }
    text
}

/// Detect the appropriate chat template from a model name.
///
/// Returns `None` for names that give no hint; callers then either set a
/// template explicitly or treat the tokenizer as template-less.
pub fn detect_template_from_model(model_name: &str) -> Option<ChatTemplate> {
    let name = model_name.to_lowercase();

    if name.contains("llama-3") || name.contains("llama3") {
        Some(ChatTemplate::llama3())
    } else if name.contains("mistral") || name.contains("mixtral") {
        Some(ChatTemplate::mistral())
    } else if name.contains("gemma") {
        Some(ChatTemplate::gemma())
    } else if name.contains("phi-3") || name.contains("phi3") {
        Some(ChatTemplate::phi3())
    } else if name.contains("qwen") {
        Some(ChatTemplate::qwen())
    } else if name.contains("chatml") || name.contains("-chat") || name.contains("instruct") {
        Some(ChatTemplate::chatml())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Vec<Message> {
        vec![
            Message::system("You are terse."),
            Message::user("Hello."),
            Message::assistant("Hi."),
        ]
    }

    #[test]
    fn test_chatml_format() {
        let text = ChatTemplate::chatml().render(&conversation());
        assert_eq!(
            text,
            "<|im_start|>system\nYou are terse.<|im_end|>\n\
             <|im_start|>user\nHello.<|im_end|>\n\
             <|im_start|>assistant\nHi.<|im_end|>\n"
        );
    }

    #[test]
    fn test_qwen_inserts_default_system() {
        let text = ChatTemplate::qwen().render(&[Message::user("Hello.")]);
        assert!(text.starts_with("<|im_start|>system\nYou are a helpful assistant.<|im_end|>\n"));

        // An explicit system turn wins over the default.
        let text = ChatTemplate::qwen().render(&conversation());
        assert!(!text.contains("helpful assistant"));
    }

    #[test]
    fn test_llama3_format() {
        let text = ChatTemplate::llama3().render(&conversation());
        assert!(text.starts_with("<|begin_of_text|>"));
        assert!(text.contains("<|start_header_id|>user<|end_header_id|>\n\nHello.<|eot_id|>"));
    }

    #[test]
    fn test_mistral_folds_system_into_first_user() {
        let text = ChatTemplate::mistral().render(&conversation());
        assert_eq!(text, "<s>[INST] You are terse.\n\nHello. [/INST] Hi.</s>");
    }

    #[test]
    fn test_gemma_and_phi3_roles() {
        let gemma = ChatTemplate::gemma().render(&conversation());
        assert!(gemma.contains("<start_of_turn>model\nHi.<end_of_turn>"));

        let phi3 = ChatTemplate::phi3().render(&conversation());
        assert!(phi3.contains("<|assistant|>\nHi.<|end|>"));
    }

    #[test]
    fn test_detect_template() {
        let detect = |name| detect_template_from_model(name).map(|t| t.template_type);
        assert_eq!(detect("meta-llama/Llama-3.1-8B"), Some(ChatTemplateType::Llama3));
        assert_eq!(detect("mistralai/Mistral-7B-v0.1"), Some(ChatTemplateType::Mistral));
        assert_eq!(detect("google/gemma-2-9b"), Some(ChatTemplateType::Gemma));
        assert_eq!(
            detect("mlx-community/Qwen1.5-0.5B-Chat-4bit"),
            Some(ChatTemplateType::Qwen)
        );
        assert_eq!(detect("gpt2"), None);
    }
}
