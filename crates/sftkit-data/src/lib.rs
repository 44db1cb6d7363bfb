//! Dataset loading for supervised fine-tuning.
//!
//! This crate provides:
//! - Record shape detection (free text, prompt/completion, chat)
//! - Lazy tokenized dataset containers and their concatenation
//! - Local JSONL directories and HuggingFace Hub sources
//! - Config-driven loading of train/valid/test splits
//! - Tokenizer integration with chat templates

#![warn(missing_docs)]

pub mod chat_templates;
pub mod dataset;
pub mod detect;
pub mod encode;
pub mod hub;
pub mod loader;
pub mod local;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tokenizer;

pub use chat_templates::{detect_template_from_model, ChatTemplate, ChatTemplateType, Message};
pub use dataset::*;
pub use detect::FieldNames;
pub use hub::load_hub_split;
pub use loader::{load_dataset, DatasetSplits};
pub use local::{check_local_source, load_local_split, read_jsonl};
pub use tokenizer::*;
