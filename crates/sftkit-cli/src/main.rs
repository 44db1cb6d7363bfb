//! sftkit CLI - inspect fine-tuning data configurations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sftkit_core::{DataConfig, HubClient, Split};
use sftkit_data::{
    load_dataset, ChatTemplate, ChatTemplateType, Dataset, DatasetSplits, SampleTokenizer,
    Tokenizer,
};
use sftkit_hub::HfHubClient;

#[derive(Parser)]
#[command(name = "sftkit")]
#[command(author, version, about = "Dataset loading for supervised fine-tuning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a data configuration and print per-split statistics
    Inspect {
        /// Path to data configuration file (YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Path to tokenizer.json
        #[arg(short, long)]
        tokenizer: PathBuf,

        /// Model name, used to pick a chat template
        #[arg(short, long)]
        model_name: Option<String>,

        /// Chat template (overrides the one picked from --model-name)
        #[arg(long, value_enum)]
        chat_template: Option<TemplateArg>,

        /// Reject samples longer than this many tokens
        #[arg(long)]
        max_length: Option<usize>,

        /// Hub revision to read datasets from
        #[arg(long)]
        revision: Option<String>,

        /// Number of samples to show per split
        #[arg(long, default_value = "1")]
        show: usize,
    },
}

/// Chat template choices.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum TemplateArg {
    /// ChatML format
    Chatml,
    /// Qwen (ChatML with a default system prompt)
    Qwen,
    /// Llama 3 chat format
    Llama3,
    /// Mistral instruct format
    Mistral,
    /// Gemma instruct format
    Gemma,
    /// Phi-3 instruct format
    Phi3,
}

impl From<TemplateArg> for ChatTemplateType {
    fn from(arg: TemplateArg) -> Self {
        match arg {
            TemplateArg::Chatml => ChatTemplateType::ChatMl,
            TemplateArg::Qwen => ChatTemplateType::Qwen,
            TemplateArg::Llama3 => ChatTemplateType::Llama3,
            TemplateArg::Mistral => ChatTemplateType::Mistral,
            TemplateArg::Gemma => ChatTemplateType::Gemma,
            TemplateArg::Phi3 => ChatTemplateType::Phi3,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            config,
            tokenizer,
            model_name,
            chat_template,
            max_length,
            revision,
            show,
        } => {
            let data_config = DataConfig::from_yaml_file(&config)
                .with_context(|| format!("failed to read {}", config.display()))?;

            let mut tok = Tokenizer::from_file(&tokenizer)
                .with_context(|| format!("failed to load {}", tokenizer.display()))?;
            if let Some(name) = &model_name {
                tok = tok.with_template_for_model(name);
            }
            if let Some(template) = chat_template {
                tok = tok.with_chat_template(ChatTemplate::new(template.into()));
            }
            if let Some(max) = max_length {
                tok = tok.with_max_length(max);
            }

            let mut hub = HfHubClient::new();
            if let Some(rev) = revision {
                hub = hub.with_revision(rev);
            }

            let tok = Arc::new(tok);
            let splits = load_dataset(
                &data_config,
                Arc::clone(&tok) as Arc<dyn SampleTokenizer>,
                Some(&hub as &dyn HubClient),
            )?;
            print_summary(&config, &splits, &tok, show)?;
        }
    }

    Ok(())
}

fn print_summary(
    config: &std::path::Path,
    splits: &DatasetSplits,
    tokenizer: &Tokenizer,
    show: usize,
) -> anyhow::Result<()> {
    println!("========================================");
    println!("  sftkit data inspection");
    println!("========================================");
    println!("Config:    {}", config.display());
    println!("Template:  {}", template_name(tokenizer));
    println!("========================================\n");

    for split in Split::ALL {
        let dataset = splits.get(split);
        let format = dataset
            .format()
            .map_or_else(|| "mixed".to_string(), |f| f.to_string());
        if dataset.is_empty() {
            println!("{:<6} empty", split.as_str());
            continue;
        }
        println!(
            "{:<6} {} samples ({}) from {} source(s)",
            split.as_str(),
            dataset.len(),
            format,
            dataset.parts().len()
        );

        for index in 0..show.min(dataset.len()) {
            let ids = dataset
                .get(index)
                .with_context(|| format!("failed to encode {} sample {}", split, index))?;
            match dataset.completion_offset(index)? {
                Some(offset) => println!(
                    "  [{}] {} tokens, completion starts at {}",
                    index,
                    ids.len(),
                    offset
                ),
                None => println!("  [{}] {} tokens", index, ids.len()),
            }
            let preview: String = tokenizer.decode(&ids)?.chars().take(80).collect();
            println!("      {:?}", preview);
        }
    }

    Ok(())
}

fn template_name(tokenizer: &Tokenizer) -> String {
    tokenizer
        .chat_template()
        .map_or_else(|| "none".to_string(), |t| format!("{:?}", t.template_type))
}
