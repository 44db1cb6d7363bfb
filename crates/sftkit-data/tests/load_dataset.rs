//! End-to-end loading from data configs.

use serde_json::{json, Value};
use sftkit_core::{DataConfig, RawRecord, SampleFormat, SftError, Split};
use sftkit_data::testing::{ByteTokenizer, MemoryHub};
use sftkit_data::{load_dataset, Dataset, DatasetSplits, FormatDataset, SampleTokenizer};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn tokenizer() -> Arc<dyn SampleTokenizer> {
    Arc::new(ByteTokenizer::new().with_eos(0).with_chat_template())
}

fn save_data(dir: &Path, record: &Value, count: usize) {
    for split in ["train", "valid"] {
        let mut file = std::fs::File::create(dir.join(format!("{split}.jsonl"))).unwrap();
        for _ in 0..count {
            writeln!(file, "{record}").unwrap();
        }
    }
}

fn load_local(dir: &Path) -> DatasetSplits {
    let yaml = format!("train: true\ntest: false\ndataset:\n  data: {}\n", dir.display());
    let config = DataConfig::from_yaml(&yaml).unwrap();
    load_dataset(&config, tokenizer(), None).unwrap()
}

fn assert_four_four_zero(splits: &DatasetSplits) {
    assert_eq!(splits.train.len(), 4);
    assert_eq!(splits.valid.len(), 4);
    assert_eq!(splits.test.len(), 0);
    assert!(!splits.train.get(0).unwrap().is_empty());
    assert!(!splits.valid.get(0).unwrap().is_empty());
}

#[test]
fn test_text() {
    let dir = TempDir::new().unwrap();
    save_data(dir.path(), &json!({"text": "This is an example for the model."}), 4);

    let splits = load_local(dir.path());
    assert_four_four_zero(&splits);
    assert!(matches!(splits.train.parts()[0], FormatDataset::Text(_)));
    assert_eq!(splits.train.get(0).unwrap().last(), Some(&0));
}

#[test]
fn test_completions() {
    let dir = TempDir::new().unwrap();
    save_data(
        dir.path(),
        &json!({"prompt": "What is the capital of France?", "completion": "Paris."}),
        4,
    );

    let splits = load_local(dir.path());
    assert_four_four_zero(&splits);
    assert_eq!(splits.train.format(), Some(SampleFormat::Completions));
    assert_eq!(splits.train.at(3).unwrap(), splits.train.at(3).unwrap());
    assert_eq!(
        splits.train.completion_offset(0).unwrap(),
        Some("What is the capital of France?".len())
    );
}

#[test]
fn test_chat() {
    let dir = TempDir::new().unwrap();
    save_data(
        dir.path(),
        &json!({
            "messages": [
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "Hello."},
                {"role": "assistant", "content": "How can I assistant you today."}
            ]
        }),
        4,
    );

    let splits = load_local(dir.path());
    assert_four_four_zero(&splits);
    assert!(matches!(splits.train.parts()[0], FormatDataset::Chat(_)));
    assert_eq!(splits.valid.at(1).unwrap(), splits.valid.at(1).unwrap());
}

fn billsum_rows(count: usize) -> Vec<RawRecord> {
    (0..count)
        .map(|i| {
            json!({"text": format!("bill {i}"), "summary": format!("summary {i}")})
                .as_object()
                .cloned()
                .unwrap()
        })
        .collect()
}

const BILLSUM: &str = r#"
path: billsum
prompt_feature: text
completion_feature: summary
train_split: "train[:2%]"
valid_split: "train[-2%:]"
"#;

#[test]
fn test_hub() {
    let hub = MemoryHub::new()
        .with_rows("billsum", "train[:2%]", billsum_rows(3))
        .with_rows("billsum", "train[-2%:]", billsum_rows(2));

    let single = DataConfig::from_yaml(&format!("dataset:{}", indent(BILLSUM))).unwrap();
    let (train, valid, test) = load_dataset(&single, tokenizer(), Some(&hub))
        .unwrap()
        .into_tuple();
    assert_eq!(train.len(), 3);
    assert!(!train.get(0).unwrap().is_empty());
    assert_eq!(valid.len(), 2);
    assert!(!valid.get(0).unwrap().is_empty());
    assert_eq!(test.len(), 0);
    assert_eq!(train.format(), Some(SampleFormat::Completions));

    let list = format!("dataset:\n  -{}\n  -{}", indent(BILLSUM), indent(BILLSUM));
    let double = DataConfig::from_yaml(&list).unwrap();
    let (train2, valid2, test2) = load_dataset(&double, tokenizer(), Some(&hub))
        .unwrap()
        .into_tuple();
    assert_eq!(train2.len(), 2 * train.len());
    assert_eq!(valid2.len(), 2 * valid.len());
    assert_eq!(test2.len(), 2 * test.len());
    assert_eq!(train2.get(3).unwrap(), train.get(0).unwrap());
    for i in 0..train2.len() {
        assert_eq!(train2.at(i as isize).unwrap(), train2.at(i as isize).unwrap());
    }
}

/// Re-indent a YAML mapping to sit under a `dataset:` key or list item.
fn indent(yaml: &str) -> String {
    yaml.trim()
        .lines()
        .map(|line| format!("\n    {line}"))
        .collect()
}

#[test]
fn test_train_not_requested() {
    let dir = TempDir::new().unwrap();
    save_data(dir.path(), &json!({"text": "x"}), 2);
    let config = DataConfig::new(sftkit_core::LocalDatasetConfig::new(dir.path())).with_train(false);

    let splits = load_dataset(&config, tokenizer(), None).unwrap();
    assert!(splits.get(Split::Train).is_empty());
    assert_eq!(splits.get(Split::Valid).len(), 2);
}

#[test]
fn test_access_is_idempotent_and_bounded() {
    let dir = TempDir::new().unwrap();
    save_data(dir.path(), &json!({"text": "same every time"}), 3);
    let splits = load_local(dir.path());

    let first = splits.train.at(2).unwrap();
    assert_eq!(splits.train.at(2).unwrap(), first);
    assert!(matches!(
        splits.train.at(3),
        Err(SftError::IndexOutOfRange { index: 3, len: 3 })
    ));
    assert!(matches!(
        splits.train.at(-1),
        Err(SftError::IndexOutOfRange { index: -1, len: 3 })
    ));
}

#[test]
fn test_mid_file_mismatch_is_fatal() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("train.jsonl"),
        "{\"text\": \"a\"}\n{\"prompt\": \"p\"}\n",
    )
    .unwrap();
    let config = DataConfig::new(sftkit_core::LocalDatasetConfig::new(dir.path()));

    match load_dataset(&config, tokenizer(), None) {
        Err(SftError::SchemaMismatch {
            location, expected, ..
        }) => {
            assert!(location.ends_with("train.jsonl:2"), "{location}");
            assert_eq!(expected, SampleFormat::Text);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("mixed file loaded"),
    }
}

#[test]
fn test_unrecognized_schema() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("train.jsonl"), "{\"question\": \"q\"}\n").unwrap();
    let config = DataConfig::new(sftkit_core::LocalDatasetConfig::new(dir.path()));

    match load_dataset(&config, tokenizer(), None) {
        Err(SftError::UnrecognizedSchema { keys, .. }) => assert_eq!(keys, vec!["question"]),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unknown shape loaded"),
    }
}

#[test]
fn test_missing_requested_split() {
    let dir = TempDir::new().unwrap();
    save_data(dir.path(), &json!({"text": "x"}), 1);
    let config = DataConfig::new(sftkit_core::LocalDatasetConfig::new(dir.path())).with_test(true);

    assert!(matches!(
        load_dataset(&config, tokenizer(), None),
        Err(SftError::MissingSplit {
            split: Split::Test,
            ..
        })
    ));
}
