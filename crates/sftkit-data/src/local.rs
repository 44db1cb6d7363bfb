//! Local directory sources: `train.jsonl`, `valid.jsonl`, `test.jsonl`.

use crate::dataset::FormatDataset;
use crate::detect::FieldNames;
use crate::tokenizer::SampleTokenizer;
use serde_json::Value;
use sftkit_core::{LocalDatasetConfig, RawRecord, Result, SftError, Split};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// Read a JSONL file into raw records, one per non-blank line.
pub fn read_jsonl<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        SftError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open dataset file {}: {}", path.display(), e),
        ))
    })?;

    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| {
            SftError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}:{}: {}", path.display(), line_num + 1, e),
            ))
        })?;

        if line.trim().is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(&line).map_err(|e| {
            SftError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Invalid JSON at {}:{}: {}", path.display(), line_num + 1, e),
            ))
        })?;

        match value {
            Value::Object(record) => records.push(record),
            _ => {
                return Err(SftError::UnrecognizedSchema {
                    location: format!("{}:{}", path.display(), line_num + 1),
                    keys: Vec::new(),
                })
            }
        }
    }

    Ok(records)
}

/// Check that a local source's directory exists.
pub fn check_local_source(config: &LocalDatasetConfig) -> Result<()> {
    if !config.data.is_dir() {
        return Err(SftError::Config(format!(
            "dataset directory {} does not exist",
            config.data.display()
        )));
    }
    Ok(())
}

/// Resolve one split of a local source.
///
/// Train and test are read only when `requested`, and must then exist. The
/// validation file is read whenever it exists. A missing, unrequested file
/// yields `None`. The directory itself is checked by [`check_local_source`].
pub fn load_local_split(
    config: &LocalDatasetConfig,
    split: Split,
    requested: bool,
    tokenizer: &Arc<dyn SampleTokenizer>,
) -> Result<Option<FormatDataset>> {
    if split != Split::Valid && !requested {
        return Ok(None);
    }

    let path = config.split_path(split);
    if !path.is_file() {
        if requested {
            return Err(SftError::MissingSplit {
                split,
                source_name: config.data.display().to_string(),
            });
        }
        tracing::debug!("No {} file in {}", split, config.data.display());
        return Ok(None);
    }

    tracing::debug!("Reading {}", path.display());
    let records = read_jsonl(&path)?;
    FormatDataset::from_records(
        records,
        Arc::clone(tokenizer),
        FieldNames::default(),
        &path.display().to_string(),
        None,
    )
}
