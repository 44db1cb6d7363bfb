//! Dataset downloading from HuggingFace Hub.
//!
//! Rows are read from the dataset's parquet shards. Shards are located from
//! the repository file listing, falling back to the `refs/convert/parquet`
//! branch the hub generates for datasets stored in other formats.

use crate::split_query::SplitQuery;
use arrow::record_batch::RecordBatch;
use hf_hub::api::sync::{Api, ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value;
use sftkit_core::{HubClient, RawRecord, Result, SecretString, SftError};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Branch holding the hub's automatic parquet conversion of a dataset.
const PARQUET_REVISION: &str = "refs/convert/parquet";

/// Hub client backed by the HuggingFace Hub.
///
/// Every fetch downloads (or reuses from the local hf-hub cache) the parquet
/// shards of the splits a query names, then applies the query's slices.
#[derive(Debug, Clone, Default)]
pub struct HfHubClient {
    revision: Option<String>,
    token: Option<SecretString>,
    cache_dir: Option<PathBuf>,
}

impl HfHubClient {
    /// Create a client for the default revision, authenticated with
    /// `HF_TOKEN` when it is set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read datasets at `revision` instead of the default branch.
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Authenticate with `token`.
    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Store downloads under `dir` instead of the hf-hub default cache.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Build API with optional token authentication.
    fn build_api(&self) -> Result<Api> {
        let mut builder = ApiBuilder::new().with_progress(false);

        if let Some(secret) = self
            .token
            .clone()
            .or_else(|| SecretString::from_env("HF_TOKEN"))
        {
            builder = builder.with_token(Some(secret.expose_secret().to_string()));
        }
        if let Some(dir) = &self.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }

        builder.build().map_err(|e| SftError::RemoteFetch(e.to_string()))
    }

    /// Download the parquet shards of `split`, in shard order.
    pub fn download_split(&self, dataset_id: &str, split: &str) -> Result<Vec<PathBuf>> {
        let api = self.build_api()?;

        let repo = dataset_repo(&api, dataset_id, self.revision.as_deref());
        let files = match repo.info() {
            Ok(info) => split_shards(info.siblings.iter().map(|s| s.rfilename.as_str()), split),
            Err(e) => {
                tracing::debug!("Could not list files of {}: {}", dataset_id, e);
                Vec::new()
            }
        };
        if !files.is_empty() {
            return download_all(&repo, &files);
        }

        tracing::debug!(
            "No {} parquet shards in {}, trying {}",
            split,
            dataset_id,
            PARQUET_REVISION
        );
        let converted = dataset_repo(&api, dataset_id, Some(PARQUET_REVISION));
        let info = converted.info().map_err(|e| {
            SftError::RemoteFetch(format!("failed to list dataset '{}': {}", dataset_id, e))
        })?;
        let files = split_shards(info.siblings.iter().map(|s| s.rfilename.as_str()), split);
        if files.is_empty() {
            return Err(SftError::RemoteFetch(format!(
                "no parquet files found for split '{}' in dataset '{}'",
                split, dataset_id
            )));
        }
        download_all(&converted, &files)
    }
}

impl HubClient for HfHubClient {
    fn fetch(&self, dataset_id: &str, split_query: &str) -> Result<Vec<RawRecord>> {
        let query = SplitQuery::parse(split_query)?;

        let mut splits: HashMap<&str, Vec<RawRecord>> = HashMap::new();
        for name in query.split_names() {
            let shards = self.download_split(dataset_id, name)?;
            let mut rows = Vec::new();
            for shard in &shards {
                rows.extend(read_parquet_rows(shard)?);
            }
            tracing::debug!("{} split of {} has {} rows", name, dataset_id, rows.len());
            splits.insert(name, rows);
        }

        let mut selected = Vec::new();
        for slice in query.slices() {
            let rows = splits
                .get(slice.split.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            selected.extend_from_slice(&rows[slice.resolve(rows.len())]);
        }
        tracing::info!(
            "Fetched {} rows from {} ({})",
            selected.len(),
            dataset_id,
            query
        );
        Ok(selected)
    }
}

fn dataset_repo(api: &Api, dataset_id: &str, revision: Option<&str>) -> ApiRepo {
    match revision {
        Some(rev) => api.repo(Repo::with_revision(
            dataset_id.to_string(),
            RepoType::Dataset,
            rev.to_string(),
        )),
        None => api.repo(Repo::new(dataset_id.to_string(), RepoType::Dataset)),
    }
}

fn download_all(repo: &ApiRepo, files: &[String]) -> Result<Vec<PathBuf>> {
    files
        .iter()
        .map(|file| {
            tracing::info!("Downloading {}...", file);
            repo.get(file)
                .map_err(|e| SftError::RemoteFetch(format!("failed to download {}: {}", file, e)))
        })
        .collect()
}

/// Parquet files in a repository listing that belong to `split`, sorted.
///
/// Matches the layouts the hub uses: `data/train-00000-of-00002.parquet`,
/// `train.parquet`, and `default/train/0000.parquet`.
pub fn split_shards<'a>(files: impl IntoIterator<Item = &'a str>, split: &str) -> Vec<String> {
    let mut shards: Vec<String> = files
        .into_iter()
        .filter(|name| is_split_shard(name, split))
        .map(str::to_string)
        .collect();
    shards.sort();
    shards
}

fn is_split_shard(file: &str, split: &str) -> bool {
    let Some(path) = file.strip_suffix(".parquet") else {
        return false;
    };
    let mut components: Vec<&str> = path.split('/').collect();
    let Some(stem) = components.pop() else {
        return false;
    };
    if components.contains(&split) {
        return true;
    }
    stem == split
        || stem
            .strip_prefix(split)
            .is_some_and(|rest| rest.starts_with('-') || rest.starts_with('.'))
}

/// Read every row of a parquet file as a JSON object.
pub fn read_parquet_rows<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        SftError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open Parquet file {}: {}", path.display(), e),
        ))
    })?;

    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|builder| builder.build())
        .map_err(|e| parquet_error(path, e))?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result.map_err(|e| parquet_error(path, e))?;
        records.extend(batch_to_records(&batch)?);
    }
    Ok(records)
}

/// Convert a record batch to JSON objects, one per row. Null cells are omitted.
pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<RawRecord>> {
    if batch.num_rows() == 0 {
        return Ok(Vec::new());
    }

    let json_error = |e: arrow::error::ArrowError| {
        SftError::RemoteFetch(format!("failed to convert rows to JSON: {}", e))
    };
    let mut writer = arrow::json::ArrayWriter::new(Vec::new());
    writer.write(batch).map_err(json_error)?;
    writer.finish().map_err(json_error)?;
    let rows: Vec<Value> = serde_json::from_slice(&writer.into_inner())?;

    rows.into_iter()
        .map(|row| match row {
            Value::Object(record) => Ok(record),
            other => Err(SftError::RemoteFetch(format!(
                "expected a JSON object per row, got {}",
                other
            ))),
        })
        .collect()
}

fn parquet_error(path: &Path, e: impl std::fmt::Display) -> SftError {
    SftError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("Failed to read Parquet file {}: {}", path.display(), e),
    ))
}
