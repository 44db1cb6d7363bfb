//! Data configuration types for sftkit.
//!
//! A configuration names one dataset source or an ordered list of them. Each
//! source is classified by its shape: a mapping with a `data` key is a local
//! directory, a mapping with a `path` key is a HuggingFace Hub dataset.
//!
//! ```yaml
//! train: true
//! test: false
//! dataset:
//!   - data: ./data/chat
//!   - path: billsum
//!     prompt_feature: text
//!     completion_feature: summary
//!     train_split: "train[:2%]"
//!     valid_split: "train[-2%:]"
//! ```

use crate::{Result, SftError, Split};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level data configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataConfig")]
pub struct DataConfig {
    /// Load the training split.
    pub train: bool,

    /// Load the test split.
    pub test: bool,

    /// Dataset source(s).
    pub dataset: DatasetSpec,
}

impl DataConfig {
    /// Create a configuration that loads train and valid from `dataset`.
    pub fn new(dataset: impl Into<DatasetSpec>) -> Self {
        Self {
            train: true,
            test: false,
            dataset: dataset.into(),
        }
    }

    /// Set whether the training split is requested.
    #[must_use]
    pub fn with_train(mut self, train: bool) -> Self {
        self.train = train;
        self
    }

    /// Set whether the test split is requested.
    #[must_use]
    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    /// Whether `split` must be present.
    ///
    /// The validation split is never required; it is loaded whenever available.
    pub fn requests(&self, split: Split) -> bool {
        match split {
            Split::Train => self.train,
            Split::Valid => false,
            Split::Test => self.test,
        }
    }

    /// Load configuration from a YAML (or JSON) file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// Descriptor shape problems surface as [`SftError::Config`].
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawDataConfig = serde_yaml::from_str(yaml)?;
        Self::try_from(raw)
    }
}

/// Serialized form of [`DataConfig`] before descriptor classification.
#[derive(Debug, Deserialize)]
struct RawDataConfig {
    #[serde(default = "default_true")]
    train: bool,
    #[serde(default)]
    test: bool,
    dataset: serde_json::Value,
}

impl TryFrom<RawDataConfig> for DataConfig {
    type Error = SftError;

    fn try_from(raw: RawDataConfig) -> Result<Self> {
        Ok(Self {
            train: raw.train,
            test: raw.test,
            dataset: DatasetSpec::from_value(raw.dataset)?,
        })
    }
}

/// One dataset source or an ordered list of sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DatasetSpec {
    /// A single source.
    One(DatasetSource),
    /// Several sources concatenated split by split, in order.
    Many(Vec<DatasetSource>),
}

impl DatasetSpec {
    /// Classify a raw value as one source or a list of sources.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Array(items) => {
                if items.is_empty() {
                    return Err(SftError::Config(
                        "dataset list must contain at least one source".to_string(),
                    ));
                }
                items
                    .into_iter()
                    .map(DatasetSource::from_value)
                    .collect::<Result<Vec<_>>>()
                    .map(Self::Many)
            }
            other => DatasetSource::from_value(other).map(Self::One),
        }
    }

    /// The sources in order. A single source becomes a one-element slice.
    pub fn sources(&self) -> &[DatasetSource] {
        match self {
            Self::One(source) => std::slice::from_ref(source),
            Self::Many(sources) => sources,
        }
    }
}

impl From<DatasetSource> for DatasetSpec {
    fn from(source: DatasetSource) -> Self {
        Self::One(source)
    }
}

impl From<Vec<DatasetSource>> for DatasetSpec {
    fn from(sources: Vec<DatasetSource>) -> Self {
        Self::Many(sources)
    }
}

impl From<LocalDatasetConfig> for DatasetSpec {
    fn from(local: LocalDatasetConfig) -> Self {
        Self::One(DatasetSource::Local(local))
    }
}

impl From<HubDatasetConfig> for DatasetSpec {
    fn from(hub: HubDatasetConfig) -> Self {
        Self::One(DatasetSource::Hub(hub))
    }
}

/// A single dataset source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DatasetSource {
    /// Directory holding `train.jsonl`, `valid.jsonl` and `test.jsonl`.
    Local(LocalDatasetConfig),
    /// Dataset hosted on the HuggingFace Hub.
    Hub(HubDatasetConfig),
}

impl DatasetSource {
    /// Classify a raw descriptor by its keys.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(SftError::Config(format!(
                "dataset source must be a mapping, got {value}"
            )));
        }

        match (value.get("data").is_some(), value.get("path").is_some()) {
            (true, false) => serde_json::from_value(value)
                .map(Self::Local)
                .map_err(|e| SftError::Config(format!("invalid local dataset source: {e}"))),
            (false, true) => serde_json::from_value(value)
                .map(Self::Hub)
                .map_err(|e| SftError::Config(format!("invalid hub dataset source: {e}"))),
            (true, true) => Err(SftError::Config(
                "dataset source has both 'data' and 'path'; use one".to_string(),
            )),
            (false, false) => Err(SftError::Config(
                "dataset source needs 'data' (local directory) or 'path' (hub dataset)"
                    .to_string(),
            )),
        }
    }

    /// Human-readable name used in logs and errors.
    pub fn name(&self) -> String {
        match self {
            Self::Local(local) => local.data.display().to_string(),
            Self::Hub(hub) => hub.path.clone(),
        }
    }
}

impl From<LocalDatasetConfig> for DatasetSource {
    fn from(local: LocalDatasetConfig) -> Self {
        Self::Local(local)
    }
}

impl From<HubDatasetConfig> for DatasetSource {
    fn from(hub: HubDatasetConfig) -> Self {
        Self::Hub(hub)
    }
}

/// Local directory source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalDatasetConfig {
    /// Directory containing the split files.
    pub data: PathBuf,
}

impl LocalDatasetConfig {
    /// Create a local source for `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { data: dir.into() }
    }

    /// Path of the file backing `split`.
    pub fn split_path(&self, split: Split) -> PathBuf {
        self.data.join(split.file_name())
    }
}

/// HuggingFace Hub source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubDatasetConfig {
    /// Dataset identifier (e.g. `billsum`, `tatsu-lab/alpaca`).
    pub path: String,

    /// Column holding the prompt (defaults to `prompt`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feature: Option<String>,

    /// Column holding the completion (defaults to `completion`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_feature: Option<String>,

    /// Column holding free text (defaults to `text`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_feature: Option<String>,

    /// Column holding chat turns (defaults to `messages`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_feature: Option<String>,

    /// Query selecting the training rows, e.g. `train[:80%]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_split: Option<String>,

    /// Query selecting the validation rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_split: Option<String>,

    /// Query selecting the test rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_split: Option<String>,
}

impl HubDatasetConfig {
    /// Create a hub source for `path` with no splits selected.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Map prompt/completion onto the given columns.
    #[must_use]
    pub fn with_features(
        mut self,
        prompt_feature: impl Into<String>,
        completion_feature: impl Into<String>,
    ) -> Self {
        self.prompt_feature = Some(prompt_feature.into());
        self.completion_feature = Some(completion_feature.into());
        self
    }

    /// Set the query expression for `split`.
    #[must_use]
    pub fn with_split(mut self, split: Split, query: impl Into<String>) -> Self {
        let query = Some(query.into());
        match split {
            Split::Train => self.train_split = query,
            Split::Valid => self.valid_split = query,
            Split::Test => self.test_split = query,
        }
        self
    }

    /// Query expression configured for `split`, if any.
    pub fn split_query(&self, split: Split) -> Option<&str> {
        match split {
            Split::Train => self.train_split.as_deref(),
            Split::Valid => self.valid_split.as_deref(),
            Split::Test => self.test_split.as_deref(),
        }
    }
}

fn default_true() -> bool {
    true
}
