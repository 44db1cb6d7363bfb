//! Configuration-driven loading of train/valid/test splits.

use crate::dataset::{ConcatenatedDataset, Dataset, FormatDataset};
use crate::hub::load_hub_split;
use crate::local::{check_local_source, load_local_split};
use crate::tokenizer::SampleTokenizer;
use sftkit_core::{DataConfig, DatasetSource, HubClient, Result, SftError, Split};
use std::sync::Arc;

/// The three splits produced by [`load_dataset`].
///
/// Each split is the concatenation, in source order, of what every source
/// contributed to it. A split no source contributed to is empty.
#[derive(Debug, Clone, Default)]
pub struct DatasetSplits {
    /// Training samples.
    pub train: ConcatenatedDataset,
    /// Validation samples.
    pub valid: ConcatenatedDataset,
    /// Test samples.
    pub test: ConcatenatedDataset,
}

impl DatasetSplits {
    /// The dataset for `split`.
    pub fn get(&self, split: Split) -> &ConcatenatedDataset {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test => &self.test,
        }
    }

    /// Destructure into `(train, valid, test)`.
    pub fn into_tuple(self) -> (ConcatenatedDataset, ConcatenatedDataset, ConcatenatedDataset) {
        (self.train, self.valid, self.test)
    }

    fn set(&mut self, split: Split, dataset: ConcatenatedDataset) {
        match split {
            Split::Train => self.train = dataset,
            Split::Valid => self.valid = dataset,
            Split::Test => self.test = dataset,
        }
    }
}

/// Load every source named by `config` and join them per split.
///
/// Sources are resolved in order and the first failure aborts the whole
/// load. `hub` is required only when some source is a hub dataset.
pub fn load_dataset(
    config: &DataConfig,
    tokenizer: Arc<dyn SampleTokenizer>,
    hub: Option<&dyn HubClient>,
) -> Result<DatasetSplits> {
    let sources = config.dataset.sources();
    if hub.is_none() {
        if let Some(source) = sources
            .iter()
            .find(|s| matches!(s, DatasetSource::Hub(_)))
        {
            return Err(SftError::Config(format!(
                "dataset {} is on the hub but no hub client was provided",
                source.name()
            )));
        }
    }

    let mut parts: [Vec<FormatDataset>; 3] = Default::default();
    for source in sources {
        tracing::info!("Loading dataset {}", source.name());
        if let DatasetSource::Local(local) = source {
            check_local_source(local)?;
        }
        for (slot, split) in parts.iter_mut().zip(Split::ALL) {
            let requested = config.requests(split);
            let loaded = match (source, hub) {
                (DatasetSource::Local(local), _) => {
                    load_local_split(local, split, requested, &tokenizer)?
                }
                (DatasetSource::Hub(remote), Some(hub)) => {
                    load_hub_split(remote, split, requested, &tokenizer, hub)?
                }
                (DatasetSource::Hub(_), None) => None,
            };
            slot.extend(loaded);
        }
    }

    let mut splits = DatasetSplits::default();
    for (split_parts, split) in parts.into_iter().zip(Split::ALL) {
        let dataset = ConcatenatedDataset::new(split_parts);
        match dataset.format() {
            Some(format) => tracing::info!(
                "{} split: {} {} samples from {} source(s)",
                split,
                dataset.len(),
                format,
                dataset.parts().len()
            ),
            None => tracing::info!(
                "{} split: {} samples from {} source(s)",
                split,
                dataset.len(),
                dataset.parts().len()
            ),
        }
        splits.set(split, dataset);
    }
    Ok(splits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ByteTokenizer, MemoryHub};
    use serde_json::json;
    use sftkit_core::{HubDatasetConfig, LocalDatasetConfig, RawRecord};
    use tempfile::TempDir;

    fn tokenizer() -> Arc<dyn SampleTokenizer> {
        Arc::new(ByteTokenizer::new())
    }

    fn text_dir(train: usize, valid: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        let line = "{\"text\": \"sample\"}\n";
        std::fs::write(dir.path().join("train.jsonl"), line.repeat(train)).unwrap();
        std::fs::write(dir.path().join("valid.jsonl"), line.repeat(valid)).unwrap();
        dir
    }

    #[test]
    fn test_sources_concatenate_in_order() {
        let first = text_dir(2, 1);
        let second = text_dir(3, 0);
        let config = DataConfig::new(vec![
            DatasetSource::Local(LocalDatasetConfig::new(first.path())),
            DatasetSource::Local(LocalDatasetConfig::new(second.path())),
        ]);

        let splits = load_dataset(&config, tokenizer(), None).unwrap();
        assert_eq!(splits.train.len(), 5);
        assert_eq!(splits.train.parts().len(), 2);
        assert_eq!(splits.valid.len(), 1);
        assert!(splits.get(Split::Test).is_empty());
    }

    #[test]
    fn test_hub_source_requires_client() {
        let config = DataConfig::new(DatasetSource::Hub(
            HubDatasetConfig::new("billsum").with_split(Split::Train, "train"),
        ));
        let err = load_dataset(&config, tokenizer(), None).err().unwrap();
        assert!(matches!(err, SftError::Config(_)));
    }

    #[test]
    fn test_mixed_sources() {
        let dir = text_dir(1, 0);
        let row: RawRecord = json!({"text": "remote"}).as_object().cloned().unwrap();
        let hub = MemoryHub::new().with_rows("remote", "train", vec![row]);
        let config = DataConfig::new(vec![
            DatasetSource::Local(LocalDatasetConfig::new(dir.path())),
            DatasetSource::Hub(HubDatasetConfig::new("remote").with_split(Split::Train, "train")),
        ]);

        let (train, valid, test) = load_dataset(&config, tokenizer(), Some(&hub))
            .unwrap()
            .into_tuple();
        assert_eq!(train.len(), 2);
        assert_eq!(train.get(1).unwrap(), b"remote".iter().map(|&b| u32::from(b)).collect::<Vec<_>>());
        assert!(valid.is_empty());
        assert!(test.is_empty());
    }

    #[test]
    fn test_first_failure_aborts() {
        let good = text_dir(1, 0);
        let missing = TempDir::new().unwrap();
        let config = DataConfig::new(vec![
            DatasetSource::Local(LocalDatasetConfig::new(good.path())),
            DatasetSource::Local(LocalDatasetConfig::new(missing.path())),
        ]);
        let err = load_dataset(&config, tokenizer(), None).err().unwrap();
        assert!(matches!(err, SftError::MissingSplit { split: Split::Train, .. }));
    }

    #[test]
    fn test_missing_directory_is_config_error() {
        let good = text_dir(1, 0);
        let config = DataConfig::new(vec![
            DatasetSource::Local(LocalDatasetConfig::new(good.path())),
            DatasetSource::Local(LocalDatasetConfig::new("/nonexistent/sftkit/data")),
        ])
        .with_train(false);
        let err = load_dataset(&config, tokenizer(), None).err().unwrap();
        assert!(matches!(err, SftError::Config(_)));
    }
}
