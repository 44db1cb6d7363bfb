//! Dataset containers.
//!
//! Every container is an ordered, fixed-length collection of token sequences.
//! Containers keep the raw records and a shared tokenizer, and encode a record
//! only when it is asked for. Nothing is cached unless the caller wraps the
//! container in a [`CacheDataset`].

use crate::detect::FieldNames;
use crate::encode::{completion_offset, encode_chat, encode_completion, encode_text};
use crate::tokenizer::SampleTokenizer;
use sftkit_core::{RawRecord, Result, SampleFormat, SftError};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Indexable collection of tokenized samples.
pub trait Dataset: Send + Sync {
    /// Number of samples.
    fn len(&self) -> usize;

    /// Check if the dataset is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Token IDs of the sample at `index`.
    ///
    /// Fails with [`SftError::IndexOutOfRange`] unless `index < len()`.
    fn get(&self, index: usize) -> Result<Vec<u32>>;

    /// Like [`get`](Dataset::get), for signed indices.
    ///
    /// Negative indices are out of range; they do not count from the end.
    fn at(&self, index: isize) -> Result<Vec<u32>> {
        let index = usize::try_from(index)
            .map_err(|_| SftError::index_out_of_range(index, self.len()))?;
        self.get(index)
    }

    /// Shape of the samples, when all of them share one.
    fn format(&self) -> Option<SampleFormat>;

    /// Token index where the completion starts, for completions samples.
    fn completion_offset(&self, index: usize) -> Result<Option<usize>> {
        if index < self.len() {
            Ok(None)
        } else {
            Err(SftError::index_out_of_range(index, self.len()))
        }
    }
}

fn record_at<'a>(records: &'a [RawRecord], index: usize) -> Result<&'a RawRecord> {
    records
        .get(index)
        .ok_or_else(|| SftError::index_out_of_range(index, records.len()))
}

fn mismatch(format: SampleFormat, index: usize, reason: String) -> SftError {
    SftError::SchemaMismatch {
        location: format!("record {}", index),
        expected: format,
        reason,
    }
}

/// Free-text samples: `encode(text)`.
#[derive(Clone)]
pub struct TextDataset {
    records: Vec<RawRecord>,
    tokenizer: Arc<dyn SampleTokenizer>,
    fields: FieldNames,
}

impl TextDataset {
    /// Create a dataset over records carrying a `text` field.
    pub fn new(records: Vec<RawRecord>, tokenizer: Arc<dyn SampleTokenizer>) -> Self {
        Self::with_fields(records, tokenizer, FieldNames::default())
    }

    /// Create a dataset reading text from `fields.text`.
    pub fn with_fields(
        records: Vec<RawRecord>,
        tokenizer: Arc<dyn SampleTokenizer>,
        fields: FieldNames,
    ) -> Self {
        Self {
            records,
            tokenizer,
            fields,
        }
    }

    /// The raw records behind this dataset.
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }
}

impl fmt::Debug for TextDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextDataset")
            .field("len", &self.records.len())
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl Dataset for TextDataset {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize) -> Result<Vec<u32>> {
        let record = record_at(&self.records, index)?;
        let text = self
            .fields
            .text_of(record)
            .map_err(|reason| mismatch(SampleFormat::Text, index, reason))?;
        encode_text(self.tokenizer.as_ref(), text)
    }

    fn format(&self) -> Option<SampleFormat> {
        Some(SampleFormat::Text)
    }
}

/// Prompt/completion samples: `encode(prompt ++ completion)`.
#[derive(Clone)]
pub struct CompletionsDataset {
    records: Vec<RawRecord>,
    tokenizer: Arc<dyn SampleTokenizer>,
    fields: FieldNames,
}

impl CompletionsDataset {
    /// Create a dataset over records carrying `prompt` and `completion` fields.
    pub fn new(records: Vec<RawRecord>, tokenizer: Arc<dyn SampleTokenizer>) -> Self {
        Self::with_fields(records, tokenizer, FieldNames::default())
    }

    /// Create a dataset reading from `fields.prompt` and `fields.completion`.
    pub fn with_fields(
        records: Vec<RawRecord>,
        tokenizer: Arc<dyn SampleTokenizer>,
        fields: FieldNames,
    ) -> Self {
        Self {
            records,
            tokenizer,
            fields,
        }
    }

    /// The raw records behind this dataset.
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    fn pair(&self, index: usize) -> Result<(&str, &str)> {
        let record = record_at(&self.records, index)?;
        let fail = |reason| mismatch(SampleFormat::Completions, index, reason);
        let prompt = self.fields.prompt_of(record).map_err(fail)?;
        let completion = self.fields.completion_of(record).map_err(fail)?;
        Ok((prompt, completion))
    }
}

impl fmt::Debug for CompletionsDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionsDataset")
            .field("len", &self.records.len())
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl Dataset for CompletionsDataset {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize) -> Result<Vec<u32>> {
        let (prompt, completion) = self.pair(index)?;
        encode_completion(self.tokenizer.as_ref(), prompt, completion)
    }

    fn format(&self) -> Option<SampleFormat> {
        Some(SampleFormat::Completions)
    }

    fn completion_offset(&self, index: usize) -> Result<Option<usize>> {
        let (prompt, completion) = self.pair(index)?;
        completion_offset(self.tokenizer.as_ref(), prompt, completion).map(Some)
    }
}

/// Chat samples: `encode(render(turns))`.
#[derive(Clone)]
pub struct ChatDataset {
    records: Vec<RawRecord>,
    tokenizer: Arc<dyn SampleTokenizer>,
    fields: FieldNames,
}

impl ChatDataset {
    /// Create a dataset over records carrying a `messages` list.
    pub fn new(records: Vec<RawRecord>, tokenizer: Arc<dyn SampleTokenizer>) -> Self {
        Self::with_fields(records, tokenizer, FieldNames::default())
    }

    /// Create a dataset reading turns from `fields.messages`.
    pub fn with_fields(
        records: Vec<RawRecord>,
        tokenizer: Arc<dyn SampleTokenizer>,
        fields: FieldNames,
    ) -> Self {
        Self {
            records,
            tokenizer,
            fields,
        }
    }

    /// The raw records behind this dataset.
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }
}

impl fmt::Debug for ChatDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatDataset")
            .field("len", &self.records.len())
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl Dataset for ChatDataset {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize) -> Result<Vec<u32>> {
        let record = record_at(&self.records, index)?;
        let messages = self
            .fields
            .messages_of(record)
            .map_err(|reason| mismatch(SampleFormat::Chat, index, reason))?;
        encode_chat(self.tokenizer.as_ref(), &messages)
    }

    fn format(&self) -> Option<SampleFormat> {
        Some(SampleFormat::Chat)
    }
}

/// One source's records in whichever shape they were detected as.
#[derive(Debug, Clone)]
pub enum FormatDataset {
    /// Free-text samples.
    Text(TextDataset),
    /// Prompt/completion samples.
    Completions(CompletionsDataset),
    /// Chat samples.
    Chat(ChatDataset),
}

impl FormatDataset {
    /// Detect the shape from the first record, validate every record against
    /// it, and build the matching container.
    ///
    /// `forced` skips detection and applies that shape to every record.
    /// Returns `None` for an empty record list.
    pub fn from_records(
        records: Vec<RawRecord>,
        tokenizer: Arc<dyn SampleTokenizer>,
        fields: FieldNames,
        location: &str,
        forced: Option<SampleFormat>,
    ) -> Result<Option<Self>> {
        let Some(first) = records.first() else {
            return Ok(None);
        };
        let format = match forced {
            Some(format) => format,
            None => fields.detect(first, &format!("{location}:1"))?,
        };

        for (i, record) in records.iter().enumerate() {
            fields.validate(record, format, &format!("{}:{}", location, i + 1))?;
        }

        Ok(Some(match format {
            SampleFormat::Text => Self::Text(TextDataset::with_fields(records, tokenizer, fields)),
            SampleFormat::Completions => {
                Self::Completions(CompletionsDataset::with_fields(records, tokenizer, fields))
            }
            SampleFormat::Chat => Self::Chat(ChatDataset::with_fields(records, tokenizer, fields)),
        }))
    }

    fn inner(&self) -> &dyn Dataset {
        match self {
            Self::Text(ds) => ds,
            Self::Completions(ds) => ds,
            Self::Chat(ds) => ds,
        }
    }
}

impl Dataset for FormatDataset {
    fn len(&self) -> usize {
        self.inner().len()
    }

    fn get(&self, index: usize) -> Result<Vec<u32>> {
        self.inner().get(index)
    }

    fn format(&self) -> Option<SampleFormat> {
        self.inner().format()
    }

    fn completion_offset(&self, index: usize) -> Result<Option<usize>> {
        self.inner().completion_offset(index)
    }
}

/// Several datasets joined end to end.
///
/// Index `i` goes to the part whose range contains it; parts keep their own
/// order and are never interleaved.
#[derive(Debug, Clone, Default)]
pub struct ConcatenatedDataset {
    parts: Vec<FormatDataset>,
    /// Exclusive end index of each part.
    ends: Vec<usize>,
}

impl ConcatenatedDataset {
    /// Create a concatenation of `parts`, in order.
    pub fn new(parts: Vec<FormatDataset>) -> Self {
        let ends = parts
            .iter()
            .scan(0, |total, part| {
                *total += part.len();
                Some(*total)
            })
            .collect();
        Self { parts, ends }
    }

    /// An empty dataset.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The joined parts.
    pub fn parts(&self) -> &[FormatDataset] {
        &self.parts
    }

    /// Map a global index to `(part, local index)`.
    fn locate(&self, index: usize) -> Result<(usize, usize)> {
        let part = self.ends.partition_point(|&end| end <= index);
        if part == self.parts.len() {
            return Err(SftError::index_out_of_range(index, self.len()));
        }
        let start = if part == 0 { 0 } else { self.ends[part - 1] };
        Ok((part, index - start))
    }
}

impl Dataset for ConcatenatedDataset {
    fn len(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    fn get(&self, index: usize) -> Result<Vec<u32>> {
        let (part, local) = self.locate(index)?;
        self.parts[part].get(local)
    }

    fn format(&self) -> Option<SampleFormat> {
        let mut formats = self.parts.iter().map(FormatDataset::format);
        let first = formats.next()??;
        formats.all(|f| f == Some(first)).then_some(first)
    }

    fn completion_offset(&self, index: usize) -> Result<Option<usize>> {
        let (part, local) = self.locate(index)?;
        self.parts[part].completion_offset(local)
    }
}

/// Explicit memoization layer over any dataset.
///
/// Each sample is encoded at most once; later reads return the stored tokens.
#[derive(Debug)]
pub struct CacheDataset<D> {
    inner: D,
    slots: Vec<OnceLock<Vec<u32>>>,
}

impl<D: Dataset> CacheDataset<D> {
    /// Wrap `inner`.
    pub fn new(inner: D) -> Self {
        let slots = (0..inner.len()).map(|_| OnceLock::new()).collect();
        Self { inner, slots }
    }

    /// Token length of the sample at `index`.
    pub fn item_len(&self, index: usize) -> Result<usize> {
        self.get(index).map(|ids| ids.len())
    }

    /// The wrapped dataset.
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: Dataset> Dataset for CacheDataset<D> {
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn get(&self, index: usize) -> Result<Vec<u32>> {
        let slot = self
            .slots
            .get(index)
            .ok_or_else(|| SftError::index_out_of_range(index, self.slots.len()))?;
        if let Some(ids) = slot.get() {
            return Ok(ids.clone());
        }
        let ids = self.inner.get(index)?;
        Ok(slot.get_or_init(|| ids).clone())
    }

    fn format(&self) -> Option<SampleFormat> {
        self.inner.format()
    }

    fn completion_offset(&self, index: usize) -> Result<Option<usize>> {
        self.inner.completion_offset(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ByteTokenizer;
    use serde_json::json;

    fn records(values: Vec<serde_json::Value>) -> Vec<RawRecord> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn tokenizer() -> Arc<dyn SampleTokenizer> {
        Arc::new(ByteTokenizer::new().with_eos(0).with_chat_template())
    }

    fn text_part(texts: &[&str]) -> FormatDataset {
        let recs = records(texts.iter().map(|t| json!({ "text": t })).collect());
        FormatDataset::from_records(recs, tokenizer(), FieldNames::default(), "mem", None)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_text_dataset_is_lazy_and_deterministic() {
        let ds = TextDataset::new(records(vec![json!({"text": "hi"})]), tokenizer());
        assert_eq!(ds.len(), 1);
        let first = ds.get(0).unwrap();
        assert_eq!(first, vec![104, 105, 0]);
        assert_eq!(ds.get(0).unwrap(), first);
    }

    #[test]
    fn test_bounds_for_every_variant() {
        let tok = tokenizer();
        let text = TextDataset::new(records(vec![json!({"text": "a"})]), tok.clone());
        let comp = CompletionsDataset::new(
            records(vec![json!({"prompt": "a", "completion": "b"})]),
            tok.clone(),
        );
        let chat = ChatDataset::new(
            records(vec![json!({"messages": [{"role": "user", "content": "a"}]})]),
            tok,
        );
        let all: [&dyn Dataset; 3] = [&text, &comp, &chat];
        for ds in all {
            let first = ds.at(0).unwrap();
            assert!(!first.is_empty());
            assert_eq!(ds.at(0).unwrap(), first);
            assert!(matches!(
                ds.at(ds.len() as isize),
                Err(SftError::IndexOutOfRange { index: 1, len: 1 })
            ));
            assert!(matches!(
                ds.at(-1),
                Err(SftError::IndexOutOfRange { index: -1, len: 1 })
            ));
        }
    }

    #[test]
    fn test_completion_offset() {
        let comp = CompletionsDataset::new(
            records(vec![json!({"prompt": "2+2=", "completion": "4"})]),
            tokenizer(),
        );
        let ids = comp.get(0).unwrap();
        let offset = comp.completion_offset(0).unwrap().unwrap();
        assert_eq!(offset, 4);
        assert_eq!(&ids[offset..], &[u32::from(b'4')]);

        let text = text_part(&["x"]);
        assert_eq!(text.completion_offset(0).unwrap(), None);
    }

    #[test]
    fn test_from_records_detects_and_validates() {
        let tok = tokenizer();
        let ds = FormatDataset::from_records(
            records(vec![json!({"prompt": "p", "completion": "c"})]),
            tok.clone(),
            FieldNames::default(),
            "mem",
            None,
        )
        .unwrap()
        .unwrap();
        assert!(matches!(ds, FormatDataset::Completions(_)));

        let mixed = records(vec![json!({"text": "a"}), json!({"messages": []})]);
        let err = FormatDataset::from_records(mixed, tok.clone(), FieldNames::default(), "f", None)
            .err()
            .unwrap();
        match err {
            SftError::SchemaMismatch { location, expected, .. } => {
                assert_eq!(location, "f:2");
                assert_eq!(expected, SampleFormat::Text);
            }
            other => panic!("unexpected error: {other}"),
        }

        let empty =
            FormatDataset::from_records(vec![], tok, FieldNames::default(), "f", None).unwrap();
        assert!(empty.is_none());
    }

    #[test]
    fn test_concatenation_routes_by_range() {
        let joined = ConcatenatedDataset::new(vec![text_part(&["a", "b"]), text_part(&["c"])]);
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.get(0).unwrap(), vec![97, 0]);
        assert_eq!(joined.get(1).unwrap(), vec![98, 0]);
        assert_eq!(joined.get(2).unwrap(), vec![99, 0]);
        assert!(joined.get(3).is_err());
        assert_eq!(joined.format(), Some(SampleFormat::Text));
    }

    #[test]
    fn test_concatenation_access_is_idempotent() {
        let tok = tokenizer();
        let comp = FormatDataset::Completions(CompletionsDataset::new(
            records(vec![
                json!({"prompt": "p1", "completion": "c1"}),
                json!({"prompt": "p2", "completion": "c2"}),
            ]),
            tok.clone(),
        ));
        let chat = FormatDataset::Chat(ChatDataset::new(
            records(vec![json!({"messages": [{"role": "user", "content": "q"}]})]),
            tok,
        ));
        let joined = ConcatenatedDataset::new(vec![text_part(&["a"]), comp, chat]);
        assert_eq!(joined.len(), 4);

        for i in 0..joined.len() {
            let first = joined.at(i as isize).unwrap();
            assert_eq!(joined.at(i as isize).unwrap(), first);
            assert_eq!(joined.get(i).unwrap(), first);
        }
        assert_eq!(joined.get(2).unwrap(), b"p2c2".iter().map(|&b| u32::from(b)).collect::<Vec<_>>());
    }

    #[test]
    fn test_concatenation_edge_cases() {
        let empty = ConcatenatedDataset::empty();
        assert_eq!(empty.len(), 0);
        assert!(empty.get(0).is_err());
        assert_eq!(empty.format(), None);

        let chat = FormatDataset::Chat(ChatDataset::new(
            records(vec![json!({"messages": [{"role": "user", "content": "z"}]})]),
            tokenizer(),
        ));
        let mixed = ConcatenatedDataset::new(vec![text_part(&["a"]), chat]);
        assert_eq!(mixed.len(), 2);
        assert_eq!(mixed.format(), None);
        assert!(!mixed.get(1).unwrap().is_empty());
    }

    #[test]
    fn test_cache_dataset() {
        let cached = CacheDataset::new(text_part(&["abc"]));
        assert_eq!(cached.len(), 1);
        assert_eq!(cached.item_len(0).unwrap(), 4);
        assert_eq!(cached.get(0).unwrap(), cached.inner().get(0).unwrap());
        assert!(cached.get(1).is_err());
    }
}
