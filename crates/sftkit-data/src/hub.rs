//! Hub sources: remote rows adapted to the same containers as local files.

use crate::dataset::FormatDataset;
use crate::detect::FieldNames;
use crate::tokenizer::SampleTokenizer;
use sftkit_core::{HubClient, HubDatasetConfig, Result, SampleFormat, Split};
use std::sync::Arc;

/// Resolve one split of a hub source.
///
/// The split's query expression is forwarded to `hub` untouched. Explicit
/// prompt/completion mappings force completions samples; otherwise the shape
/// is detected from the first row using the (possibly renamed) convention
/// fields. A split with no query is not fetched, and neither it nor a query
/// that selects no rows produces a container.
pub fn load_hub_split(
    config: &HubDatasetConfig,
    split: Split,
    requested: bool,
    tokenizer: &Arc<dyn SampleTokenizer>,
    hub: &dyn HubClient,
) -> Result<Option<FormatDataset>> {
    if split != Split::Valid && !requested {
        return Ok(None);
    }

    let Some(query) = config.split_query(split) else {
        tracing::debug!("No {} query for {}, skipping", split, config.path);
        return Ok(None);
    };

    tracing::info!("Fetching {} split of {} ({})", split, config.path, query);
    let rows = hub.fetch(&config.path, query)?;
    if rows.is_empty() {
        tracing::warn!("Query {} on {} selected no rows", query, config.path);
        return Ok(None);
    }

    let forced = (config.prompt_feature.is_some() || config.completion_feature.is_some())
        .then_some(SampleFormat::Completions);

    FormatDataset::from_records(
        rows,
        Arc::clone(tokenizer),
        FieldNames::for_hub(config),
        &format!("{}[{}]", config.path, query),
        forced,
    )
}
